//! CIL instruction representation and operand types.
//!
//! Instructions live in a [`crate::metadata::method::MethodBody`] as a flat vector. Branch
//! operands do not store byte offsets: they store the *index* of the target instruction in
//! the same body. That turns clone-and-remap and splicing into index arithmetic: inserting
//! `n` instructions at position `p` shifts every target `>= p` by `n`, and nothing else.
//!
//! # Key Components
//!
//! - [`Instruction`] - opcode plus operand
//! - [`Operand`] - typed operand (targets, slots, immediates, tokens, strings)
//! - [`Immediate`] - immediate constant values
//! - [`FlowType`] - control flow classification

use std::fmt;

use crate::{assembly::opcodes::OpCode, metadata::token::Token};

/// Represents an immediate value embedded in a CIL instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    /// Signed 8-bit immediate value
    Int8(i8),
    /// Signed 32-bit immediate value
    Int32(i32),
    /// Signed 64-bit immediate value
    Int64(i64),
    /// 32-bit floating point immediate value
    Float32(f32),
    /// 64-bit floating point immediate value
    Float64(f64),
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Immediate::Int8(value) => write!(f, "{value}"),
            Immediate::Int32(value) => write!(f, "{value}"),
            Immediate::Int64(value) => write!(f, "{value}"),
            Immediate::Float32(value) => write!(f, "{value}"),
            Immediate::Float64(value) => write!(f, "{value}"),
        }
    }
}

/// The operand of an instruction.
///
/// # Examples
///
/// ```rust
/// use cilhook::assembly::{Immediate, Operand};
/// use cilhook::metadata::token::Token;
///
/// let constant = Operand::Immediate(Immediate::Int32(42));
/// let branch = Operand::Target(3);
/// let call = Operand::Token(Token::new(0x0600_0001));
/// assert_eq!(branch.targets(), vec![3]);
/// assert!(constant.token().is_none());
/// assert_eq!(call.token(), Some(Token::new(0x0600_0001)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand present
    None,
    /// Immediate value (constant embedded in instruction)
    Immediate(Immediate),
    /// Index of the branch target within the same body
    Target(usize),
    /// Switch table, each entry the index of a target within the same body
    Switch(Vec<usize>),
    /// Local variable slot
    Local(u16),
    /// Argument slot (slot 0 is the receiver for methods with an implicit `this`)
    Argument(u16),
    /// Symbol reference (method, field or type)
    Token(Token),
    /// User string literal
    String(String),
}

impl Operand {
    /// Returns the symbol token of this operand, if any.
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        match self {
            Operand::Token(token) => Some(*token),
            _ => None,
        }
    }

    /// Returns every instruction index this operand points at.
    #[must_use]
    pub fn targets(&self) -> Vec<usize> {
        match self {
            Operand::Target(target) => vec![*target],
            Operand::Switch(targets) => targets.clone(),
            _ => Vec::new(),
        }
    }

    /// Rewrites every instruction index this operand points at.
    pub fn remap_targets<F>(&mut self, mut remap: F)
    where
        F: FnMut(usize) -> usize,
    {
        match self {
            Operand::Target(target) => *target = remap(*target),
            Operand::Switch(targets) => {
                for target in targets.iter_mut() {
                    *target = remap(*target);
                }
            }
            _ => {}
        }
    }
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Normal execution continues to next instruction
    Sequential,
    /// Conditional branch to another location
    ConditionalBranch,
    /// Always branches to another location (unconditional jump)
    UnconditionalBranch,
    /// Call to another method
    Call,
    /// Returns from current method
    Return,
    /// Multi-way branch (switch statement)
    Switch,
    /// Exception throwing
    Throw,
    /// End of finally or filter block
    EndFinally,
    /// Leave protected region (try/catch/finally)
    Leave,
    /// Prefix modifying the following instruction
    Meta,
}

/// A single CIL instruction: opcode plus operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The opcode
    pub opcode: OpCode,
    /// The operand, matching [`OpCode::operand_type`]
    pub operand: Operand,
}

impl Instruction {
    /// Creates an instruction with an explicit operand.
    #[must_use]
    pub fn new(opcode: OpCode, operand: Operand) -> Self {
        Instruction { opcode, operand }
    }

    /// Creates an instruction without operand.
    #[must_use]
    pub fn simple(opcode: OpCode) -> Self {
        Instruction {
            opcode,
            operand: Operand::None,
        }
    }

    /// Creates an unconditional long branch to `target`.
    #[must_use]
    pub fn branch(target: usize) -> Self {
        Instruction::new(OpCode::Br, Operand::Target(target))
    }

    /// Creates an instruction with a symbol operand.
    #[must_use]
    pub fn with_token(opcode: OpCode, token: Token) -> Self {
        Instruction::new(opcode, Operand::Token(token))
    }

    /// Returns true for `ret`.
    #[must_use]
    pub fn is_return(&self) -> bool {
        self.opcode == OpCode::Ret
    }

    /// Returns the control flow classification of the opcode.
    #[must_use]
    pub fn flow_type(&self) -> FlowType {
        self.opcode.flow_type()
    }

    /// Returns the local slot this instruction addresses, resolving compact forms.
    #[must_use]
    pub fn local_index(&self) -> Option<u16> {
        match self.normalized() {
            Instruction {
                opcode: OpCode::Ldloc | OpCode::Ldloca | OpCode::Stloc,
                operand: Operand::Local(index),
            } => Some(index),
            _ => None,
        }
    }

    /// Returns the argument slot this instruction addresses, resolving compact forms.
    #[must_use]
    pub fn argument_index(&self) -> Option<u16> {
        match self.normalized() {
            Instruction {
                opcode: OpCode::Ldarg | OpCode::Ldarga | OpCode::Starg,
                operand: Operand::Argument(index),
            } => Some(index),
            _ => None,
        }
    }

    /// Returns the general form of this instruction.
    ///
    /// `ldloc.2` becomes `ldloc 2`, `stloc.s 7` becomes `stloc 7` and `br.s` becomes `br`.
    /// Every transform that renumbers slots or moves branch targets works on the general
    /// form, because the compact forms cannot encode arbitrary indices.
    #[must_use]
    pub fn normalized(&self) -> Instruction {
        let (opcode, implied) = self.opcode.long_form();
        if opcode == self.opcode {
            return self.clone();
        }

        let operand = match (implied, &self.operand) {
            (Some(slot), _) if matches!(opcode, OpCode::Ldarg) => Operand::Argument(slot),
            (Some(slot), _) => Operand::Local(slot),
            (None, operand) => operand.clone(),
        };
        Instruction { opcode, operand }
    }

    /// Normalizes this instruction in place, see [`Instruction::normalized`].
    pub fn normalize(&mut self) {
        if self.opcode.is_compact() {
            *self = self.normalized();
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Immediate(imm) => write!(f, " {imm}"),
            Operand::Target(target) => write!(f, " IL_{target:04}"),
            Operand::Switch(targets) => {
                let labels: Vec<String> = targets.iter().map(|t| format!("IL_{t:04}")).collect();
                write!(f, " ({})", labels.join(", "))
            }
            Operand::Local(index) => write!(f, " V_{index}"),
            Operand::Argument(index) => write!(f, " A_{index}"),
            Operand::Token(token) => write!(f, " {token}"),
            Operand::String(value) => write!(f, " {value:?}"),
        }
    }
}
