//! Methods, their parameters and bodies.
//!
//! A [`MethodDef`] describes a routine: its name, flags, signature and an optional
//! [`MethodBody`]. Argument slot numbering follows the runtime: when a method has an
//! implicit receiver (`has_this` without `explicit_this`), slot 0 is the receiver and
//! declared parameter `p` lives in slot `p + 1`.

use crate::{
    assembly::{Instruction, Operand},
    metadata::{
        attributes::{MethodAttributes, MethodImplAttributes, ParamAttributes},
        exceptions::ExceptionHandler,
        signatures::TypeSignature,
        token::Token,
    },
};

/// Calling convention of a method signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallingConvention {
    /// Managed default convention
    #[default]
    Default,
    /// Variable argument list
    VarArg,
    /// Generic method with the given number of type parameters
    Generic(u32),
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Parameter flags
    pub flags: ParamAttributes,
    /// Parameter type
    pub signature: TypeSignature,
}

impl Param {
    /// Creates a plain input parameter.
    #[must_use]
    pub fn new(name: &str, signature: TypeSignature) -> Self {
        Param {
            name: name.to_string(),
            flags: ParamAttributes::empty(),
            signature,
        }
    }
}

/// A local variable slot.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariable {
    /// The signature of this variable
    pub signature: TypeSignature,
    /// This variable is pinned
    pub is_pinned: bool,
}

impl LocalVariable {
    /// Creates an unpinned local of `signature`.
    #[must_use]
    pub fn new(signature: TypeSignature) -> Self {
        LocalVariable {
            signature,
            is_pinned: false,
        }
    }
}

/// Instruction stream plus locals and exception handler ranges.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodBody {
    /// Ordered instructions; branch operands index into this vector
    pub instructions: Vec<Instruction>,
    /// Dense, 0-based local variable slots
    pub locals: Vec<LocalVariable>,
    /// Protected regions and their handlers
    pub exception_handlers: Vec<ExceptionHandler>,
    /// Maximum evaluation stack depth
    pub max_stack: u16,
    /// Zero-initialize locals on entry
    pub init_locals: bool,
}

impl MethodBody {
    /// Creates a body from instructions with default stack size and no locals.
    #[must_use]
    pub fn new(instructions: Vec<Instruction>) -> Self {
        MethodBody {
            instructions,
            locals: Vec::new(),
            exception_handlers: Vec::new(),
            max_stack: 8,
            init_locals: true,
        }
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True if the body holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Rewrites every compact encoding into its general form, widening short branches.
    pub fn normalize(&mut self) {
        for instruction in &mut self.instructions {
            instruction.normalize();
        }
    }

    /// Shifts every branch target and handler boundary by `delta`.
    pub fn shift_targets(&mut self, delta: usize) {
        for instruction in &mut self.instructions {
            instruction.operand.remap_targets(|target| target + delta);
        }
        for handler in &mut self.exception_handlers {
            handler.shift(delta);
        }
    }

    /// Indices of the instructions whose operand is `token`.
    #[must_use]
    pub fn sites_of(&self, token: Token) -> Vec<usize> {
        self.instructions
            .iter()
            .enumerate()
            .filter(|(_, instruction)| instruction.operand == Operand::Token(token))
            .map(|(index, _)| index)
            .collect()
    }
}

/// A method definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    /// The token of this method
    pub token: Token,
    /// Method name
    pub name: String,
    /// Method attributes
    pub flags: MethodAttributes,
    /// Implementation attributes
    pub impl_flags: MethodImplAttributes,
    /// Calling convention
    pub calling_convention: CallingConvention,
    /// The method takes a receiver
    pub has_this: bool,
    /// The receiver is declared as the first parameter
    pub explicit_this: bool,
    /// Return type
    pub return_type: TypeSignature,
    /// Declared parameters, without the implicit receiver
    pub params: Vec<Param>,
    /// Body, absent for abstract or extern methods
    pub body: Option<MethodBody>,
    /// Declaring type, absent while the method is not attached
    pub declaring_type: Option<Token>,
}

impl MethodDef {
    /// Number of argument slots taken by an implicit receiver (0 or 1).
    #[must_use]
    pub fn receiver_slots(&self) -> u16 {
        u16::from(self.has_this && !self.explicit_this)
    }

    /// Total number of argument slots, including an implicit receiver.
    #[must_use]
    pub fn argument_slots(&self) -> usize {
        self.params.len() + usize::from(self.receiver_slots())
    }

    /// True if the method is declared `static`.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodAttributes::STATIC)
    }

    /// True if the method returns `void`.
    #[must_use]
    pub fn returns_void(&self) -> bool {
        self.return_type.is_void()
    }

    /// Every type token of the signature (return type and parameters).
    #[must_use]
    pub fn signature_tokens(&self) -> Vec<Token> {
        let mut tokens = self.return_type.tokens();
        for param in &self.params {
            tokens.extend(param.signature.tokens());
        }
        tokens
    }
}
