//! Label-based assembler producing [`Instruction`] streams.
//!
//! [`InstructionAssembler`] is the surface method bodies are written through: builders hand
//! one to a closure, the closure emits instructions, and the assembler resolves every label
//! reference into an instruction index once the body is complete.
//!
//! Slot and constant helpers select the most compact encoding, the same way a compiler
//! would emit them, so that bodies produced here exercise the normalization paths of the
//! splicer.
//!
//! # Examples
//!
//! ```rust
//! use cilhook::assembly::InstructionAssembler;
//!
//! let mut asm = InstructionAssembler::new();
//! asm.ldarg_0()?
//!     .brtrue("non_zero")?
//!     .ldc_i4(0)?
//!     .ret()?
//!     .label("non_zero")?
//!     .ldc_i4(1)?
//!     .ret()?;
//! let body = asm.finish()?;
//! assert_eq!(body.len(), 6);
//! # Ok::<(), cilhook::Error>(())
//! ```

use rustc_hash::FxHashMap;

use crate::{
    assembly::{
        instruction::{Immediate, Instruction, Operand},
        opcodes::{OpCode, OperandType},
    },
    metadata::token::Token,
    Error, Result,
};

/// Branch operand waiting for its label to be defined.
#[derive(Debug, Clone)]
enum Fixup {
    Branch { index: usize, label: String },
    Switch { index: usize, labels: Vec<String> },
}

/// Assembler for CIL instruction streams with symbolic labels.
#[derive(Debug, Default)]
pub struct InstructionAssembler {
    instructions: Vec<Instruction>,
    labels: FxHashMap<String, usize>,
    fixups: Vec<Fixup>,
}

impl InstructionAssembler {
    /// Creates an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instructions emitted so far, which is also the index the next one gets.
    #[must_use]
    pub fn position(&self) -> usize {
        self.instructions.len()
    }

    /// Emits an instruction with an explicit operand.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PreconditionViolated`] if `opcode` expects a branch operand (use
    /// [`InstructionAssembler::emit_branch`] instead) or the operand kind does not fit.
    pub fn emit_instruction(&mut self, opcode: OpCode, operand: Operand) -> Result<&mut Self> {
        let fits = match (opcode.operand_type(), &operand) {
            (OperandType::None, Operand::None) => true,
            (OperandType::Int8, Operand::Immediate(Immediate::Int8(_)))
            | (OperandType::Int32, Operand::Immediate(Immediate::Int32(_)))
            | (OperandType::Int64, Operand::Immediate(Immediate::Int64(_)))
            | (OperandType::Float32, Operand::Immediate(Immediate::Float32(_)))
            | (OperandType::Float64, Operand::Immediate(Immediate::Float64(_))) => true,
            (OperandType::ShortLocal | OperandType::Local, Operand::Local(_)) => true,
            (OperandType::ShortArgument | OperandType::Argument, Operand::Argument(_)) => true,
            (
                OperandType::Method
                | OperandType::Field
                | OperandType::Type
                | OperandType::Token
                | OperandType::Signature,
                Operand::Token(_),
            ) => true,
            (OperandType::String, Operand::String(_)) => true,
            _ => false,
        };
        if !fits {
            return Err(precondition_error!(
                "operand {:?} does not fit opcode {}",
                operand,
                opcode
            ));
        }

        self.instructions.push(Instruction::new(opcode, operand));
        Ok(self)
    }

    /// Emits a branch to `label`, which may be defined before or after this point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PreconditionViolated`] if `opcode` is not a single-target branch.
    pub fn emit_branch(&mut self, opcode: OpCode, label: &str) -> Result<&mut Self> {
        if !matches!(
            opcode.operand_type(),
            OperandType::ShortBranchTarget | OperandType::BranchTarget
        ) {
            return Err(precondition_error!("{} is not a branch instruction", opcode));
        }

        self.fixups.push(Fixup::Branch {
            index: self.instructions.len(),
            label: label.to_string(),
        });
        self.instructions
            .push(Instruction::new(opcode, Operand::Target(0)));
        Ok(self)
    }

    /// Emits a `switch` over the given labels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PreconditionViolated`] for an empty label list.
    pub fn emit_switch(&mut self, labels: &[&str]) -> Result<&mut Self> {
        if labels.is_empty() {
            return Err(precondition_error!("switch requires at least one target"));
        }

        self.fixups.push(Fixup::Switch {
            index: self.instructions.len(),
            labels: labels.iter().map(|s| (*s).to_string()).collect(),
        });
        self.instructions.push(Instruction::new(
            OpCode::Switch,
            Operand::Switch(vec![0; labels.len()]),
        ));
        Ok(self)
    }

    /// Defines `name` at the current position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PreconditionViolated`] if the label is already defined.
    pub fn label(&mut self, name: &str) -> Result<&mut Self> {
        if self.labels.contains_key(name) {
            return Err(precondition_error!("duplicate label '{}'", name));
        }
        self.labels.insert(name.to_string(), self.instructions.len());
        Ok(self)
    }

    /// Resolves all labels and returns the instruction stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if a branch names a label that was never defined.
    pub fn finish(mut self) -> Result<Vec<Instruction>> {
        for fixup in std::mem::take(&mut self.fixups) {
            match fixup {
                Fixup::Branch { index, label } => {
                    let target = self.resolve(&label)?;
                    self.instructions[index].operand = Operand::Target(target);
                }
                Fixup::Switch { index, labels } => {
                    let targets = labels
                        .iter()
                        .map(|label| self.resolve(label))
                        .collect::<Result<Vec<_>>>()?;
                    self.instructions[index].operand = Operand::Switch(targets);
                }
            }
        }
        Ok(self.instructions)
    }

    fn resolve(&self, label: &str) -> Result<usize> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("label '{label}'")))
    }

    fn simple(&mut self, opcode: OpCode) -> Result<&mut Self> {
        self.emit_instruction(opcode, Operand::None)
    }

    /// Emits `ldarg` in its most compact form.
    pub fn ldarg(&mut self, index: u16) -> Result<&mut Self> {
        match index {
            0 => self.simple(OpCode::Ldarg0),
            1 => self.simple(OpCode::Ldarg1),
            2 => self.simple(OpCode::Ldarg2),
            3 => self.simple(OpCode::Ldarg3),
            x if x <= 255 => self.emit_instruction(OpCode::LdargS, Operand::Argument(x)),
            x => self.emit_instruction(OpCode::Ldarg, Operand::Argument(x)),
        }
    }

    /// Emits `ldarg.0`.
    pub fn ldarg_0(&mut self) -> Result<&mut Self> {
        self.ldarg(0)
    }

    /// Emits `ldarg.1`.
    pub fn ldarg_1(&mut self) -> Result<&mut Self> {
        self.ldarg(1)
    }

    /// Emits `ldarg.2`.
    pub fn ldarg_2(&mut self) -> Result<&mut Self> {
        self.ldarg(2)
    }

    /// Emits `ldarga` in its most compact form.
    pub fn ldarga(&mut self, index: u16) -> Result<&mut Self> {
        if index <= 255 {
            self.emit_instruction(OpCode::LdargaS, Operand::Argument(index))
        } else {
            self.emit_instruction(OpCode::Ldarga, Operand::Argument(index))
        }
    }

    /// Emits `starg` in its most compact form.
    pub fn starg(&mut self, index: u16) -> Result<&mut Self> {
        if index <= 255 {
            self.emit_instruction(OpCode::StargS, Operand::Argument(index))
        } else {
            self.emit_instruction(OpCode::Starg, Operand::Argument(index))
        }
    }

    /// Emits `ldloc` in its most compact form.
    pub fn ldloc(&mut self, index: u16) -> Result<&mut Self> {
        match index {
            0 => self.simple(OpCode::Ldloc0),
            1 => self.simple(OpCode::Ldloc1),
            2 => self.simple(OpCode::Ldloc2),
            3 => self.simple(OpCode::Ldloc3),
            x if x <= 255 => self.emit_instruction(OpCode::LdlocS, Operand::Local(x)),
            x => self.emit_instruction(OpCode::Ldloc, Operand::Local(x)),
        }
    }

    /// Emits `ldloca` in its most compact form.
    pub fn ldloca(&mut self, index: u16) -> Result<&mut Self> {
        if index <= 255 {
            self.emit_instruction(OpCode::LdlocaS, Operand::Local(index))
        } else {
            self.emit_instruction(OpCode::Ldloca, Operand::Local(index))
        }
    }

    /// Emits `stloc` in its most compact form.
    pub fn stloc(&mut self, index: u16) -> Result<&mut Self> {
        match index {
            0 => self.simple(OpCode::Stloc0),
            1 => self.simple(OpCode::Stloc1),
            2 => self.simple(OpCode::Stloc2),
            3 => self.simple(OpCode::Stloc3),
            x if x <= 255 => self.emit_instruction(OpCode::StlocS, Operand::Local(x)),
            x => self.emit_instruction(OpCode::Stloc, Operand::Local(x)),
        }
    }

    /// Emits `ldc.i4` in its most compact form.
    pub fn ldc_i4(&mut self, value: i32) -> Result<&mut Self> {
        match value {
            -1 => self.simple(OpCode::LdcI4M1),
            0 => self.simple(OpCode::LdcI4_0),
            1 => self.simple(OpCode::LdcI4_1),
            2 => self.simple(OpCode::LdcI4_2),
            3 => self.simple(OpCode::LdcI4_3),
            4 => self.simple(OpCode::LdcI4_4),
            5 => self.simple(OpCode::LdcI4_5),
            6 => self.simple(OpCode::LdcI4_6),
            7 => self.simple(OpCode::LdcI4_7),
            8 => self.simple(OpCode::LdcI4_8),
            x => match i8::try_from(x) {
                Ok(short) => {
                    self.emit_instruction(OpCode::LdcI4S, Operand::Immediate(Immediate::Int8(short)))
                }
                Err(_) => {
                    self.emit_instruction(OpCode::LdcI4, Operand::Immediate(Immediate::Int32(x)))
                }
            },
        }
    }

    /// Emits `ldc.i8`.
    pub fn ldc_i8(&mut self, value: i64) -> Result<&mut Self> {
        self.emit_instruction(OpCode::LdcI8, Operand::Immediate(Immediate::Int64(value)))
    }

    /// Emits `ldc.r8`.
    pub fn ldc_r8(&mut self, value: f64) -> Result<&mut Self> {
        self.emit_instruction(OpCode::LdcR8, Operand::Immediate(Immediate::Float64(value)))
    }

    /// Emits `ldstr`.
    pub fn ldstr(&mut self, value: &str) -> Result<&mut Self> {
        self.emit_instruction(OpCode::Ldstr, Operand::String(value.to_string()))
    }

    /// Emits `ldnull`.
    pub fn ldnull(&mut self) -> Result<&mut Self> {
        self.simple(OpCode::Ldnull)
    }

    /// Emits `nop`.
    pub fn nop(&mut self) -> Result<&mut Self> {
        self.simple(OpCode::Nop)
    }

    /// Emits `dup`.
    pub fn dup(&mut self) -> Result<&mut Self> {
        self.simple(OpCode::Dup)
    }

    /// Emits `pop`.
    pub fn pop(&mut self) -> Result<&mut Self> {
        self.simple(OpCode::Pop)
    }

    /// Emits `add`.
    pub fn add(&mut self) -> Result<&mut Self> {
        self.simple(OpCode::Add)
    }

    /// Emits `sub`.
    pub fn sub(&mut self) -> Result<&mut Self> {
        self.simple(OpCode::Sub)
    }

    /// Emits `mul`.
    pub fn mul(&mut self) -> Result<&mut Self> {
        self.simple(OpCode::Mul)
    }

    /// Emits `ceq`.
    pub fn ceq(&mut self) -> Result<&mut Self> {
        self.simple(OpCode::Ceq)
    }

    /// Emits `clt`.
    pub fn clt(&mut self) -> Result<&mut Self> {
        self.simple(OpCode::Clt)
    }

    /// Emits `ret`.
    pub fn ret(&mut self) -> Result<&mut Self> {
        self.simple(OpCode::Ret)
    }

    /// Emits `throw`.
    pub fn throw(&mut self) -> Result<&mut Self> {
        self.simple(OpCode::Throw)
    }

    /// Emits `br.s` to `label`.
    pub fn br(&mut self, label: &str) -> Result<&mut Self> {
        self.emit_branch(OpCode::BrS, label)
    }

    /// Emits `brtrue.s` to `label`.
    pub fn brtrue(&mut self, label: &str) -> Result<&mut Self> {
        self.emit_branch(OpCode::BrtrueS, label)
    }

    /// Emits `brfalse.s` to `label`.
    pub fn brfalse(&mut self, label: &str) -> Result<&mut Self> {
        self.emit_branch(OpCode::BrfalseS, label)
    }

    /// Emits `leave.s` to `label`.
    pub fn leave(&mut self, label: &str) -> Result<&mut Self> {
        self.emit_branch(OpCode::LeaveS, label)
    }

    /// Emits `call`.
    pub fn call(&mut self, method: Token) -> Result<&mut Self> {
        self.emit_instruction(OpCode::Call, Operand::Token(method))
    }

    /// Emits `callvirt`.
    pub fn callvirt(&mut self, method: Token) -> Result<&mut Self> {
        self.emit_instruction(OpCode::Callvirt, Operand::Token(method))
    }

    /// Emits `newobj`.
    pub fn newobj(&mut self, ctor: Token) -> Result<&mut Self> {
        self.emit_instruction(OpCode::Newobj, Operand::Token(ctor))
    }

    /// Emits `ldfld`.
    pub fn ldfld(&mut self, field: Token) -> Result<&mut Self> {
        self.emit_instruction(OpCode::Ldfld, Operand::Token(field))
    }

    /// Emits `stfld`.
    pub fn stfld(&mut self, field: Token) -> Result<&mut Self> {
        self.emit_instruction(OpCode::Stfld, Operand::Token(field))
    }

    /// Emits `ldsfld`.
    pub fn ldsfld(&mut self, field: Token) -> Result<&mut Self> {
        self.emit_instruction(OpCode::Ldsfld, Operand::Token(field))
    }

    /// Emits `stsfld`.
    pub fn stsfld(&mut self, field: Token) -> Result<&mut Self> {
        self.emit_instruction(OpCode::Stsfld, Operand::Token(field))
    }

    /// Emits `box`.
    pub fn box_value(&mut self, ty: Token) -> Result<&mut Self> {
        self.emit_instruction(OpCode::Box, Operand::Token(ty))
    }

    /// Emits `unbox.any`.
    pub fn unbox_any(&mut self, ty: Token) -> Result<&mut Self> {
        self.emit_instruction(OpCode::UnboxAny, Operand::Token(ty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_and_backward_labels() -> Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.label("top")?
            .ldarg_0()?
            .brfalse("done")?
            .br("top")?
            .label("done")?
            .ret()?;
        let body = asm.finish()?;

        assert_eq!(body[1].operand, Operand::Target(3));
        assert_eq!(body[2].operand, Operand::Target(0));
        Ok(())
    }

    #[test]
    fn test_switch_targets() -> Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.ldarg_0()?
            .emit_switch(&["a", "b"])?
            .label("a")?
            .ret()?
            .label("b")?
            .ret()?;
        let body = asm.finish()?;
        assert_eq!(body[1].operand, Operand::Switch(vec![2, 3]));
        Ok(())
    }

    #[test]
    fn test_undefined_label() {
        let mut asm = InstructionAssembler::new();
        asm.br("nowhere").unwrap();
        assert!(matches!(asm.finish(), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_duplicate_label() {
        let mut asm = InstructionAssembler::new();
        asm.label("x").unwrap();
        assert!(matches!(
            asm.label("x"),
            Err(Error::PreconditionViolated { .. })
        ));
    }

    #[test]
    fn test_compact_encodings() -> Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.ldarg(2)?
            .ldarg(7)?
            .ldloc(300)?
            .stloc(1)?
            .ldc_i4(-1)?
            .ldc_i4(100)?
            .ldc_i4(1000)?;
        let body = asm.finish()?;
        let opcodes: Vec<OpCode> = body.iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![
                OpCode::Ldarg2,
                OpCode::LdargS,
                OpCode::Ldloc,
                OpCode::Stloc1,
                OpCode::LdcI4M1,
                OpCode::LdcI4S,
                OpCode::LdcI4,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_operand_mismatch() {
        let mut asm = InstructionAssembler::new();
        let result = asm.emit_instruction(OpCode::Call, Operand::Local(0));
        assert!(matches!(result, Err(Error::PreconditionViolated { .. })));
        let result = asm.emit_instruction(OpCode::Br, Operand::Target(0));
        assert!(result.is_err());
    }
}
