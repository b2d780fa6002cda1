//! CIL instruction model.
//!
//! This module holds everything needed to represent and produce method body code without a
//! binary encoding step:
//!
//! - [`OpCode`] - the ECMA-335 base instruction set with operand and flow classification
//! - [`Instruction`] / [`Operand`] - an opcode plus its typed operand, where branch operands
//!   are indices into the owning instruction vector
//! - [`InstructionAssembler`] - a label-resolving assembler used by the body builders
//!
//! Bodies are plain `Vec<Instruction>`; the transforms in [`crate::inject`] rewrite them in
//! place.

mod assembler;
mod instruction;
mod opcodes;

pub use assembler::InstructionAssembler;
pub use instruction::{FlowType, Immediate, Instruction, Operand};
pub use opcodes::{OpCode, OperandType, FE_PREFIX};
