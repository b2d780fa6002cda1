//! CIL opcode table (ECMA-335, Partition III).
//!
//! [`OpCode`] enumerates every base instruction together with its encoded value, the kind of
//! operand it carries and how it affects control flow. Two-byte opcodes that use the `0xFE`
//! prefix are encoded as `0xFE00 | second_byte` in [`OpCode::value`].
//!
//! The table also knows the relationship between *compact* encodings and their general form:
//! `ldloc.1` and `ldloc.s 1` both mean `ldloc 1`, and `br.s` is a short `br`. Index-shifting
//! transforms must go through [`OpCode::long_form`] first, because the compact forms cannot
//! encode slot indices above 3 (or above 255 for the `.s` forms).

use strum::{Display, EnumCount, EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::assembly::instruction::FlowType;

/// Prefix byte shared by all two-byte opcodes.
pub const FE_PREFIX: u8 = 0xFE;

/// Kinds of operands CIL instructions can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand present
    None,
    /// Signed 8-bit immediate
    Int8,
    /// Signed 32-bit immediate
    Int32,
    /// Signed 64-bit immediate
    Int64,
    /// 32-bit floating point immediate
    Float32,
    /// 64-bit floating point immediate
    Float64,
    /// Branch target encoded as a signed 8-bit offset
    ShortBranchTarget,
    /// Branch target encoded as a signed 32-bit offset
    BranchTarget,
    /// Switch table of 32-bit branch offsets
    Switch,
    /// Local slot encoded in 8 bits
    ShortLocal,
    /// Local slot encoded in 16 bits
    Local,
    /// Argument slot encoded in 8 bits
    ShortArgument,
    /// Argument slot encoded in 16 bits
    Argument,
    /// Method token (`MethodDef` or `MemberRef`)
    Method,
    /// Field token (`Field` or `MemberRef`)
    Field,
    /// Type token (`TypeDef` or `TypeRef`)
    Type,
    /// Any metadata token (`ldtoken`)
    Token,
    /// User string (`ldstr`)
    String,
    /// Stand-alone call site signature (`calli`)
    Signature,
}

macro_rules! define_opcodes {
    ($( $variant:ident = $mnemonic:literal, $value:literal, $operand:ident, $flow:ident; )*) => {
        /// A CIL instruction opcode.
        ///
        /// The [`std::fmt::Display`] form is the ILAsm mnemonic (`ldarg.0`, `call`, `br.s`).
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount, IntoStaticStr,
        )]
        #[allow(non_camel_case_types)]
        pub enum OpCode {
            $(
                #[allow(missing_docs)]
                #[strum(serialize = $mnemonic)]
                $variant,
            )*
        }

        impl OpCode {
            /// The encoded opcode value; two-byte opcodes are `0xFE00 | second_byte`.
            #[must_use]
            pub const fn value(self) -> u16 {
                match self {
                    $( OpCode::$variant => $value, )*
                }
            }

            /// The kind of operand this opcode is followed by.
            #[must_use]
            pub const fn operand_type(self) -> OperandType {
                match self {
                    $( OpCode::$variant => OperandType::$operand, )*
                }
            }

            /// How this opcode affects control flow.
            #[must_use]
            pub const fn flow_type(self) -> FlowType {
                match self {
                    $( OpCode::$variant => FlowType::$flow, )*
                }
            }
        }
    };
}

define_opcodes! {
    Nop = "nop", 0x00, None, Sequential;
    Break = "break", 0x01, None, Sequential;
    Ldarg0 = "ldarg.0", 0x02, None, Sequential;
    Ldarg1 = "ldarg.1", 0x03, None, Sequential;
    Ldarg2 = "ldarg.2", 0x04, None, Sequential;
    Ldarg3 = "ldarg.3", 0x05, None, Sequential;
    Ldloc0 = "ldloc.0", 0x06, None, Sequential;
    Ldloc1 = "ldloc.1", 0x07, None, Sequential;
    Ldloc2 = "ldloc.2", 0x08, None, Sequential;
    Ldloc3 = "ldloc.3", 0x09, None, Sequential;
    Stloc0 = "stloc.0", 0x0A, None, Sequential;
    Stloc1 = "stloc.1", 0x0B, None, Sequential;
    Stloc2 = "stloc.2", 0x0C, None, Sequential;
    Stloc3 = "stloc.3", 0x0D, None, Sequential;
    LdargS = "ldarg.s", 0x0E, ShortArgument, Sequential;
    LdargaS = "ldarga.s", 0x0F, ShortArgument, Sequential;
    StargS = "starg.s", 0x10, ShortArgument, Sequential;
    LdlocS = "ldloc.s", 0x11, ShortLocal, Sequential;
    LdlocaS = "ldloca.s", 0x12, ShortLocal, Sequential;
    StlocS = "stloc.s", 0x13, ShortLocal, Sequential;
    Ldnull = "ldnull", 0x14, None, Sequential;
    LdcI4M1 = "ldc.i4.m1", 0x15, None, Sequential;
    LdcI4_0 = "ldc.i4.0", 0x16, None, Sequential;
    LdcI4_1 = "ldc.i4.1", 0x17, None, Sequential;
    LdcI4_2 = "ldc.i4.2", 0x18, None, Sequential;
    LdcI4_3 = "ldc.i4.3", 0x19, None, Sequential;
    LdcI4_4 = "ldc.i4.4", 0x1A, None, Sequential;
    LdcI4_5 = "ldc.i4.5", 0x1B, None, Sequential;
    LdcI4_6 = "ldc.i4.6", 0x1C, None, Sequential;
    LdcI4_7 = "ldc.i4.7", 0x1D, None, Sequential;
    LdcI4_8 = "ldc.i4.8", 0x1E, None, Sequential;
    LdcI4S = "ldc.i4.s", 0x1F, Int8, Sequential;
    LdcI4 = "ldc.i4", 0x20, Int32, Sequential;
    LdcI8 = "ldc.i8", 0x21, Int64, Sequential;
    LdcR4 = "ldc.r4", 0x22, Float32, Sequential;
    LdcR8 = "ldc.r8", 0x23, Float64, Sequential;
    Dup = "dup", 0x25, None, Sequential;
    Pop = "pop", 0x26, None, Sequential;
    Jmp = "jmp", 0x27, Method, Call;
    Call = "call", 0x28, Method, Call;
    Calli = "calli", 0x29, Signature, Call;
    Ret = "ret", 0x2A, None, Return;
    BrS = "br.s", 0x2B, ShortBranchTarget, UnconditionalBranch;
    BrfalseS = "brfalse.s", 0x2C, ShortBranchTarget, ConditionalBranch;
    BrtrueS = "brtrue.s", 0x2D, ShortBranchTarget, ConditionalBranch;
    BeqS = "beq.s", 0x2E, ShortBranchTarget, ConditionalBranch;
    BgeS = "bge.s", 0x2F, ShortBranchTarget, ConditionalBranch;
    BgtS = "bgt.s", 0x30, ShortBranchTarget, ConditionalBranch;
    BleS = "ble.s", 0x31, ShortBranchTarget, ConditionalBranch;
    BltS = "blt.s", 0x32, ShortBranchTarget, ConditionalBranch;
    BneUnS = "bne.un.s", 0x33, ShortBranchTarget, ConditionalBranch;
    BgeUnS = "bge.un.s", 0x34, ShortBranchTarget, ConditionalBranch;
    BgtUnS = "bgt.un.s", 0x35, ShortBranchTarget, ConditionalBranch;
    BleUnS = "ble.un.s", 0x36, ShortBranchTarget, ConditionalBranch;
    BltUnS = "blt.un.s", 0x37, ShortBranchTarget, ConditionalBranch;
    Br = "br", 0x38, BranchTarget, UnconditionalBranch;
    Brfalse = "brfalse", 0x39, BranchTarget, ConditionalBranch;
    Brtrue = "brtrue", 0x3A, BranchTarget, ConditionalBranch;
    Beq = "beq", 0x3B, BranchTarget, ConditionalBranch;
    Bge = "bge", 0x3C, BranchTarget, ConditionalBranch;
    Bgt = "bgt", 0x3D, BranchTarget, ConditionalBranch;
    Ble = "ble", 0x3E, BranchTarget, ConditionalBranch;
    Blt = "blt", 0x3F, BranchTarget, ConditionalBranch;
    BneUn = "bne.un", 0x40, BranchTarget, ConditionalBranch;
    BgeUn = "bge.un", 0x41, BranchTarget, ConditionalBranch;
    BgtUn = "bgt.un", 0x42, BranchTarget, ConditionalBranch;
    BleUn = "ble.un", 0x43, BranchTarget, ConditionalBranch;
    BltUn = "blt.un", 0x44, BranchTarget, ConditionalBranch;
    Switch = "switch", 0x45, Switch, Switch;
    LdindI1 = "ldind.i1", 0x46, None, Sequential;
    LdindU1 = "ldind.u1", 0x47, None, Sequential;
    LdindI2 = "ldind.i2", 0x48, None, Sequential;
    LdindU2 = "ldind.u2", 0x49, None, Sequential;
    LdindI4 = "ldind.i4", 0x4A, None, Sequential;
    LdindU4 = "ldind.u4", 0x4B, None, Sequential;
    LdindI8 = "ldind.i8", 0x4C, None, Sequential;
    LdindI = "ldind.i", 0x4D, None, Sequential;
    LdindR4 = "ldind.r4", 0x4E, None, Sequential;
    LdindR8 = "ldind.r8", 0x4F, None, Sequential;
    LdindRef = "ldind.ref", 0x50, None, Sequential;
    StindRef = "stind.ref", 0x51, None, Sequential;
    StindI1 = "stind.i1", 0x52, None, Sequential;
    StindI2 = "stind.i2", 0x53, None, Sequential;
    StindI4 = "stind.i4", 0x54, None, Sequential;
    StindI8 = "stind.i8", 0x55, None, Sequential;
    StindR4 = "stind.r4", 0x56, None, Sequential;
    StindR8 = "stind.r8", 0x57, None, Sequential;
    Add = "add", 0x58, None, Sequential;
    Sub = "sub", 0x59, None, Sequential;
    Mul = "mul", 0x5A, None, Sequential;
    Div = "div", 0x5B, None, Sequential;
    DivUn = "div.un", 0x5C, None, Sequential;
    Rem = "rem", 0x5D, None, Sequential;
    RemUn = "rem.un", 0x5E, None, Sequential;
    And = "and", 0x5F, None, Sequential;
    Or = "or", 0x60, None, Sequential;
    Xor = "xor", 0x61, None, Sequential;
    Shl = "shl", 0x62, None, Sequential;
    Shr = "shr", 0x63, None, Sequential;
    ShrUn = "shr.un", 0x64, None, Sequential;
    Neg = "neg", 0x65, None, Sequential;
    Not = "not", 0x66, None, Sequential;
    ConvI1 = "conv.i1", 0x67, None, Sequential;
    ConvI2 = "conv.i2", 0x68, None, Sequential;
    ConvI4 = "conv.i4", 0x69, None, Sequential;
    ConvI8 = "conv.i8", 0x6A, None, Sequential;
    ConvR4 = "conv.r4", 0x6B, None, Sequential;
    ConvR8 = "conv.r8", 0x6C, None, Sequential;
    ConvU4 = "conv.u4", 0x6D, None, Sequential;
    ConvU8 = "conv.u8", 0x6E, None, Sequential;
    Callvirt = "callvirt", 0x6F, Method, Call;
    Cpobj = "cpobj", 0x70, Type, Sequential;
    Ldobj = "ldobj", 0x71, Type, Sequential;
    Ldstr = "ldstr", 0x72, String, Sequential;
    Newobj = "newobj", 0x73, Method, Call;
    Castclass = "castclass", 0x74, Type, Sequential;
    Isinst = "isinst", 0x75, Type, Sequential;
    ConvRUn = "conv.r.un", 0x76, None, Sequential;
    Unbox = "unbox", 0x79, Type, Sequential;
    Throw = "throw", 0x7A, None, Throw;
    Ldfld = "ldfld", 0x7B, Field, Sequential;
    Ldflda = "ldflda", 0x7C, Field, Sequential;
    Stfld = "stfld", 0x7D, Field, Sequential;
    Ldsfld = "ldsfld", 0x7E, Field, Sequential;
    Ldsflda = "ldsflda", 0x7F, Field, Sequential;
    Stsfld = "stsfld", 0x80, Field, Sequential;
    Stobj = "stobj", 0x81, Type, Sequential;
    ConvOvfI1Un = "conv.ovf.i1.un", 0x82, None, Sequential;
    ConvOvfI2Un = "conv.ovf.i2.un", 0x83, None, Sequential;
    ConvOvfI4Un = "conv.ovf.i4.un", 0x84, None, Sequential;
    ConvOvfI8Un = "conv.ovf.i8.un", 0x85, None, Sequential;
    ConvOvfU1Un = "conv.ovf.u1.un", 0x86, None, Sequential;
    ConvOvfU2Un = "conv.ovf.u2.un", 0x87, None, Sequential;
    ConvOvfU4Un = "conv.ovf.u4.un", 0x88, None, Sequential;
    ConvOvfU8Un = "conv.ovf.u8.un", 0x89, None, Sequential;
    ConvOvfIUn = "conv.ovf.i.un", 0x8A, None, Sequential;
    ConvOvfUUn = "conv.ovf.u.un", 0x8B, None, Sequential;
    Box = "box", 0x8C, Type, Sequential;
    Newarr = "newarr", 0x8D, Type, Sequential;
    Ldlen = "ldlen", 0x8E, None, Sequential;
    Ldelema = "ldelema", 0x8F, Type, Sequential;
    LdelemI1 = "ldelem.i1", 0x90, None, Sequential;
    LdelemU1 = "ldelem.u1", 0x91, None, Sequential;
    LdelemI2 = "ldelem.i2", 0x92, None, Sequential;
    LdelemU2 = "ldelem.u2", 0x93, None, Sequential;
    LdelemI4 = "ldelem.i4", 0x94, None, Sequential;
    LdelemU4 = "ldelem.u4", 0x95, None, Sequential;
    LdelemI8 = "ldelem.i8", 0x96, None, Sequential;
    LdelemI = "ldelem.i", 0x97, None, Sequential;
    LdelemR4 = "ldelem.r4", 0x98, None, Sequential;
    LdelemR8 = "ldelem.r8", 0x99, None, Sequential;
    LdelemRef = "ldelem.ref", 0x9A, None, Sequential;
    StelemI = "stelem.i", 0x9B, None, Sequential;
    StelemI1 = "stelem.i1", 0x9C, None, Sequential;
    StelemI2 = "stelem.i2", 0x9D, None, Sequential;
    StelemI4 = "stelem.i4", 0x9E, None, Sequential;
    StelemI8 = "stelem.i8", 0x9F, None, Sequential;
    StelemR4 = "stelem.r4", 0xA0, None, Sequential;
    StelemR8 = "stelem.r8", 0xA1, None, Sequential;
    StelemRef = "stelem.ref", 0xA2, None, Sequential;
    Ldelem = "ldelem", 0xA3, Type, Sequential;
    Stelem = "stelem", 0xA4, Type, Sequential;
    UnboxAny = "unbox.any", 0xA5, Type, Sequential;
    ConvOvfI1 = "conv.ovf.i1", 0xB3, None, Sequential;
    ConvOvfU1 = "conv.ovf.u1", 0xB4, None, Sequential;
    ConvOvfI2 = "conv.ovf.i2", 0xB5, None, Sequential;
    ConvOvfU2 = "conv.ovf.u2", 0xB6, None, Sequential;
    ConvOvfI4 = "conv.ovf.i4", 0xB7, None, Sequential;
    ConvOvfU4 = "conv.ovf.u4", 0xB8, None, Sequential;
    ConvOvfI8 = "conv.ovf.i8", 0xB9, None, Sequential;
    ConvOvfU8 = "conv.ovf.u8", 0xBA, None, Sequential;
    Refanyval = "refanyval", 0xC2, Type, Sequential;
    Ckfinite = "ckfinite", 0xC3, None, Sequential;
    Mkrefany = "mkrefany", 0xC6, Type, Sequential;
    Ldtoken = "ldtoken", 0xD0, Token, Sequential;
    ConvU2 = "conv.u2", 0xD1, None, Sequential;
    ConvU1 = "conv.u1", 0xD2, None, Sequential;
    ConvI = "conv.i", 0xD3, None, Sequential;
    ConvOvfI = "conv.ovf.i", 0xD4, None, Sequential;
    ConvOvfU = "conv.ovf.u", 0xD5, None, Sequential;
    AddOvf = "add.ovf", 0xD6, None, Sequential;
    AddOvfUn = "add.ovf.un", 0xD7, None, Sequential;
    MulOvf = "mul.ovf", 0xD8, None, Sequential;
    MulOvfUn = "mul.ovf.un", 0xD9, None, Sequential;
    SubOvf = "sub.ovf", 0xDA, None, Sequential;
    SubOvfUn = "sub.ovf.un", 0xDB, None, Sequential;
    Endfinally = "endfinally", 0xDC, None, EndFinally;
    Leave = "leave", 0xDD, BranchTarget, Leave;
    LeaveS = "leave.s", 0xDE, ShortBranchTarget, Leave;
    StindI = "stind.i", 0xDF, None, Sequential;
    ConvU = "conv.u", 0xE0, None, Sequential;
    Arglist = "arglist", 0xFE00, None, Sequential;
    Ceq = "ceq", 0xFE01, None, Sequential;
    Cgt = "cgt", 0xFE02, None, Sequential;
    CgtUn = "cgt.un", 0xFE03, None, Sequential;
    Clt = "clt", 0xFE04, None, Sequential;
    CltUn = "clt.un", 0xFE05, None, Sequential;
    Ldftn = "ldftn", 0xFE06, Method, Sequential;
    Ldvirtftn = "ldvirtftn", 0xFE07, Method, Sequential;
    Ldarg = "ldarg", 0xFE09, Argument, Sequential;
    Ldarga = "ldarga", 0xFE0A, Argument, Sequential;
    Starg = "starg", 0xFE0B, Argument, Sequential;
    Ldloc = "ldloc", 0xFE0C, Local, Sequential;
    Ldloca = "ldloca", 0xFE0D, Local, Sequential;
    Stloc = "stloc", 0xFE0E, Local, Sequential;
    Localloc = "localloc", 0xFE0F, None, Sequential;
    Endfilter = "endfilter", 0xFE11, None, EndFinally;
    Unaligned = "unaligned.", 0xFE12, Int8, Meta;
    Volatile = "volatile.", 0xFE13, None, Meta;
    Tail = "tail.", 0xFE14, None, Meta;
    Initobj = "initobj", 0xFE15, Type, Sequential;
    Constrained = "constrained.", 0xFE16, Type, Meta;
    Cpblk = "cpblk", 0xFE17, None, Sequential;
    Initblk = "initblk", 0xFE18, None, Sequential;
    Rethrow = "rethrow", 0xFE1A, None, Throw;
    Sizeof = "sizeof", 0xFE1C, Type, Sequential;
    Refanytype = "refanytype", 0xFE1D, None, Sequential;
    Readonly = "readonly.", 0xFE1E, None, Meta;
}

impl OpCode {
    /// Looks up an opcode by its encoded value.
    #[must_use]
    pub fn from_value(value: u16) -> Option<OpCode> {
        OpCode::iter().find(|opcode| opcode.value() == value)
    }

    /// Looks up an opcode by its ILAsm mnemonic.
    #[must_use]
    pub fn from_mnemonic(mnemonic: &str) -> Option<OpCode> {
        OpCode::iter().find(|opcode| <&'static str>::from(*opcode) == mnemonic)
    }

    /// Returns true for two-byte (`0xFE` prefixed) opcodes.
    #[must_use]
    pub const fn is_two_byte(self) -> bool {
        (self.value() >> 8) as u8 == FE_PREFIX
    }

    /// Returns true if the operand is a branch target (including `leave` and `switch`).
    #[must_use]
    pub const fn is_branch(self) -> bool {
        matches!(
            self.operand_type(),
            OperandType::ShortBranchTarget | OperandType::BranchTarget | OperandType::Switch
        )
    }

    /// Returns true for opcodes that call a method through their operand.
    #[must_use]
    pub const fn is_call(self) -> bool {
        matches!(self, OpCode::Call | OpCode::Callvirt)
    }

    /// Returns true for compact encodings that have a longer general form.
    #[must_use]
    pub fn is_compact(self) -> bool {
        self.long_form().0 != self
    }

    /// The general form of a compact encoding, plus the slot index implied by the opcode
    /// itself (`ldloc.2` implies slot 2).
    ///
    /// `.s` forms keep their operand and therefore return `None` as implied slot. Opcodes
    /// without a compact/general relationship map to themselves.
    #[must_use]
    pub fn long_form(self) -> (OpCode, Option<u16>) {
        match self {
            OpCode::Ldarg0 => (OpCode::Ldarg, Some(0)),
            OpCode::Ldarg1 => (OpCode::Ldarg, Some(1)),
            OpCode::Ldarg2 => (OpCode::Ldarg, Some(2)),
            OpCode::Ldarg3 => (OpCode::Ldarg, Some(3)),
            OpCode::Ldloc0 => (OpCode::Ldloc, Some(0)),
            OpCode::Ldloc1 => (OpCode::Ldloc, Some(1)),
            OpCode::Ldloc2 => (OpCode::Ldloc, Some(2)),
            OpCode::Ldloc3 => (OpCode::Ldloc, Some(3)),
            OpCode::Stloc0 => (OpCode::Stloc, Some(0)),
            OpCode::Stloc1 => (OpCode::Stloc, Some(1)),
            OpCode::Stloc2 => (OpCode::Stloc, Some(2)),
            OpCode::Stloc3 => (OpCode::Stloc, Some(3)),
            OpCode::LdargS => (OpCode::Ldarg, None),
            OpCode::LdargaS => (OpCode::Ldarga, None),
            OpCode::StargS => (OpCode::Starg, None),
            OpCode::LdlocS => (OpCode::Ldloc, None),
            OpCode::LdlocaS => (OpCode::Ldloca, None),
            OpCode::StlocS => (OpCode::Stloc, None),
            OpCode::BrS => (OpCode::Br, None),
            OpCode::BrfalseS => (OpCode::Brfalse, None),
            OpCode::BrtrueS => (OpCode::Brtrue, None),
            OpCode::BeqS => (OpCode::Beq, None),
            OpCode::BgeS => (OpCode::Bge, None),
            OpCode::BgtS => (OpCode::Bgt, None),
            OpCode::BleS => (OpCode::Ble, None),
            OpCode::BltS => (OpCode::Blt, None),
            OpCode::BneUnS => (OpCode::BneUn, None),
            OpCode::BgeUnS => (OpCode::BgeUn, None),
            OpCode::BgtUnS => (OpCode::BgtUn, None),
            OpCode::BleUnS => (OpCode::BleUn, None),
            OpCode::BltUnS => (OpCode::BltUn, None),
            OpCode::LeaveS => (OpCode::Leave, None),
            other => (other, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mnemonics() {
        assert_eq!(OpCode::Ldarg0.to_string(), "ldarg.0");
        assert_eq!(OpCode::BneUnS.to_string(), "bne.un.s");
        assert_eq!(OpCode::Constrained.to_string(), "constrained.");
        assert_eq!(OpCode::from_mnemonic("callvirt"), Some(OpCode::Callvirt));
        assert_eq!(OpCode::from_mnemonic("bogus"), None);
    }

    #[test]
    fn test_values_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for opcode in OpCode::iter() {
            assert!(seen.insert(opcode.value()), "duplicate value for {opcode}");
            assert_eq!(OpCode::from_value(opcode.value()), Some(opcode));
        }
        assert_eq!(seen.len(), OpCode::COUNT);
    }

    #[test]
    fn test_two_byte() {
        assert!(OpCode::Ceq.is_two_byte());
        assert!(OpCode::Stloc.is_two_byte());
        assert!(!OpCode::Stloc0.is_two_byte());
        assert!(!OpCode::Ret.is_two_byte());
    }

    #[test]
    fn test_long_forms() {
        assert_eq!(OpCode::Ldloc3.long_form(), (OpCode::Ldloc, Some(3)));
        assert_eq!(OpCode::StargS.long_form(), (OpCode::Starg, None));
        assert_eq!(OpCode::BrtrueS.long_form(), (OpCode::Brtrue, None));
        assert_eq!(OpCode::Add.long_form(), (OpCode::Add, None));
        assert!(OpCode::LdlocaS.is_compact());
        assert!(!OpCode::Ldloca.is_compact());

        for opcode in OpCode::iter().filter(|op| op.is_compact()) {
            let (long, _) = opcode.long_form();
            assert!(!long.is_compact(), "{opcode} expands to compact {long}");
            assert_eq!(opcode.flow_type(), long.flow_type());
        }
    }

    #[test]
    fn test_flow_and_operands() {
        assert_eq!(OpCode::Ret.flow_type(), FlowType::Return);
        assert_eq!(OpCode::Leave.flow_type(), FlowType::Leave);
        assert_eq!(OpCode::Ldsfld.operand_type(), OperandType::Field);
        assert!(OpCode::Switch.is_branch());
        assert!(OpCode::LeaveS.is_branch());
        assert!(!OpCode::Call.is_branch());
        assert!(OpCode::Callvirt.is_call());
        assert!(!OpCode::Newobj.is_call());
    }
}
