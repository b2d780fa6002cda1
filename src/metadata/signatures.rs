//! Type signatures used by fields, parameters, locals, return types and handlers.
//!
//! A [`TypeSignature`] either names a primitive element type, which is the same in every
//! module, or carries a [`Token`] of a `TypeDef`/`TypeRef`. The token is what makes a
//! signature module-bound: a signature is only valid inside the module that owns every token
//! it mentions, and moving one across modules requires
//! [`crate::metadata::image::Image::import_signature`].

use crate::{metadata::token::Token, Result};

/// Represents a type in various signatures
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TypeSignature {
    /// void
    #[default]
    Void,
    /// bool
    Boolean,
    /// char
    Char,
    /// signed 8bit integer
    I1,
    /// unsigned 8bit integer
    U1,
    /// signed 16bit integer
    I2,
    /// unsigned 16bit integer
    U2,
    /// signed 32bit integer
    I4,
    /// unsigned 32bit integer
    U4,
    /// signed 64bit integer
    I8,
    /// unsigned 64bit integer
    U8,
    /// 32bit floating-point
    R4,
    /// 64bit floating-point
    R8,
    /// System.String
    String,
    /// System.Object
    Object,
    /// signed integer, sized to executing platform
    I,
    /// unsigned integer, sized to executing platform
    U,
    /// CIL class
    // TypeDef | TypeRef
    Class(Token),
    /// CIL value-type
    // TypeDef | TypeRef
    ValueType(Token),
    /// Single dimension array
    SzArray(Box<TypeSignature>),
    /// Type by reference
    ByRef(Box<TypeSignature>),
    /// A pointer to a type
    Ptr(Box<TypeSignature>),
    /// Generic type and its arguments
    GenericInst(Box<TypeSignature>, Vec<TypeSignature>),
    /// Generic type parameter
    GenericParamType(u32),
    /// Generic method parameter
    GenericParamMethod(u32),
}

impl TypeSignature {
    /// Creates a class signature for `token`.
    #[must_use]
    pub fn class(token: Token) -> Self {
        TypeSignature::Class(token)
    }

    /// Creates a single dimension array of `element`.
    #[must_use]
    pub fn array_of(element: TypeSignature) -> Self {
        TypeSignature::SzArray(Box::new(element))
    }

    /// Creates a by-reference signature of `element`.
    #[must_use]
    pub fn by_ref(element: TypeSignature) -> Self {
        TypeSignature::ByRef(Box::new(element))
    }

    /// True for `void`.
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, TypeSignature::Void)
    }

    /// Collects every type token this signature mentions, outermost first.
    #[must_use]
    pub fn tokens(&self) -> Vec<Token> {
        let mut tokens = Vec::new();
        self.collect_tokens(&mut tokens);
        tokens
    }

    fn collect_tokens(&self, tokens: &mut Vec<Token>) {
        match self {
            TypeSignature::Class(token) | TypeSignature::ValueType(token) => tokens.push(*token),
            TypeSignature::SzArray(inner)
            | TypeSignature::ByRef(inner)
            | TypeSignature::Ptr(inner) => inner.collect_tokens(tokens),
            TypeSignature::GenericInst(base, args) => {
                base.collect_tokens(tokens);
                for arg in args {
                    arg.collect_tokens(tokens);
                }
            }
            _ => {}
        }
    }

    /// True if `token` appears anywhere in this signature.
    #[must_use]
    pub fn mentions(&self, token: Token) -> bool {
        match self {
            TypeSignature::Class(t) | TypeSignature::ValueType(t) => *t == token,
            TypeSignature::SzArray(inner)
            | TypeSignature::ByRef(inner)
            | TypeSignature::Ptr(inner) => inner.mentions(token),
            TypeSignature::GenericInst(base, args) => {
                base.mentions(token) || args.iter().any(|arg| arg.mentions(token))
            }
            _ => false,
        }
    }

    /// Replaces every occurrence of `old` with `new`, returning how many were replaced.
    pub fn replace(&mut self, old: Token, new: Token) -> usize {
        let mut count = 0;
        // Never fails, the closure is infallible
        let _ = self.try_map_tokens(&mut |token| {
            if token == old {
                count += 1;
                Ok(new)
            } else {
                Ok(token)
            }
        });
        count
    }

    /// Rewrites every token in place through `map`, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `map`.
    pub fn try_map_tokens<F>(&mut self, map: &mut F) -> Result<()>
    where
        F: FnMut(Token) -> Result<Token>,
    {
        match self {
            TypeSignature::Class(token) | TypeSignature::ValueType(token) => {
                *token = map(*token)?;
            }
            TypeSignature::SzArray(inner)
            | TypeSignature::ByRef(inner)
            | TypeSignature::Ptr(inner) => inner.try_map_tokens(map)?,
            TypeSignature::GenericInst(base, args) => {
                base.try_map_tokens(map)?;
                for arg in args.iter_mut() {
                    arg.try_map_tokens(map)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// The reflection name of a primitive element type (`System.Int32`), if this is one.
    #[must_use]
    pub fn primitive_name(&self) -> Option<&'static str> {
        let name = match self {
            TypeSignature::Void => "System.Void",
            TypeSignature::Boolean => "System.Boolean",
            TypeSignature::Char => "System.Char",
            TypeSignature::I1 => "System.SByte",
            TypeSignature::U1 => "System.Byte",
            TypeSignature::I2 => "System.Int16",
            TypeSignature::U2 => "System.UInt16",
            TypeSignature::I4 => "System.Int32",
            TypeSignature::U4 => "System.UInt32",
            TypeSignature::I8 => "System.Int64",
            TypeSignature::U8 => "System.UInt64",
            TypeSignature::R4 => "System.Single",
            TypeSignature::R8 => "System.Double",
            TypeSignature::String => "System.String",
            TypeSignature::Object => "System.Object",
            TypeSignature::I => "System.IntPtr",
            TypeSignature::U => "System.UIntPtr",
            _ => return None,
        };
        Some(name)
    }
}
