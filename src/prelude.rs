//! # cilhook Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from the
//! cilhook library. Import this module to get quick access to the image, its builders and
//! the instrumentation entry points.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cilhook operations
pub use crate::Error;

/// The result type used throughout cilhook
pub use crate::Result;

// ================================================================================================
// Metadata Store
// ================================================================================================

/// The arena holding every module, type and member
pub use crate::metadata::image::Image;

/// Metadata token type for addressing arena entries
pub use crate::metadata::token::{TableId, Token};

/// Entities of the store
pub use crate::metadata::{
    exceptions::{ExceptionHandler, ExceptionHandlerFlags},
    method::{CallingConvention, LocalVariable, MethodBody, MethodDef, Param},
    module::{MemberRef, Module, TypeRef},
    signatures::TypeSignature,
    typedef::{Constant, EventDef, FieldDef, PropertyDef, TypeDef},
};

/// Attribute flags
pub use crate::metadata::attributes::{
    EventAttributes, FieldAttributes, MethodAttributes, MethodImplAttributes, ParamAttributes,
    PropertyAttributes, TypeAttributes,
};

// ================================================================================================
// Builders
// ================================================================================================

/// Fluent population API
pub use crate::metadata::builders::{
    EventBuilder, FieldBuilder, MethodBuilder, PropertyBuilder, TypeBuilder,
};

// ================================================================================================
// Instructions
// ================================================================================================

/// Decoded instructions and the label-resolving assembler
pub use crate::assembly::{FlowType, Immediate, Instruction, InstructionAssembler, OpCode, Operand};

// ================================================================================================
// Instrumentation
// ================================================================================================

/// Symbol lookup by name or runtime handle
pub use crate::inject::{RuntimeMethodHandle, RuntimeTypeHandle, SymbolLocator};

/// Reference search and replacement
pub use crate::inject::{ReferenceResolver, ReferenceSite};

/// Injection, hooking and splicing
pub use crate::inject::{
    CodeInjector, CodeSplicer, DetachedMethod, DetachedType, HookedMethod, InjectorConfig,
};
