//! In-memory metadata store.
//!
//! The store models the parts of a CIL program image the instrumentation engine reads and
//! rewrites: modules, types, methods, fields, events and properties, plus the module-local
//! `TypeRef`/`MemberRef` entries that point from one module into another. Everything is held
//! by an [`image::Image`] arena and addressed by [`token::Token`].
//!
//! # Key Components
//!
//! - [`image::Image`] - the arena, ownership queries and symbol import
//! - [`builders`] - fluent population API used by container readers and tests
//! - [`method::MethodDef`] / [`method::MethodBody`] - routines and their code
//! - [`typedef::TypeDef`] / [`typedef::FieldDef`] - types and their members
//! - [`signatures::TypeSignature`] - module-bound type signatures
//! - [`attributes`] - ECMA-335 attribute flags

pub mod attributes;
pub mod builders;
pub mod exceptions;
pub mod image;
pub mod method;
pub mod module;
pub mod signatures;
pub mod token;
pub mod typedef;
