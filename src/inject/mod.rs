//! Offline instrumentation of a loaded image.
//!
//! This module holds the engine that edits an [`crate::metadata::image::Image`] in place:
//!
//! - [`SymbolLocator`] finds types and methods by name or by runtime handle.
//! - [`ReferenceResolver`] finds and rewrites every use of a symbol in a scanned corpus.
//! - [`CodeInjector`] clones methods and types between modules and installs method and
//!   field hooks.
//! - [`CodeSplicer`] weaves fragments into the entry or exits of an existing body.
//!
//! All edits happen on the in-memory graph. Serializing the result is up to the container
//! writer that produced the image.
//!
//! # Examples
//!
//! ```rust
//! use cilhook::inject::{CodeInjector, CodeSplicer, ReferenceResolver};
//! use cilhook::metadata::{
//!     builders::{MethodBuilder, TypeBuilder},
//!     image::Image,
//!     signatures::TypeSignature,
//! };
//!
//! let mut image = Image::new();
//! let app = image.add_module("App")?;
//! let program = TypeBuilder::new("App", "Program").build(&mut image, app)?;
//! let twice = MethodBuilder::new("Twice")
//!     .static_method()
//!     .param("x", TypeSignature::I4)
//!     .returns(TypeSignature::I4)
//!     .body(|asm| {
//!         asm.ldarg_0()?.ldc_i4(2)?.mul()?.ret()?;
//!         Ok(())
//!     })
//!     .build(&mut image, program)?;
//! let plus_one = MethodBuilder::new("PlusOne")
//!     .static_method()
//!     .param("x", TypeSignature::I4)
//!     .param("result", TypeSignature::I4)
//!     .returns(TypeSignature::I4)
//!     .body(|asm| {
//!         asm.ldarg_1()?.ldc_i4(1)?.add()?.ret()?;
//!         Ok(())
//!     })
//!     .build(&mut image, program)?;
//!
//! CodeSplicer::new(&mut image).splice_after(twice, plus_one)?;
//! let copy = CodeInjector::new(&mut image).inject_method(program, twice, Some("TwiceCopy"))?;
//!
//! let resolver = ReferenceResolver::for_module(&image, app)?;
//! assert!(resolver.find_all_references(&image, copy)?.is_empty());
//! # Ok::<(), cilhook::Error>(())
//! ```

mod config;
mod detached;
mod injector;
mod locator;
mod resolver;
mod splicer;

pub use config::InjectorConfig;
pub use detached::{DetachedField, DetachedMethod, DetachedType};
pub use injector::{CodeInjector, HookedMethod};
pub use locator::{RuntimeMethodHandle, RuntimeTypeHandle, SymbolLocator};
pub use resolver::{ReferenceResolver, ReferenceSite};
pub use splicer::CodeSplicer;
