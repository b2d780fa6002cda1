// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # cilhook
//!
//! Offline instrumentation for CIL programs. `cilhook` operates on an in-memory image of one
//! or more modules and rewrites it so that existing methods and field accesses run code that
//! was authored elsewhere, without recompiling the target.
//!
//! ## Features
//!
//! - **Method hooks** - replace a method with a hook that can still call the original
//! - **Field hooks** - route every load or store of a field through an accessor
//! - **Splicing** - weave a fragment into the entry or every exit of a body
//! - **Cross-module cloning** - copy methods and whole type trees into another module,
//!   importing every symbol they touch
//! - **Reference search** - find and rewrite every use of a type, method or field
//!
//! ## Quick Start
//!
//! ```rust
//! use cilhook::prelude::*;
//!
//! let mut image = Image::new();
//! let target = image.add_module("Target")?;
//! let hooks = image.add_module("Hooks")?;
//!
//! let program = TypeBuilder::new("Target", "Program").build(&mut image, target)?;
//! let add = MethodBuilder::new("Add")
//!     .static_method()
//!     .param("a", TypeSignature::I4)
//!     .param("b", TypeSignature::I4)
//!     .returns(TypeSignature::I4)
//!     .body(|asm| {
//!         asm.ldarg_0()?.ldarg_1()?.add()?.ret()?;
//!         Ok(())
//!     })
//!     .build(&mut image, program)?;
//!
//! let donor = TypeBuilder::new("Hooks", "Hooks").build(&mut image, hooks)?;
//! let hook = MethodBuilder::new("Add")
//!     .static_method()
//!     .param("a", TypeSignature::I4)
//!     .param("b", TypeSignature::I4)
//!     .returns(TypeSignature::I4)
//!     .body(|asm| {
//!         asm.ldarg_0()?.ldarg_1()?.mul()?.ret()?;
//!         Ok(())
//!     })
//!     .build(&mut image, donor)?;
//!
//! let hooked = CodeInjector::new(&mut image).hook_method(add, hook, None)?;
//! assert_eq!(image.method(hooked.hook)?.name, "Add");
//! assert_eq!(image.method(hooked.original)?.name, "__hooked__Add");
//! # Ok::<(), cilhook::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - the image arena, its entities and the builder API that populates it
//! - [`assembly`] - opcodes, instructions and the label-resolving assembler
//! - [`inject`] - locator, resolver, injector and splicer
//!
//! Reading and writing binary containers is left to a separate reader/writer; this crate only
//! models what instrumentation needs.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result`]. Edits are applied in place; an error leaves the
//! image partially modified and the caller is expected to discard it.
//!
//! ## Logging
//!
//! Structural edits are reported through the [`log`] facade at `debug` level, individual
//! instruction rewrites at `trace` level. The library never installs a logger.

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use cilhook::prelude::*;
///
/// let mut image = Image::new();
/// let module = image.add_module("App")?;
/// let mut locator = SymbolLocator::new();
/// locator.scan_module(&image, module)?;
/// assert!(locator.types().is_empty());
/// # Ok::<(), cilhook::Error>(())
/// ```
pub mod prelude;

/// CIL instructions and their assembly.
///
/// Instructions are stored decoded: an opcode plus a typed operand. Branch operands are
/// indices into the instruction vector of the same body, which is what lets the injector and
/// splicer move code around without re-encoding offsets.
///
/// # Example
///
/// ```rust
/// use cilhook::assembly::{InstructionAssembler, OpCode};
///
/// let mut asm = InstructionAssembler::new();
/// asm.ldarg_0()?.brtrue("yes")?.ldc_i4(0)?.ret()?.label("yes")?.ldc_i4(1)?.ret()?;
/// let code = asm.finish()?;
/// assert_eq!(code[1].opcode, OpCode::BrtrueS);
/// # Ok::<(), cilhook::Error>(())
/// ```
pub mod assembly;

/// The in-memory metadata store.
///
/// See [`metadata::image::Image`] for the arena and its import semantics, and
/// [`metadata::builders`] for populating it.
pub mod metadata;

/// Instrumentation: locating symbols, rewriting references, injecting and splicing code.
///
/// See [`inject::CodeInjector`] and [`inject::CodeSplicer`] for the entry points.
pub mod inject;

/// `cilhook` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `cilhook` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust
/// use cilhook::{inject::SymbolLocator, metadata::image::Image, Error};
///
/// let image = Image::new();
/// let mut locator = SymbolLocator::new();
/// match locator.find_type(&image, "Missing.Type") {
///     Err(Error::NotFound(what)) => println!("not found: {what}"),
///     Err(Error::AmbiguousMatch { query, count }) => println!("{count} matches for {query}"),
///     Err(e) => println!("error: {e}"),
///     Ok(_) => unreachable!(),
/// }
/// ```
pub use error::Error;
