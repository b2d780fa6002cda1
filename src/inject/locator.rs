//! Path-based symbol lookup.
//!
//! [`SymbolLocator`] finds types and methods of scanned modules by name. Paths use the
//! reflection conventions: a top-level type is named by its full name (`Target.Program`) and
//! nested types are chained with `+` (`Target.Program+Inner`). Every resolved prefix is
//! memoized, so walking the same outer types again only costs hash lookups.
//!
//! Runtime handles ([`RuntimeTypeHandle`], [`RuntimeMethodHandle`]) describe a symbol the
//! way a reflection API reports it; the locator maps them back onto graph entities.
//!
//! # Examples
//!
//! ```rust
//! use cilhook::inject::SymbolLocator;
//! use cilhook::metadata::{builders::{MethodBuilder, TypeBuilder}, image::Image};
//!
//! let mut image = Image::new();
//! let module = image.add_module("Target")?;
//! let program = TypeBuilder::new("Target", "Program").build(&mut image, module)?;
//! let main = MethodBuilder::new("Main").static_method().build(&mut image, program)?;
//!
//! let mut locator = SymbolLocator::new();
//! locator.scan_module(&image, module)?;
//! assert_eq!(locator.find_type(&image, "Target.Program")?, program);
//! assert_eq!(locator.find_method_by_path(&image, "Target.Program.Main")?, main);
//! # Ok::<(), cilhook::Error>(())
//! ```

use log::trace;
use rustc_hash::FxHashMap;

use crate::{
    metadata::{image::Image, token::Token},
    Error, Result,
};

/// A type as identified by a reflection API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuntimeTypeHandle {
    /// Reflection full name, `Namespace.Outer+Inner`
    pub full_name: String,
}

impl RuntimeTypeHandle {
    /// Creates a handle from a reflection full name.
    #[must_use]
    pub fn new(full_name: &str) -> Self {
        RuntimeTypeHandle {
            full_name: full_name.to_string(),
        }
    }
}

/// A method as identified by a reflection API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuntimeMethodHandle {
    /// The declaring type
    pub declaring_type: RuntimeTypeHandle,
    /// Method name
    pub name: String,
    /// Reflection names of the parameter types, in declaration order (`System.Int32`)
    pub parameter_types: Vec<String>,
}

impl RuntimeMethodHandle {
    /// Creates a handle for `declaring_type::name(parameter_types)`.
    #[must_use]
    pub fn new(declaring_type: &str, name: &str, parameter_types: &[&str]) -> Self {
        RuntimeMethodHandle {
            declaring_type: RuntimeTypeHandle::new(declaring_type),
            name: name.to_string(),
            parameter_types: parameter_types.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}

fn exactly_one(query: &str, mut candidates: Vec<Token>) -> Result<Token> {
    match candidates.len() {
        0 => Err(Error::NotFound(query.to_string())),
        1 => Ok(candidates.remove(0)),
        count => Err(Error::AmbiguousMatch {
            query: query.to_string(),
            count,
        }),
    }
}

/// Resolves path names of scanned modules to types and methods.
#[derive(Debug, Default)]
pub struct SymbolLocator {
    types: Vec<Token>,
    cache: FxHashMap<String, Token>,
}

impl SymbolLocator {
    /// Creates a locator without scanned modules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the top-level types of `module` to the search space.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `module` is unknown.
    pub fn scan_module(&mut self, image: &Image, module: Token) -> Result<()> {
        self.types.extend(image.module(module)?.types.iter().copied());
        Ok(())
    }

    /// Adds the top-level types of every module of `image`.
    ///
    /// # Errors
    ///
    /// Propagates errors of [`SymbolLocator::scan_module`].
    pub fn scan_image(&mut self, image: &Image) -> Result<()> {
        for module in image.module_tokens() {
            self.scan_module(image, module)?;
        }
        Ok(())
    }

    /// The top-level types in scan order.
    #[must_use]
    pub fn types(&self) -> &[Token] {
        &self.types
    }

    /// Resolves a `+`-separated type path.
    ///
    /// A trailing `+` is ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::PreconditionViolated`] if the path starts with `+`
    /// - [`Error::NotFound`] if a path component matches no type
    /// - [`Error::AmbiguousMatch`] if a path component matches several types
    pub fn find_type(&mut self, image: &Image, path: &str) -> Result<Token> {
        if path.starts_with('+') {
            return Err(precondition_error!("type path '{}' must not start with '+'", path));
        }
        let path = path.strip_suffix('+').unwrap_or(path);

        let mut components = path.split('+');
        let first = components.next().unwrap_or_default();
        let mut cache_path = format!("+{first}");

        let mut current = match self.cache.get(&cache_path) {
            Some(token) => *token,
            None => {
                let mut candidates = Vec::new();
                for ty in &self.types {
                    if image.type_def(*ty)?.qualified_name() == first {
                        candidates.push(*ty);
                    }
                }
                let found = exactly_one(first, candidates)?;
                self.cache.insert(cache_path.clone(), found);
                found
            }
        };

        for name in components {
            cache_path.push('+');
            cache_path.push_str(name);
            current = match self.cache.get(&cache_path) {
                Some(token) => *token,
                None => {
                    let mut candidates = Vec::new();
                    for nested in &image.type_def(current)?.nested_types {
                        if image.type_def(*nested)?.name == name {
                            candidates.push(*nested);
                        }
                    }
                    let found = exactly_one(&cache_path[1..], candidates)?;
                    self.cache.insert(cache_path.clone(), found);
                    found
                }
            };
        }

        trace!("resolved type path '{path}' to {current}");
        Ok(current)
    }

    /// All methods of the type at `path` named `name`, in declaration order.
    ///
    /// # Errors
    ///
    /// Propagates errors of [`SymbolLocator::find_type`].
    pub fn find_methods(&mut self, image: &Image, path: &str, name: &str) -> Result<Vec<Token>> {
        self.find_methods_where(image, path, |candidate| candidate == name)
    }

    /// The single method of the type at `path` named `name`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if there is none, [`Error::AmbiguousMatch`] if there are several
    /// (overloads), plus errors of [`SymbolLocator::find_type`].
    pub fn find_method(&mut self, image: &Image, path: &str, name: &str) -> Result<Token> {
        let methods = self.find_methods(image, path, name)?;
        exactly_one(&format!("{path}.{name}"), methods)
    }

    /// All methods named by a `Type.Path.Method` path, split at the last `.`.
    ///
    /// # Errors
    ///
    /// [`Error::PreconditionViolated`] if the path holds no `.`, plus errors of
    /// [`SymbolLocator::find_methods`].
    pub fn find_methods_by_path(&mut self, image: &Image, path: &str) -> Result<Vec<Token>> {
        let (type_path, name) = path
            .rsplit_once('.')
            .ok_or_else(|| precondition_error!("method path '{}' names no type", path))?;
        self.find_methods(image, type_path, name)
    }

    /// The single method named by a `Type.Path.Method` path.
    ///
    /// # Errors
    ///
    /// See [`SymbolLocator::find_methods_by_path`] and [`SymbolLocator::find_method`].
    pub fn find_method_by_path(&mut self, image: &Image, path: &str) -> Result<Token> {
        let methods = self.find_methods_by_path(image, path)?;
        exactly_one(path, methods)
    }

    /// Methods of the type at `path` whose name satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// Propagates errors of [`SymbolLocator::find_type`].
    pub fn find_methods_where<P>(
        &mut self,
        image: &Image,
        path: &str,
        predicate: P,
    ) -> Result<Vec<Token>>
    where
        P: Fn(&str) -> bool,
    {
        let ty = self.find_type(image, path)?;
        let mut methods = Vec::new();
        for method in &image.type_def(ty)?.methods {
            if predicate(&image.method(*method)?.name) {
                methods.push(*method);
            }
        }
        Ok(methods)
    }

    /// Maps a reflection type handle onto its graph type.
    ///
    /// # Errors
    ///
    /// See [`SymbolLocator::find_type`].
    pub fn type_from_handle(&mut self, image: &Image, handle: &RuntimeTypeHandle) -> Result<Token> {
        self.find_type(image, &handle.full_name)
    }

    /// Maps a reflection method handle onto its graph method.
    ///
    /// A method matches when its name is equal and its parameter types, rendered as
    /// reflection names, equal the handle's positionally.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no method matches, [`Error::AmbiguousMatch`] if several do,
    /// plus errors of [`SymbolLocator::find_type`].
    pub fn method_from_handle(
        &mut self,
        image: &Image,
        handle: &RuntimeMethodHandle,
    ) -> Result<Token> {
        let ty = self.type_from_handle(image, &handle.declaring_type)?;

        let mut candidates = Vec::new();
        for token in &image.type_def(ty)?.methods {
            let method = image.method(*token)?;
            if method.name != handle.name || method.params.len() != handle.parameter_types.len()
            {
                continue;
            }
            let mut matches = true;
            for (param, expected) in method.params.iter().zip(&handle.parameter_types) {
                if image.signature_name(&param.signature)? != *expected {
                    matches = false;
                    break;
                }
            }
            if matches {
                candidates.push(*token);
            }
        }

        let query = format!(
            "{}.{}({})",
            handle.declaring_type.full_name,
            handle.name,
            handle.parameter_types.join(", ")
        );
        exactly_one(&query, candidates)
    }
}
