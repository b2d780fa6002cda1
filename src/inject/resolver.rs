//! Corpus-wide reference search and replacement.
//!
//! [`ReferenceResolver`] indexes the types of the modules it scanned and answers "where is
//! this symbol used?". Matching is by token identity: a `MemberRef` in module A and the
//! `MethodDef` it points to are different symbols, and a search for one never reports the
//! other. [`ReferenceResolver::find_imports_of`] bridges the two when a caller needs to follow
//! a definition into the modules that reference it.
//!
//! Member symbols (methods, fields) can only appear as instruction operands. Type symbols can
//! additionally appear in every signature slot of the graph; each hit is a
//! [`ReferenceSite`] naming exactly which slot matched.
//!
//! Scan order is deterministic: modules in scan order, their types depth-first in
//! declaration order (a type before its nested types), and within a type its slots in a
//! fixed order (base type, interfaces, methods, fields, events, properties).

use log::debug;
use rustc_hash::FxHashSet;

use crate::{
    assembly::Operand,
    metadata::{
        image::Image,
        token::{TableId, Token},
    },
    Error, Result,
};

/// A slot of the graph that holds a reference to a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceSite {
    /// Operand of the `index`-th instruction of `method`
    Instruction {
        /// The method owning the body
        method: Token,
        /// Instruction index
        index: usize,
    },
    /// Base type of `ty`
    BaseType {
        /// The derived type
        ty: Token,
    },
    /// The `index`-th implemented interface of `ty`
    Interface {
        /// The implementing type
        ty: Token,
        /// Interface index
        index: usize,
    },
    /// Type of `field`
    FieldType {
        /// The field
        field: Token,
    },
    /// Return type of `method`
    ReturnType {
        /// The method
        method: Token,
    },
    /// Type of the `index`-th declared parameter of `method`
    ParameterType {
        /// The method
        method: Token,
        /// Parameter index, not counting an implicit receiver
        index: usize,
    },
    /// Type of the `index`-th local of `method`
    LocalType {
        /// The method
        method: Token,
        /// Local slot
        index: usize,
    },
    /// Catch type of the `handler`-th exception handler of `method`
    CatchType {
        /// The method
        method: Token,
        /// Handler index
        handler: usize,
    },
    /// Delegate type of the `index`-th event of `ty`
    EventType {
        /// The declaring type
        ty: Token,
        /// Event index
        index: usize,
    },
    /// Type of the `index`-th property of `ty`
    PropertyType {
        /// The declaring type
        ty: Token,
        /// Property index
        index: usize,
    },
}

impl ReferenceSite {
    /// The method whose signature or body holds this site, if any.
    #[must_use]
    pub fn method(&self) -> Option<Token> {
        match self {
            ReferenceSite::Instruction { method, .. }
            | ReferenceSite::ReturnType { method }
            | ReferenceSite::ParameterType { method, .. }
            | ReferenceSite::LocalType { method, .. }
            | ReferenceSite::CatchType { method, .. } => Some(*method),
            _ => None,
        }
    }

    /// The entity holding this site, whose module owns the reference.
    #[must_use]
    pub fn holder(&self) -> Token {
        match self {
            ReferenceSite::Instruction { method, .. }
            | ReferenceSite::ReturnType { method }
            | ReferenceSite::ParameterType { method, .. }
            | ReferenceSite::LocalType { method, .. }
            | ReferenceSite::CatchType { method, .. } => *method,
            ReferenceSite::BaseType { ty }
            | ReferenceSite::Interface { ty, .. }
            | ReferenceSite::EventType { ty, .. }
            | ReferenceSite::PropertyType { ty, .. } => *ty,
            ReferenceSite::FieldType { field } => *field,
        }
    }
}

/// Kind of symbol a token names, after following references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolKind {
    Type,
    Method,
    Field,
}

fn symbol_kind(image: &Image, token: Token) -> Result<SymbolKind> {
    match image.resolve_definition(token)?.table_id() {
        Some(TableId::TypeDef) => Ok(SymbolKind::Type),
        Some(TableId::MethodDef) => Ok(SymbolKind::Method),
        Some(TableId::Field) => Ok(SymbolKind::Field),
        _ => Err(Error::UnsupportedSlot(format!(
            "{token} is neither a type nor a member"
        ))),
    }
}

/// Finds and rewrites references inside a scanned corpus.
#[derive(Debug, Default, Clone)]
pub struct ReferenceResolver {
    modules: Vec<Token>,
    types: Vec<Token>,
    scanned: FxHashSet<Token>,
}

impl ReferenceResolver {
    /// Creates a resolver with an empty corpus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver that scanned `module`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `module` is unknown.
    pub fn for_module(image: &Image, module: Token) -> Result<Self> {
        let mut resolver = Self::new();
        resolver.scan_module(image, module)?;
        Ok(resolver)
    }

    /// Adds `module`, all of its types and their nested types to the corpus.
    ///
    /// Rescanning a module only adds the types it gained since the last scan.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `module` or one of its types is unknown.
    pub fn scan_module(&mut self, image: &Image, module: Token) -> Result<()> {
        let types = &image.module(module)?.types;
        if self.scanned.insert(module) {
            self.modules.push(module);
        }
        for ty in types {
            self.scan_type(image, *ty)?;
        }
        Ok(())
    }

    /// Adds every module of `image`.
    ///
    /// # Errors
    ///
    /// Propagates errors of [`ReferenceResolver::scan_module`].
    pub fn scan_image(&mut self, image: &Image) -> Result<()> {
        for module in image.module_tokens() {
            self.scan_module(image, module)?;
        }
        Ok(())
    }

    /// Adds `ty` and, depth-first, its nested types. Types already in the corpus are not
    /// added again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `ty` is unknown.
    pub fn scan_type(&mut self, image: &Image, ty: Token) -> Result<()> {
        let nested_types = &image.type_def(ty)?.nested_types;
        if self.scanned.insert(ty) {
            self.types.push(ty);
        }
        for nested in nested_types {
            self.scan_type(image, *nested)?;
        }
        Ok(())
    }

    /// Scanned modules in scan order.
    #[must_use]
    pub fn modules(&self) -> &[Token] {
        &self.modules
    }

    /// Scanned types in scan order.
    #[must_use]
    pub fn types(&self) -> &[Token] {
        &self.types
    }

    /// Every slot of the corpus that references exactly `symbol`.
    ///
    /// For methods and fields only instruction operands are searched; for types every
    /// signature slot is searched as well.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedSlot`] if `symbol` names neither a type nor a member.
    pub fn find_all_references(&self, image: &Image, symbol: Token) -> Result<Vec<ReferenceSite>> {
        match symbol.table_id() {
            Some(TableId::TypeDef | TableId::TypeRef) => self.find_everywhere(image, symbol),
            Some(TableId::MethodDef | TableId::Field | TableId::MemberRef) => {
                self.find_in_instructions(image, symbol)
            }
            _ => Err(Error::UnsupportedSlot(format!(
                "{symbol} is neither a type nor a member"
            ))),
        }
    }

    fn find_in_instructions(&self, image: &Image, symbol: Token) -> Result<Vec<ReferenceSite>> {
        let mut sites = Vec::new();
        for ty in &self.types {
            for method in &image.type_def(*ty)?.methods {
                if let Some(body) = &image.method(*method)?.body {
                    sites.extend(body.sites_of(symbol).into_iter().map(|index| {
                        ReferenceSite::Instruction {
                            method: *method,
                            index,
                        }
                    }));
                }
            }
        }
        Ok(sites)
    }

    fn find_everywhere(&self, image: &Image, symbol: Token) -> Result<Vec<ReferenceSite>> {
        let mut sites = Vec::new();
        for ty in &self.types {
            let ty = *ty;
            let def = image.type_def(ty)?;

            if def.extends.as_ref().is_some_and(|base| base.mentions(symbol)) {
                sites.push(ReferenceSite::BaseType { ty });
            }
            for (index, interface) in def.interfaces.iter().enumerate() {
                if interface.mentions(symbol) {
                    sites.push(ReferenceSite::Interface { ty, index });
                }
            }

            for method in &def.methods {
                let method = *method;
                let m = image.method(method)?;
                if m.return_type.mentions(symbol) {
                    sites.push(ReferenceSite::ReturnType { method });
                }
                for (index, param) in m.params.iter().enumerate() {
                    if param.signature.mentions(symbol) {
                        sites.push(ReferenceSite::ParameterType { method, index });
                    }
                }
                let Some(body) = &m.body else {
                    continue;
                };
                for index in body.sites_of(symbol) {
                    sites.push(ReferenceSite::Instruction { method, index });
                }
                for (index, local) in body.locals.iter().enumerate() {
                    if local.signature.mentions(symbol) {
                        sites.push(ReferenceSite::LocalType { method, index });
                    }
                }
                for (handler, eh) in body.exception_handlers.iter().enumerate() {
                    if eh.catch_type.as_ref().is_some_and(|c| c.mentions(symbol)) {
                        sites.push(ReferenceSite::CatchType { method, handler });
                    }
                }
            }

            for field in &def.fields {
                if image.field(*field)?.signature.mentions(symbol) {
                    sites.push(ReferenceSite::FieldType { field: *field });
                }
            }
            for (index, event) in def.events.iter().enumerate() {
                if event.event_type.mentions(symbol) {
                    sites.push(ReferenceSite::EventType { ty, index });
                }
            }
            for (index, property) in def.properties.iter().enumerate() {
                if property.signature.mentions(symbol) {
                    sites.push(ReferenceSite::PropertyType { ty, index });
                }
            }
        }
        Ok(sites)
    }

    /// Module-local references in the scanned modules that resolve to `definition`.
    #[must_use]
    pub fn find_imports_of(&self, image: &Image, definition: Token) -> Vec<Token> {
        self.modules
            .iter()
            .flat_map(|module| image.references_in(*module, definition))
            .collect()
    }

    /// Rewrites every reference to `old` into a reference to `new`.
    ///
    /// With `import`, `new` is first imported into the module owning each site, so a
    /// replacement may reach across module boundaries safely. Returns the number of
    /// rewritten slots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedSlot`] if `old` and `new` name different kinds of
    /// symbols, plus errors of [`Image::import`].
    pub fn replace_all_references(
        &self,
        image: &mut Image,
        old: Token,
        new: Token,
        import: bool,
    ) -> Result<usize> {
        self.replace_references_where(image, old, new, import, |_| true)
    }

    /// Like [`ReferenceResolver::replace_all_references`], limited to sites accepted by
    /// `filter`.
    ///
    /// # Errors
    ///
    /// See [`ReferenceResolver::replace_all_references`].
    pub fn replace_references_where<F>(
        &self,
        image: &mut Image,
        old: Token,
        new: Token,
        import: bool,
        filter: F,
    ) -> Result<usize>
    where
        F: Fn(&ReferenceSite) -> bool,
    {
        let old_kind = symbol_kind(image, old)?;
        let new_kind = symbol_kind(image, new)?;
        if old_kind != new_kind {
            return Err(Error::UnsupportedSlot(format!(
                "cannot replace {old_kind:?} {old} with {new_kind:?} {new}"
            )));
        }

        let sites = self.find_all_references(image, old)?;
        let mut replaced = 0;
        for site in sites.iter().filter(|site| filter(site)) {
            let replacement = if import {
                let module = image.owner_module(site.holder())?;
                image.import(new, module)?
            } else {
                new
            };
            Self::apply(image, site, old, replacement)?;
            replaced += 1;
        }

        debug!("replaced {replaced} references to {old} with {new}");
        Ok(replaced)
    }

    fn apply(image: &mut Image, site: &ReferenceSite, old: Token, new: Token) -> Result<()> {
        let missing = || Error::NotFound(format!("reference site {site:?}"));
        match *site {
            ReferenceSite::Instruction { method, index } => {
                let body = image.method_mut(method)?.body.as_mut().ok_or_else(missing)?;
                let instruction = body.instructions.get_mut(index).ok_or_else(missing)?;
                instruction.operand = Operand::Token(new);
            }
            ReferenceSite::BaseType { ty } => {
                let base = image.type_def_mut(ty)?.extends.as_mut().ok_or_else(missing)?;
                base.replace(old, new);
            }
            ReferenceSite::Interface { ty, index } => {
                let def = image.type_def_mut(ty)?;
                def.interfaces.get_mut(index).ok_or_else(missing)?.replace(old, new);
            }
            ReferenceSite::FieldType { field } => {
                image.field_mut(field)?.signature.replace(old, new);
            }
            ReferenceSite::ReturnType { method } => {
                image.method_mut(method)?.return_type.replace(old, new);
            }
            ReferenceSite::ParameterType { method, index } => {
                let param = image.method_mut(method)?.params.get_mut(index).ok_or_else(missing)?;
                param.signature.replace(old, new);
            }
            ReferenceSite::LocalType { method, index } => {
                let body = image.method_mut(method)?.body.as_mut().ok_or_else(missing)?;
                let local = body.locals.get_mut(index).ok_or_else(missing)?;
                local.signature.replace(old, new);
            }
            ReferenceSite::CatchType { method, handler } => {
                let body = image.method_mut(method)?.body.as_mut().ok_or_else(missing)?;
                let eh = body.exception_handlers.get_mut(handler).ok_or_else(missing)?;
                eh.catch_type.as_mut().ok_or_else(missing)?.replace(old, new);
            }
            ReferenceSite::EventType { ty, index } => {
                let def = image.type_def_mut(ty)?;
                def.events.get_mut(index).ok_or_else(missing)?.event_type.replace(old, new);
            }
            ReferenceSite::PropertyType { ty, index } => {
                let def = image.type_def_mut(ty)?;
                def.properties.get_mut(index).ok_or_else(missing)?.signature.replace(old, new);
            }
        }
        Ok(())
    }
}
