//! Owned copies of methods and types that do not belong to any image.
//!
//! A detached value is what clone operations produce and attach operations consume. It owns
//! all of its data, so editing it never reaches back into the donor. Symbolic operands and
//! signatures inside a detached value keep pointing at the donor's symbols until the copy is
//! attached and its references are fixed.

use crate::metadata::{
    method::MethodDef,
    token::Token,
    typedef::{EventDef, FieldDef, PropertyDef, TypeDef},
};

/// A cloned method that is not attached to any type.
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedMethod {
    pub(crate) def: MethodDef,
    pub(crate) source: Token,
}

impl DetachedMethod {
    /// The method this copy was cloned from.
    #[must_use]
    pub fn source(&self) -> Token {
        self.source
    }

    /// Name the method will be attached under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Renames the copy.
    pub fn set_name(&mut self, name: &str) {
        self.def.name = name.to_string();
    }

    /// The copied definition. Its token is null and it has no declaring type.
    #[must_use]
    pub fn def(&self) -> &MethodDef {
        &self.def
    }

    /// The copied definition for editing before attachment.
    pub fn def_mut(&mut self) -> &mut MethodDef {
        &mut self.def
    }
}

/// A cloned field that is not attached to any type.
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedField {
    pub(crate) def: FieldDef,
    pub(crate) source: Token,
}

impl DetachedField {
    /// The field this copy was cloned from.
    #[must_use]
    pub fn source(&self) -> Token {
        self.source
    }

    /// The copied definition.
    #[must_use]
    pub fn def(&self) -> &FieldDef {
        &self.def
    }

    /// The copied definition for editing before attachment.
    pub fn def_mut(&mut self) -> &mut FieldDef {
        &mut self.def
    }
}

/// A cloned type tree that is not attached to any module.
///
/// Events and properties address their accessors by index into [`DetachedType::methods`],
/// so they stay bound to the cloned methods rather than the donor's.
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedType {
    pub(crate) def: TypeDef,
    pub(crate) fields: Vec<DetachedField>,
    pub(crate) methods: Vec<DetachedMethod>,
    pub(crate) events: Vec<EventDef<usize>>,
    pub(crate) properties: Vec<PropertyDef<usize>>,
    pub(crate) nested: Vec<DetachedType>,
    pub(crate) source: Token,
}

impl DetachedType {
    /// The type this copy was cloned from.
    #[must_use]
    pub fn source(&self) -> Token {
        self.source
    }

    /// Simple name the type will be attached under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Renames the copy.
    pub fn set_name(&mut self, name: &str) {
        self.def.name = name.to_string();
    }

    /// Moves the copy into another namespace.
    pub fn set_namespace(&mut self, namespace: &str) {
        self.def.namespace = namespace.to_string();
    }

    /// The copied type header. Member lists are empty; members live in this value.
    #[must_use]
    pub fn def(&self) -> &TypeDef {
        &self.def
    }

    /// The copied type header for editing before attachment.
    pub fn def_mut(&mut self) -> &mut TypeDef {
        &mut self.def
    }

    /// Cloned fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[DetachedField] {
        &self.fields
    }

    /// Cloned methods in declaration order, followed by accessors that were declared
    /// outside the donor type.
    #[must_use]
    pub fn methods(&self) -> &[DetachedMethod] {
        &self.methods
    }

    /// Cloned methods for editing before attachment.
    pub fn methods_mut(&mut self) -> &mut [DetachedMethod] {
        &mut self.methods
    }

    /// Cloned events, accessors as indices into [`DetachedType::methods`].
    #[must_use]
    pub fn events(&self) -> &[EventDef<usize>] {
        &self.events
    }

    /// Cloned properties, accessors as indices into [`DetachedType::methods`].
    #[must_use]
    pub fn properties(&self) -> &[PropertyDef<usize>] {
        &self.properties
    }

    /// Cloned nested types.
    #[must_use]
    pub fn nested(&self) -> &[DetachedType] {
        &self.nested
    }

    /// Number of types in this tree, the root included.
    #[must_use]
    pub fn type_count(&self) -> usize {
        1 + self.nested.iter().map(DetachedType::type_count).sum::<usize>()
    }
}
