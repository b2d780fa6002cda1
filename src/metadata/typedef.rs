//! Types and their members: fields, events and properties.

use crate::{
    metadata::{
        attributes::{EventAttributes, FieldAttributes, PropertyAttributes, TypeAttributes},
        signatures::TypeSignature,
        token::Token,
    },
    Result,
};

/// Compile time constant attached to a field (`Constant` table).
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// bool
    Boolean(bool),
    /// char
    Char(u16),
    /// signed 8bit integer
    I1(i8),
    /// unsigned 8bit integer
    U1(u8),
    /// signed 16bit integer
    I2(i16),
    /// unsigned 16bit integer
    U2(u16),
    /// signed 32bit integer
    I4(i32),
    /// unsigned 32bit integer
    U4(u32),
    /// signed 64bit integer
    I8(i64),
    /// unsigned 64bit integer
    U8(u64),
    /// 32bit floating-point
    R4(f32),
    /// 64bit floating-point
    R8(f64),
    /// string literal
    String(String),
    /// null reference
    Null,
}

/// A field definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// The token of this field
    pub token: Token,
    /// Field name
    pub name: String,
    /// Field flags
    pub flags: FieldAttributes,
    /// Field type
    pub signature: TypeSignature,
    /// Default value
    pub constant: Option<Constant>,
    /// Initial value blob (field RVA data)
    pub initial_value: Option<Vec<u8>>,
    /// Declaring type, absent while the field is not attached
    pub declaring_type: Option<Token>,
}

impl FieldDef {
    /// True if the field is declared `static`.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldAttributes::STATIC)
    }
}

/// An event and its accessor methods.
///
/// `A` is the accessor handle: a method [`Token`] once attached, or an index into a
/// detached method list while the event belongs to a clone.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDef<A = Token> {
    /// Event name
    pub name: String,
    /// Event flags
    pub flags: EventAttributes,
    /// Delegate type of the event
    pub event_type: TypeSignature,
    /// `add_` accessor
    pub add: Option<A>,
    /// `remove_` accessor
    pub remove: Option<A>,
    /// `raise_` accessor
    pub raise: Option<A>,
    /// Other accessors
    pub others: Vec<A>,
}

impl<A: Copy> EventDef<A> {
    /// Every accessor of this event.
    #[must_use]
    pub fn accessors(&self) -> Vec<A> {
        self.add
            .iter()
            .chain(self.remove.iter())
            .chain(self.raise.iter())
            .chain(self.others.iter())
            .copied()
            .collect()
    }

    /// Converts the accessor handles through `map`.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `map`.
    pub fn try_map_accessors<B, F>(&self, mut map: F) -> Result<EventDef<B>>
    where
        F: FnMut(A) -> Result<B>,
    {
        Ok(EventDef {
            name: self.name.clone(),
            flags: self.flags,
            event_type: self.event_type.clone(),
            add: self.add.map(&mut map).transpose()?,
            remove: self.remove.map(&mut map).transpose()?,
            raise: self.raise.map(&mut map).transpose()?,
            others: self.others.iter().map(|a| map(*a)).collect::<Result<_>>()?,
        })
    }
}

/// A property and its accessor methods.
///
/// `A` follows the same convention as [`EventDef`].
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDef<A = Token> {
    /// Property name
    pub name: String,
    /// Property flags
    pub flags: PropertyAttributes,
    /// Property type
    pub signature: TypeSignature,
    /// `get_` accessor
    pub getter: Option<A>,
    /// `set_` accessor
    pub setter: Option<A>,
    /// Other accessors
    pub others: Vec<A>,
}

impl<A: Copy> PropertyDef<A> {
    /// Every accessor of this property.
    #[must_use]
    pub fn accessors(&self) -> Vec<A> {
        self.getter
            .iter()
            .chain(self.setter.iter())
            .chain(self.others.iter())
            .copied()
            .collect()
    }

    /// Converts the accessor handles through `map`.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `map`.
    pub fn try_map_accessors<B, F>(&self, mut map: F) -> Result<PropertyDef<B>>
    where
        F: FnMut(A) -> Result<B>,
    {
        Ok(PropertyDef {
            name: self.name.clone(),
            flags: self.flags,
            signature: self.signature.clone(),
            getter: self.getter.map(&mut map).transpose()?,
            setter: self.setter.map(&mut map).transpose()?,
            others: self.others.iter().map(|a| map(*a)).collect::<Result<_>>()?,
        })
    }
}

/// A type definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    /// The token of this type
    pub token: Token,
    /// Namespace, empty for nested types and the global namespace
    pub namespace: String,
    /// Simple name
    pub name: String,
    /// Type flags
    pub flags: TypeAttributes,
    /// Base type, absent for interfaces and `System.Object`
    pub extends: Option<TypeSignature>,
    /// Implemented interfaces
    pub interfaces: Vec<TypeSignature>,
    /// Fields in declaration order
    pub fields: Vec<Token>,
    /// Methods in declaration order
    pub methods: Vec<Token>,
    /// Events
    pub events: Vec<EventDef>,
    /// Properties
    pub properties: Vec<PropertyDef>,
    /// Nested types in declaration order
    pub nested_types: Vec<Token>,
    /// Enclosing type for nested types
    pub declaring_type: Option<Token>,
    /// Owning module, absent while the type is not attached
    pub module: Option<Token>,
}

impl TypeDef {
    /// True if this type is nested inside another type.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.declaring_type.is_some()
    }

    /// `Namespace.Name`, or `Name` in the global namespace.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}
