//! Fluent builders that populate an [`Image`].
//!
//! This is the surface a container reader (or a test) uses to describe a program: modules are
//! added on the image directly, types, fields and methods through the builders here. Method
//! bodies are written with an [`InstructionAssembler`] closure, the same way they are when
//! compiling new code.
//!
//! # Examples
//!
//! ```rust
//! use cilhook::metadata::{
//!     builders::{FieldBuilder, MethodBuilder, TypeBuilder},
//!     image::Image,
//!     signatures::TypeSignature,
//! };
//!
//! let mut image = Image::new();
//! let module = image.add_module("Target")?;
//! let ty = TypeBuilder::new("Target", "Counter").build(&mut image, module)?;
//! let value = FieldBuilder::new("value", TypeSignature::I4).build(&mut image, ty)?;
//! let get = MethodBuilder::new("Get")
//!     .returns(TypeSignature::I4)
//!     .body(move |asm| {
//!         asm.ldarg_0()?.ldfld(value)?.ret()?;
//!         Ok(())
//!     })
//!     .build(&mut image, ty)?;
//!
//! assert_eq!(image.method(get)?.declaring_type, Some(ty));
//! # Ok::<(), cilhook::Error>(())
//! ```

use crate::{
    assembly::InstructionAssembler,
    metadata::{
        attributes::{
            EventAttributes, FieldAttributes, MethodAttributes, MethodImplAttributes,
            PropertyAttributes, TypeAttributes,
        },
        exceptions::ExceptionHandler,
        image::Image,
        method::{CallingConvention, LocalVariable, MethodBody, MethodDef, Param},
        signatures::TypeSignature,
        token::Token,
        typedef::{Constant, EventDef, FieldDef, PropertyDef, TypeDef},
    },
    Result,
};

/// Type alias for method body implementation closures
type ImplementationFn = Box<dyn FnOnce(&mut InstructionAssembler) -> Result<()>>;

/// Builder for type definitions.
pub struct TypeBuilder {
    namespace: String,
    name: String,
    flags: TypeAttributes,
    extends: Option<TypeSignature>,
    interfaces: Vec<TypeSignature>,
}

impl TypeBuilder {
    /// Starts a public class `namespace.name` deriving from `System.Object`.
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        TypeBuilder {
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags: TypeAttributes::PUBLIC,
            extends: Some(TypeSignature::Object),
            interfaces: Vec::new(),
        }
    }

    /// Replaces the type attributes.
    #[must_use]
    pub fn flags(mut self, flags: TypeAttributes) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the base type; `None` for interfaces.
    #[must_use]
    pub fn extends(mut self, base: Option<TypeSignature>) -> Self {
        self.extends = base;
        self
    }

    /// Adds an implemented interface.
    #[must_use]
    pub fn interface(mut self, interface: TypeSignature) -> Self {
        self.interfaces.push(interface);
        self
    }

    fn into_def(self) -> TypeDef {
        TypeDef {
            token: Token::NULL,
            namespace: self.namespace,
            name: self.name,
            flags: self.flags,
            extends: self.extends,
            interfaces: self.interfaces,
            fields: Vec::new(),
            methods: Vec::new(),
            events: Vec::new(),
            properties: Vec::new(),
            nested_types: Vec::new(),
            declaring_type: None,
            module: None,
        }
    }

    /// Adds the type as a top-level type of `module`.
    ///
    /// # Errors
    ///
    /// Returns an error if `module` is unknown.
    pub fn build(self, image: &mut Image, module: Token) -> Result<Token> {
        image.module(module)?;
        let token = image.push_type(self.into_def())?;
        image.attach_type_to_module(module, token)?;
        Ok(token)
    }

    /// Adds the type as a nested type of `parent`.
    ///
    /// Top-level visibilities are mapped onto their nested counterparts (`PUBLIC` becomes
    /// `NESTED_PUBLIC`, `NOT_PUBLIC` becomes `NESTED_PRIVATE`).
    ///
    /// # Errors
    ///
    /// Returns an error if `parent` is unknown.
    pub fn build_nested(mut self, image: &mut Image, parent: Token) -> Result<Token> {
        image.type_def(parent)?;
        let visibility = self.flags.visibility();
        if visibility == TypeAttributes::PUBLIC {
            self.flags = self.flags.with_visibility(TypeAttributes::NESTED_PUBLIC);
        } else if visibility == TypeAttributes::NOT_PUBLIC {
            self.flags = self.flags.with_visibility(TypeAttributes::NESTED_PRIVATE);
        }
        let token = image.push_type(self.into_def())?;
        image.attach_nested_type(parent, token)?;
        Ok(token)
    }
}

/// Builder for field definitions.
pub struct FieldBuilder {
    name: String,
    flags: FieldAttributes,
    signature: TypeSignature,
    constant: Option<Constant>,
    initial_value: Option<Vec<u8>>,
}

impl FieldBuilder {
    /// Starts a public instance field.
    #[must_use]
    pub fn new(name: &str, signature: TypeSignature) -> Self {
        FieldBuilder {
            name: name.to_string(),
            flags: FieldAttributes::PUBLIC,
            signature,
            constant: None,
            initial_value: None,
        }
    }

    /// Replaces the field attributes.
    #[must_use]
    pub fn flags(mut self, flags: FieldAttributes) -> Self {
        self.flags = flags;
        self
    }

    /// Marks the field `static`.
    #[must_use]
    pub fn static_field(mut self) -> Self {
        self.flags |= FieldAttributes::STATIC;
        self
    }

    /// Attaches a literal default value.
    #[must_use]
    pub fn constant(mut self, value: Constant) -> Self {
        self.flags |= FieldAttributes::HAS_DEFAULT;
        self.constant = Some(value);
        self
    }

    /// Attaches an initial value blob.
    #[must_use]
    pub fn initial_value(mut self, data: Vec<u8>) -> Self {
        self.flags |= FieldAttributes::HAS_FIELD_RVA;
        self.initial_value = Some(data);
        self
    }

    /// Adds the field to `ty`.
    ///
    /// # Errors
    ///
    /// Returns an error if `ty` is unknown.
    pub fn build(self, image: &mut Image, ty: Token) -> Result<Token> {
        image.type_def(ty)?;
        let token = image.push_field(FieldDef {
            token: Token::NULL,
            name: self.name,
            flags: self.flags,
            signature: self.signature,
            constant: self.constant,
            initial_value: self.initial_value,
            declaring_type: None,
        })?;
        image.attach_field(ty, token)?;
        Ok(token)
    }
}

/// Builder for method definitions and their bodies.
pub struct MethodBuilder {
    name: String,
    flags: MethodAttributes,
    impl_flags: MethodImplAttributes,
    calling_convention: CallingConvention,
    has_this: bool,
    explicit_this: bool,
    return_type: TypeSignature,
    params: Vec<Param>,
    locals: Vec<LocalVariable>,
    max_stack: u16,
    init_locals: bool,
    exception_handlers: Vec<ExceptionHandler>,
    implementation: Option<ImplementationFn>,
}

impl MethodBuilder {
    /// Starts a public instance method returning `void`, without body.
    #[must_use]
    pub fn new(name: &str) -> Self {
        MethodBuilder {
            name: name.to_string(),
            flags: MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG,
            impl_flags: MethodImplAttributes::empty(),
            calling_convention: CallingConvention::Default,
            has_this: true,
            explicit_this: false,
            return_type: TypeSignature::Void,
            params: Vec::new(),
            locals: Vec::new(),
            max_stack: 8,
            init_locals: true,
            exception_handlers: Vec::new(),
            implementation: None,
        }
    }

    /// Starts a public instance constructor (`.ctor`).
    #[must_use]
    pub fn constructor() -> Self {
        let mut builder = MethodBuilder::new(".ctor");
        builder.flags |= MethodAttributes::SPECIAL_NAME | MethodAttributes::RT_SPECIAL_NAME;
        builder
    }

    /// Replaces the method attributes. `STATIC` in `flags` also clears the receiver.
    #[must_use]
    pub fn flags(mut self, flags: MethodAttributes) -> Self {
        self.flags = flags;
        self.has_this = !flags.contains(MethodAttributes::STATIC);
        self
    }

    /// Marks the method `static`, without receiver.
    #[must_use]
    pub fn static_method(mut self) -> Self {
        self.flags |= MethodAttributes::STATIC;
        self.has_this = false;
        self
    }

    /// Declares the receiver as an explicit first parameter.
    #[must_use]
    pub fn explicit_this(mut self) -> Self {
        self.explicit_this = true;
        self
    }

    /// Replaces the implementation attributes.
    #[must_use]
    pub fn impl_flags(mut self, flags: MethodImplAttributes) -> Self {
        self.impl_flags = flags;
        self
    }

    /// Sets the calling convention.
    #[must_use]
    pub fn calling_convention(mut self, convention: CallingConvention) -> Self {
        self.calling_convention = convention;
        self
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, name: &str, signature: TypeSignature) -> Self {
        self.params.push(Param::new(name, signature));
        self
    }

    /// Sets the return type.
    #[must_use]
    pub fn returns(mut self, signature: TypeSignature) -> Self {
        self.return_type = signature;
        self
    }

    /// Appends a local variable slot.
    #[must_use]
    pub fn local(mut self, signature: TypeSignature) -> Self {
        self.locals.push(LocalVariable::new(signature));
        self
    }

    /// Sets the maximum stack depth (default 8).
    #[must_use]
    pub fn max_stack(mut self, max_stack: u16) -> Self {
        self.max_stack = max_stack;
        self
    }

    /// Sets whether locals are zero-initialized.
    #[must_use]
    pub fn init_locals(mut self, init: bool) -> Self {
        self.init_locals = init;
        self
    }

    /// Adds an exception handler; ranges are instruction indices of the body.
    #[must_use]
    pub fn handler(mut self, handler: ExceptionHandler) -> Self {
        self.exception_handlers.push(handler);
        self
    }

    /// Sets the body implementation.
    #[must_use]
    pub fn body<F>(mut self, implementation: F) -> Self
    where
        F: FnOnce(&mut InstructionAssembler) -> Result<()> + 'static,
    {
        self.implementation = Some(Box::new(implementation));
        self
    }

    /// Adds the method to `ty`.
    ///
    /// # Errors
    ///
    /// Returns an error if `ty` is unknown or the body closure fails.
    pub fn build(self, image: &mut Image, ty: Token) -> Result<Token> {
        image.type_def(ty)?;

        let body = match self.implementation {
            Some(implementation) => {
                let mut asm = InstructionAssembler::new();
                implementation(&mut asm)?;
                Some(MethodBody {
                    instructions: asm.finish()?,
                    locals: self.locals,
                    exception_handlers: self.exception_handlers,
                    max_stack: self.max_stack,
                    init_locals: self.init_locals,
                })
            }
            None => None,
        };

        let token = image.push_method(MethodDef {
            token: Token::NULL,
            name: self.name,
            flags: self.flags,
            impl_flags: self.impl_flags,
            calling_convention: self.calling_convention,
            has_this: self.has_this,
            explicit_this: self.explicit_this,
            return_type: self.return_type,
            params: self.params,
            body,
            declaring_type: None,
        })?;
        image.attach_method(ty, token)?;
        Ok(token)
    }
}

/// Builder for events.
pub struct EventBuilder {
    event: EventDef,
}

impl EventBuilder {
    /// Starts an event of delegate type `event_type`.
    #[must_use]
    pub fn new(name: &str, event_type: TypeSignature) -> Self {
        EventBuilder {
            event: EventDef {
                name: name.to_string(),
                flags: EventAttributes::empty(),
                event_type,
                add: None,
                remove: None,
                raise: None,
                others: Vec::new(),
            },
        }
    }

    /// Sets the `add_` accessor.
    #[must_use]
    pub fn add_on(mut self, method: Token) -> Self {
        self.event.add = Some(method);
        self
    }

    /// Sets the `remove_` accessor.
    #[must_use]
    pub fn remove_on(mut self, method: Token) -> Self {
        self.event.remove = Some(method);
        self
    }

    /// Sets the `raise_` accessor.
    #[must_use]
    pub fn fire(mut self, method: Token) -> Self {
        self.event.raise = Some(method);
        self
    }

    /// Adds the event to `ty`.
    ///
    /// # Errors
    ///
    /// Returns an error if `ty` is unknown.
    pub fn build(self, image: &mut Image, ty: Token) -> Result<()> {
        image.type_def_mut(ty)?.events.push(self.event);
        Ok(())
    }
}

/// Builder for properties.
pub struct PropertyBuilder {
    property: PropertyDef,
}

impl PropertyBuilder {
    /// Starts a property of type `signature`.
    #[must_use]
    pub fn new(name: &str, signature: TypeSignature) -> Self {
        PropertyBuilder {
            property: PropertyDef {
                name: name.to_string(),
                flags: PropertyAttributes::empty(),
                signature,
                getter: None,
                setter: None,
                others: Vec::new(),
            },
        }
    }

    /// Sets the `get_` accessor.
    #[must_use]
    pub fn getter(mut self, method: Token) -> Self {
        self.property.getter = Some(method);
        self
    }

    /// Sets the `set_` accessor.
    #[must_use]
    pub fn setter(mut self, method: Token) -> Self {
        self.property.setter = Some(method);
        self
    }

    /// Adds the property to `ty`.
    ///
    /// # Errors
    ///
    /// Returns an error if `ty` is unknown.
    pub fn build(self, image: &mut Image, ty: Token) -> Result<()> {
        image.type_def_mut(ty)?.properties.push(self.property);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::OpCode;

    #[test]
    fn test_nested_visibility_mapping() -> Result<()> {
        let mut image = Image::new();
        let module = image.add_module("App")?;
        let outer = TypeBuilder::new("App", "Outer").build(&mut image, module)?;
        let public = TypeBuilder::new("", "Public").build_nested(&mut image, outer)?;
        let private = TypeBuilder::new("", "Private")
            .flags(TypeAttributes::NOT_PUBLIC | TypeAttributes::SEALED)
            .build_nested(&mut image, outer)?;

        assert_eq!(
            image.type_def(public)?.flags.visibility(),
            TypeAttributes::NESTED_PUBLIC
        );
        let private = image.type_def(private)?;
        assert_eq!(private.flags.visibility(), TypeAttributes::NESTED_PRIVATE);
        assert!(private.flags.contains(TypeAttributes::SEALED));
        assert_eq!(private.module, Some(module));
        assert_eq!(image.type_def(outer)?.nested_types.len(), 2);
        Ok(())
    }

    #[test]
    fn test_method_builder_body() -> Result<()> {
        let mut image = Image::new();
        let module = image.add_module("App")?;
        let ty = TypeBuilder::new("App", "Calc").build(&mut image, module)?;
        let square = MethodBuilder::new("Square")
            .static_method()
            .param("x", TypeSignature::I4)
            .returns(TypeSignature::I4)
            .local(TypeSignature::I4)
            .body(|asm| {
                asm.ldarg_0()?.dup()?.mul()?.stloc(0)?.ldloc(0)?.ret()?;
                Ok(())
            })
            .build(&mut image, ty)?;

        let method = image.method(square)?;
        assert!(method.is_static());
        assert_eq!(method.receiver_slots(), 0);
        let body = method.body.as_ref().expect("body");
        assert_eq!(body.locals.len(), 1);
        assert_eq!(body.instructions[3].opcode, OpCode::Stloc0);
        Ok(())
    }

    #[test]
    fn test_bodiless_extern() -> Result<()> {
        let mut image = Image::new();
        let module = image.add_module("App")?;
        let ty = TypeBuilder::new("App", "Native").build(&mut image, module)?;
        let ext = MethodBuilder::new("Beep")
            .static_method()
            .impl_flags(MethodImplAttributes::INTERNAL_CALL)
            .build(&mut image, ty)?;
        assert!(image.method(ext)?.body.is_none());
        Ok(())
    }

    #[test]
    fn test_events_and_properties() -> Result<()> {
        let mut image = Image::new();
        let module = image.add_module("App")?;
        let ty = TypeBuilder::new("App", "Widget").build(&mut image, module)?;
        let add = MethodBuilder::new("add_Click").build(&mut image, ty)?;
        let get = MethodBuilder::new("get_Size")
            .returns(TypeSignature::I4)
            .build(&mut image, ty)?;
        EventBuilder::new("Click", TypeSignature::Object)
            .add_on(add)
            .build(&mut image, ty)?;
        PropertyBuilder::new("Size", TypeSignature::I4)
            .getter(get)
            .build(&mut image, ty)?;

        let def = image.type_def(ty)?;
        assert_eq!(def.events[0].accessors(), vec![add]);
        assert_eq!(def.properties[0].getter, Some(get));
        Ok(())
    }
}
