//! Attribute flags of types, methods, fields, parameters, events and properties.
//!
//! Values follow ECMA-335 Partition II, section 23.1. Several attributes are multi-bit
//! enumerations packed into a mask (type visibility, member access); those are compared
//! through the `*_MASK` constants and the helper accessors below rather than `contains`.

use bitflags::bitflags;

bitflags! {
    /// Type attributes (`TypeDef.Flags`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeAttributes: u32 {
        /// Visibility bits
        const VISIBILITY_MASK = 0x0000_0007;
        /// Class is not public scope
        const NOT_PUBLIC = 0x0000_0000;
        /// Class is public scope
        const PUBLIC = 0x0000_0001;
        /// Class is nested with public visibility
        const NESTED_PUBLIC = 0x0000_0002;
        /// Class is nested with private visibility
        const NESTED_PRIVATE = 0x0000_0003;
        /// Class is nested with family visibility
        const NESTED_FAMILY = 0x0000_0004;
        /// Class is nested with assembly visibility
        const NESTED_ASSEMBLY = 0x0000_0005;
        /// Class is nested with family and assembly visibility
        const NESTED_FAM_AND_ASSEM = 0x0000_0006;
        /// Class is nested with family or assembly visibility
        const NESTED_FAM_OR_ASSEM = 0x0000_0007;
        /// Class fields are laid out sequentially
        const SEQUENTIAL_LAYOUT = 0x0000_0008;
        /// Layout is supplied explicitly
        const EXPLICIT_LAYOUT = 0x0000_0010;
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Class is abstract
        const ABSTRACT = 0x0000_0080;
        /// Class cannot be extended
        const SEALED = 0x0000_0100;
        /// Class name is special
        const SPECIAL_NAME = 0x0000_0400;
        /// Class is imported
        const IMPORT = 0x0000_1000;
        /// Class is serializable
        const SERIALIZABLE = 0x0000_2000;
        /// Initialize the class before the first static field access
        const BEFORE_FIELD_INIT = 0x0010_0000;
        /// Runtime should check name encoding
        const RT_SPECIAL_NAME = 0x0000_0800;
    }
}

impl TypeAttributes {
    /// The visibility enumeration value of these flags.
    #[must_use]
    pub fn visibility(self) -> TypeAttributes {
        self & TypeAttributes::VISIBILITY_MASK
    }

    /// Returns these flags with the visibility bits replaced by `visibility`.
    #[must_use]
    pub fn with_visibility(self, visibility: TypeAttributes) -> TypeAttributes {
        (self - TypeAttributes::VISIBILITY_MASK) | visibility.visibility()
    }

    /// True for `PUBLIC` and `NESTED_PUBLIC`.
    #[must_use]
    pub fn is_visible(self) -> bool {
        let visibility = self.visibility();
        visibility == TypeAttributes::PUBLIC || visibility == TypeAttributes::NESTED_PUBLIC
    }
}

bitflags! {
    /// Method attributes (`MethodDef.Flags`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodAttributes: u16 {
        /// Member access bits
        const MEMBER_ACCESS_MASK = 0x0007;
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessible by anyone in the assembly
        const ASSEMBLY = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessible by sub-types anywhere, plus anyone in assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessible by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new slot in the vtable
        const NEW_SLOT = 0x0100;
        /// Method can only be overriden if also accessible
        const STRICT = 0x0200;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// CLI provides special behavior depending upon the name of the method
        const RT_SPECIAL_NAME = 0x1000;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
    }
}

impl MethodAttributes {
    /// The member access enumeration value of these flags.
    #[must_use]
    pub fn access(self) -> MethodAttributes {
        self & MethodAttributes::MEMBER_ACCESS_MASK
    }
}

bitflags! {
    /// Method implementation attributes (`MethodDef.ImplFlags`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodImplAttributes: u16 {
        /// Method impl is native
        const NATIVE = 0x0001;
        /// Method impl is OPTIL
        const OPTIL = 0x0002;
        /// Method impl is provided by the runtime
        const RUNTIME = 0x0003;
        /// Method impl is unmanaged, otherwise managed
        const UNMANAGED = 0x0004;
        /// Method cannot be inlined
        const NO_INLINING = 0x0008;
        /// Method is a synchronized method
        const SYNCHRONIZED = 0x0020;
        /// Method signature is exported exactly as declared
        const PRESERVE_SIG = 0x0080;
        /// Method is implemented inside the runtime
        const INTERNAL_CALL = 0x1000;
    }
}

bitflags! {
    /// Field attributes (`Field.Flags`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldAttributes: u16 {
        /// Member access bits
        const FIELD_ACCESS_MASK = 0x0007;
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessible by anyone in the assembly
        const ASSEMBLY = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessible by sub-types anywhere, plus anyone in assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessible by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Field can only be initialized, not written to after init
        const INIT_ONLY = 0x0020;
        /// Value is compile time constant
        const LITERAL = 0x0040;
        /// Field does not have to be serialized when type is remoted
        const NOT_SERIALIZED = 0x0080;
        /// Field is special
        const SPECIAL_NAME = 0x0200;
        /// Field has a default value
        const HAS_DEFAULT = 0x8000;
        /// Field has an RVA (initial value blob)
        const HAS_FIELD_RVA = 0x0100;
    }
}

bitflags! {
    /// Parameter attributes (`Param.Flags`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParamAttributes: u16 {
        /// Parameter is an input
        const IN = 0x0001;
        /// Parameter is an output
        const OUT = 0x0002;
        /// Parameter is optional
        const OPTIONAL = 0x0010;
        /// Parameter has a default value
        const HAS_DEFAULT = 0x1000;
    }
}

bitflags! {
    /// Event attributes (`Event.EventFlags`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventAttributes: u16 {
        /// Event is special
        const SPECIAL_NAME = 0x0200;
        /// CLI provides special behavior depending upon the name of the event
        const RT_SPECIAL_NAME = 0x0400;
    }
}

bitflags! {
    /// Property attributes (`Property.Flags`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyAttributes: u16 {
        /// Property is special
        const SPECIAL_NAME = 0x0200;
        /// CLI provides special behavior depending upon the name of the property
        const RT_SPECIAL_NAME = 0x0400;
        /// Property has a default value
        const HAS_DEFAULT = 0x1000;
    }
}
