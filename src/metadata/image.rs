//! The in-memory symbol graph every transform operates on.
//!
//! [`Image`] is an arena: each entity kind lives in its own vector and is addressed by a
//! [`Token`] whose table byte selects the vector and whose row is the 1-based position in
//! it. Entities are never removed, so a token stays valid for the life of the image.
//!
//! Besides storage, the image implements the two operations the rest of the crate builds
//! on:
//!
//! - **Ownership**: [`Image::owner_module`] answers which module a symbol belongs to.
//! - **Import**: [`Image::import`] produces the module-local equivalent of a symbol. A
//!   definition that already lives in the destination is returned as is, a reference owned
//!   by the destination is returned as is, and anything else is reached through a
//!   `TypeRef`/`MemberRef` that is created at most once per module and definition.
//!
//! # Examples
//!
//! ```rust
//! use cilhook::metadata::{builders::TypeBuilder, image::Image};
//!
//! let mut image = Image::new();
//! let lib = image.add_module("Lib")?;
//! let app = image.add_module("App")?;
//! let helper = TypeBuilder::new("Lib", "Helper").build(&mut image, lib)?;
//!
//! let reference = image.import(helper, app)?;
//! assert_ne!(reference, helper);
//! assert_eq!(image.resolve_definition(reference)?, helper);
//! assert_eq!(image.import(helper, app)?, reference);
//! assert_eq!(image.import(helper, lib)?, helper);
//! # Ok::<(), cilhook::Error>(())
//! ```

use std::fmt::Write;

use log::trace;

use crate::{
    assembly::{Instruction, Operand},
    metadata::{
        attributes::MethodAttributes,
        method::MethodDef,
        module::{MemberRef, Module, TypeRef},
        signatures::TypeSignature,
        token::{TableId, Token},
        typedef::{FieldDef, TypeDef},
    },
    Error, Result,
};

/// Arena of modules, types, members and module-local references.
#[derive(Debug, Clone, Default)]
pub struct Image {
    modules: Vec<Module>,
    types: Vec<TypeDef>,
    methods: Vec<MethodDef>,
    fields: Vec<FieldDef>,
    type_refs: Vec<TypeRef>,
    member_refs: Vec<MemberRef>,
}

fn next_token(table: TableId, len: usize) -> Result<Token> {
    let row = u32::try_from(len + 1)
        .ok()
        .filter(|row| *row <= 0x00FF_FFFF)
        .ok_or_else(|| precondition_error!("table {:?} is full", table))?;
    Ok(Token::from_parts(table, row))
}

fn slot(token: Token, table: TableId) -> Result<usize> {
    if !token.is_table(table) || token.row() == 0 {
        return Err(Error::missing_token(token));
    }
    Ok(token.row() as usize - 1)
}

macro_rules! arena_accessors {
    ($( $get:ident, $get_mut:ident, $vec:ident, $ty:ty, $table:ident; )*) => {
        $(
            #[doc = concat!("Returns the `", stringify!($ty), "` named by `token`.")]
            ///
            /// # Errors
            ///
            /// Returns [`Error::NotFound`] if `token` does not name an entry of this arena.
            pub fn $get(&self, token: Token) -> Result<&$ty> {
                let index = slot(token, TableId::$table)?;
                self.$vec.get(index).ok_or_else(|| Error::missing_token(token))
            }

            #[doc = concat!("Returns the `", stringify!($ty), "` named by `token` for mutation.")]
            ///
            /// # Errors
            ///
            /// Returns [`Error::NotFound`] if `token` does not name an entry of this arena.
            pub fn $get_mut(&mut self, token: Token) -> Result<&mut $ty> {
                let index = slot(token, TableId::$table)?;
                self.$vec.get_mut(index).ok_or_else(|| Error::missing_token(token))
            }
        )*
    };
}

impl Image {
    /// Creates an empty image.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    arena_accessors! {
        module, module_mut, modules, Module, Module;
        type_def, type_def_mut, types, TypeDef, TypeDef;
        method, method_mut, methods, MethodDef, MethodDef;
        field, field_mut, fields, FieldDef, Field;
        type_ref, type_ref_mut, type_refs, TypeRef, TypeRef;
        member_ref, member_ref_mut, member_refs, MemberRef, MemberRef;
    }

    /// Adds an empty module and returns its token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PreconditionViolated`] if the module arena is full.
    pub fn add_module(&mut self, name: &str) -> Result<Token> {
        let token = next_token(TableId::Module, self.modules.len())?;
        self.modules.push(Module::new(token, name));
        Ok(token)
    }

    /// Tokens of all modules, in insertion order.
    #[must_use]
    pub fn module_tokens(&self) -> Vec<Token> {
        self.modules.iter().map(|module| module.token).collect()
    }

    /// Looks up a module by name.
    #[must_use]
    pub fn module_by_name(&self, name: &str) -> Option<Token> {
        self.modules
            .iter()
            .find(|module| module.name == name)
            .map(|module| module.token)
    }

    /// Number of `TypeRef` and `MemberRef` entries, over all modules.
    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.type_refs.len() + self.member_refs.len()
    }

    /// Stores `ty` under a fresh token, which is written into `ty.token` and returned.
    ///
    /// The type is not yet listed by any module or enclosing type.
    pub(crate) fn push_type(&mut self, mut ty: TypeDef) -> Result<Token> {
        let token = next_token(TableId::TypeDef, self.types.len())?;
        ty.token = token;
        self.types.push(ty);
        Ok(token)
    }

    /// Stores `method` under a fresh token, see [`Image::push_type`].
    pub(crate) fn push_method(&mut self, mut method: MethodDef) -> Result<Token> {
        let token = next_token(TableId::MethodDef, self.methods.len())?;
        method.token = token;
        self.methods.push(method);
        Ok(token)
    }

    /// Stores `field` under a fresh token, see [`Image::push_type`].
    pub(crate) fn push_field(&mut self, mut field: FieldDef) -> Result<Token> {
        let token = next_token(TableId::Field, self.fields.len())?;
        field.token = token;
        self.fields.push(field);
        Ok(token)
    }

    /// Appends `method` to the method list of `ty` and records `ty` as its declaring type.
    pub(crate) fn attach_method(&mut self, ty: Token, method: Token) -> Result<()> {
        self.type_def_mut(ty)?.methods.push(method);
        self.method_mut(method)?.declaring_type = Some(ty);
        Ok(())
    }

    /// Appends `field` to the field list of `ty` and records `ty` as its declaring type.
    pub(crate) fn attach_field(&mut self, ty: Token, field: Token) -> Result<()> {
        self.type_def_mut(ty)?.fields.push(field);
        self.field_mut(field)?.declaring_type = Some(ty);
        Ok(())
    }

    /// Lists `ty` as a top-level type of `module`, and sets the module of `ty` and every
    /// type nested in it.
    pub(crate) fn attach_type_to_module(&mut self, module: Token, ty: Token) -> Result<()> {
        self.module_mut(module)?.types.push(ty);
        self.type_def_mut(ty)?.declaring_type = None;
        self.set_type_module(ty, module)
    }

    /// Lists `ty` as a nested type of `parent` and moves it into the module of `parent`.
    pub(crate) fn attach_nested_type(&mut self, parent: Token, ty: Token) -> Result<()> {
        let module = self.type_def(parent)?.module;
        self.type_def_mut(parent)?.nested_types.push(ty);
        self.type_def_mut(ty)?.declaring_type = Some(parent);
        match module {
            Some(module) => self.set_type_module(ty, module),
            None => Ok(()),
        }
    }

    fn set_type_module(&mut self, ty: Token, module: Token) -> Result<()> {
        let mut pending = vec![ty];
        while let Some(current) = pending.pop() {
            let def = self.type_def_mut(current)?;
            def.module = Some(module);
            pending.extend(def.nested_types.iter().copied());
        }
        Ok(())
    }

    /// Returns the module a symbol belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown tokens and [`Error::PreconditionViolated`]
    /// for members or types that are not attached to a module.
    pub fn owner_module(&self, token: Token) -> Result<Token> {
        match token.table_id() {
            Some(TableId::Module) => Ok(self.module(token)?.token),
            Some(TableId::TypeDef) => self
                .type_def(token)?
                .module
                .ok_or_else(|| precondition_error!("type {} is not attached to a module", token)),
            Some(TableId::MethodDef) => match self.method(token)?.declaring_type {
                Some(ty) => self.owner_module(ty),
                None => Err(precondition_error!("method {} has no declaring type", token)),
            },
            Some(TableId::Field) => match self.field(token)?.declaring_type {
                Some(ty) => self.owner_module(ty),
                None => Err(precondition_error!("field {} has no declaring type", token)),
            },
            Some(TableId::TypeRef) => Ok(self.type_ref(token)?.module),
            Some(TableId::MemberRef) => Ok(self.member_ref(token)?.module),
            None => Err(Error::missing_token(token)),
        }
    }

    /// Follows a `TypeRef`/`MemberRef` to its definition; definitions map to themselves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if a reference token is unknown.
    pub fn resolve_definition(&self, token: Token) -> Result<Token> {
        match token.table_id() {
            Some(TableId::TypeRef) => Ok(self.type_ref(token)?.target),
            Some(TableId::MemberRef) => Ok(self.member_ref(token)?.target),
            _ => Ok(token),
        }
    }

    /// Returns the module-local equivalent of `token` inside `module`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown tokens, [`Error::PreconditionViolated`] if the
    /// definition is not attached to a module, and [`Error::UnsupportedSlot`] for symbols
    /// that cannot be referenced from another module (modules themselves).
    pub fn import(&mut self, token: Token, module: Token) -> Result<Token> {
        self.module(module)?;

        let definition = self.resolve_definition(token)?;
        if self.owner_module(definition)? == module {
            return Ok(definition);
        }
        if definition != token && self.owner_module(token)? == module {
            return Ok(token);
        }
        if let Some(existing) = self.module(module)?.imported(definition) {
            return Ok(existing);
        }

        let reference = match definition.table_id() {
            Some(TableId::TypeDef) => {
                let reference = next_token(TableId::TypeRef, self.type_refs.len())?;
                self.type_refs.push(TypeRef {
                    token: reference,
                    module,
                    target: definition,
                });
                reference
            }
            Some(TableId::MethodDef | TableId::Field) => {
                let reference = next_token(TableId::MemberRef, self.member_refs.len())?;
                self.member_refs.push(MemberRef {
                    token: reference,
                    module,
                    target: definition,
                });
                reference
            }
            _ => {
                return Err(Error::UnsupportedSlot(format!(
                    "{definition} cannot be imported"
                )))
            }
        };

        trace!("imported {definition} into module {module} as {reference}");
        self.module_mut(module)?
            .import_cache
            .insert(definition, reference);
        Ok(reference)
    }

    /// Returns a copy of `signature` with every mentioned type imported into `module`.
    ///
    /// # Errors
    ///
    /// Propagates the first failing [`Image::import`].
    pub fn import_signature(
        &mut self,
        signature: &TypeSignature,
        module: Token,
    ) -> Result<TypeSignature> {
        let mut imported = signature.clone();
        imported.try_map_tokens(&mut |token| self.import(token, module))?;
        Ok(imported)
    }

    /// Module-local references defined in `module` that target `definition`.
    #[must_use]
    pub fn references_in(&self, module: Token, definition: Token) -> Vec<Token> {
        let type_refs = self
            .type_refs
            .iter()
            .filter(|r| r.module == module && r.target == definition)
            .map(|r| r.token);
        let member_refs = self
            .member_refs
            .iter()
            .filter(|r| r.module == module && r.target == definition)
            .map(|r| r.token);
        type_refs.chain(member_refs).collect()
    }

    fn type_name_with(&self, token: Token, separator: char) -> Result<String> {
        let mut ty = self.type_def(self.resolve_definition(token)?)?;
        let mut name = ty.name.clone();
        while let Some(parent) = ty.declaring_type {
            ty = self.type_def(parent)?;
            name = format!("{}{separator}{name}", ty.name);
        }
        if ty.namespace.is_empty() {
            Ok(name)
        } else {
            Ok(format!("{}.{name}", ty.namespace))
        }
    }

    /// Full name of a type in `Namespace.Outer/Inner` form; references are resolved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the token does not name a type.
    pub fn type_full_name(&self, token: Token) -> Result<String> {
        self.type_name_with(token, '/')
    }

    /// Full name of a type in reflection form, `Namespace.Outer+Inner`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the token does not name a type.
    pub fn type_reflection_name(&self, token: Token) -> Result<String> {
        self.type_name_with(token, '+')
    }

    /// Reflection-style display name of a signature (`System.Int32`, `Ns.Outer+Inner[]`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if a mentioned type token is unknown.
    pub fn signature_name(&self, signature: &TypeSignature) -> Result<String> {
        if let Some(name) = signature.primitive_name() {
            return Ok(name.to_string());
        }
        match signature {
            TypeSignature::Class(token) | TypeSignature::ValueType(token) => {
                self.type_reflection_name(*token)
            }
            TypeSignature::SzArray(inner) => Ok(format!("{}[]", self.signature_name(inner)?)),
            TypeSignature::ByRef(inner) => Ok(format!("{}&", self.signature_name(inner)?)),
            TypeSignature::Ptr(inner) => Ok(format!("{}*", self.signature_name(inner)?)),
            TypeSignature::GenericInst(base, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.signature_name(arg))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("{}[{}]", self.signature_name(base)?, args.join(",")))
            }
            TypeSignature::GenericParamType(index) => Ok(format!("!{index}")),
            TypeSignature::GenericParamMethod(index) => Ok(format!("!!{index}")),
            _ => Ok(String::new()),
        }
    }

    /// `Namespace.Type::Member` for a method, field or a reference to either.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the token does not name a member.
    pub fn member_full_name(&self, token: Token) -> Result<String> {
        let definition = self.resolve_definition(token)?;
        let (name, declaring) = match definition.table_id() {
            Some(TableId::MethodDef) => {
                let method = self.method(definition)?;
                (method.name.as_str(), method.declaring_type)
            }
            Some(TableId::Field) => {
                let field = self.field(definition)?;
                (field.name.as_str(), field.declaring_type)
            }
            _ => return Err(Error::missing_token(token)),
        };
        match declaring {
            Some(ty) => Ok(format!("{}::{name}", self.type_full_name(ty)?)),
            None => Ok(name.to_string()),
        }
    }

    fn operand_text(&self, instruction: &Instruction) -> String {
        match &instruction.operand {
            Operand::Token(token) => {
                let name = match token.table_id() {
                    Some(TableId::TypeDef | TableId::TypeRef) => self.type_full_name(*token),
                    _ => self.member_full_name(*token),
                };
                match name {
                    Ok(name) => format!("{} {name}", instruction.opcode),
                    Err(_) => instruction.to_string(),
                }
            }
            _ => instruction.to_string(),
        }
    }

    /// Text listing of a method and its body for logging and debugging.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the method or a type of its signature is unknown.
    pub fn disassemble(&self, method: Token) -> Result<String> {
        let def = self.method(method)?;
        let mut out = String::new();

        let params = def
            .params
            .iter()
            .map(|p| Ok(format!("{} {}", self.signature_name(&p.signature)?, p.name)))
            .collect::<Result<Vec<_>>>()?;
        let modifier = if def.flags.contains(MethodAttributes::STATIC) {
            "static "
        } else {
            ""
        };
        let _ = writeln!(
            out,
            ".method {modifier}{} {}({})",
            self.signature_name(&def.return_type)?,
            self.member_full_name(method)?,
            params.join(", ")
        );
        let Some(body) = &def.body else {
            return Ok(out);
        };

        let _ = writeln!(out, "{{");
        let _ = writeln!(out, "  .maxstack {}", body.max_stack);
        if !body.locals.is_empty() {
            let locals = body
                .locals
                .iter()
                .enumerate()
                .map(|(i, l)| Ok(format!("{} V_{i}", self.signature_name(&l.signature)?)))
                .collect::<Result<Vec<_>>>()?;
            let _ = writeln!(out, "  .locals ({})", locals.join(", "));
        }
        for (index, instruction) in body.instructions.iter().enumerate() {
            let _ = writeln!(out, "  IL_{index:04}: {}", self.operand_text(instruction));
        }
        for handler in &body.exception_handlers {
            let _ = writeln!(
                out,
                "  .try IL_{:04} to IL_{:04} {:?} handler IL_{:04} to IL_{:04}",
                handler.try_start,
                handler.try_end,
                handler.flags,
                handler.handler_start,
                handler.handler_end
            );
        }
        let _ = writeln!(out, "}}");
        Ok(out)
    }
}
