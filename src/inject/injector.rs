//! Cloning, injection and hooking of methods, types and field accesses.
//!
//! [`CodeInjector`] borrows an [`Image`] mutably for the duration of one batch of edits. Its
//! operations follow a common pattern:
//!
//! 1. **Clone** the donor into a detached value ([`DetachedMethod`], [`DetachedType`]).
//! 2. **Attach** the copy under its new owner, receiving fresh tokens.
//! 3. **Fix** every symbol the copy mentions by importing it into the owning module, so no
//!    slot of the attached subtree points at a symbol of another module without going
//!    through a module-local reference.
//!
//! Hooks build on this: [`CodeInjector::hook_method`] injects the hook next to its target,
//! swaps names and redirects every call site, while [`CodeInjector::hook_field_read`] and
//! [`CodeInjector::hook_field_write`] turn field loads and stores into accessor calls.
//!
//! Failures leave the image partially edited. Callers that need all-or-nothing behavior
//! work on a clone of the image.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cilhook::inject::{CodeInjector, SymbolLocator};
//! use cilhook::metadata::image::Image;
//!
//! # fn load() -> Image { Image::new() }
//! let mut image = load();
//! let mut locator = SymbolLocator::new();
//! locator.scan_image(&image)?;
//! let target = locator.find_method_by_path(&image, "Target.Program.Add")?;
//! let hook = locator.find_method_by_path(&image, "Hooks.Hooks.Add")?;
//!
//! let hooked = CodeInjector::new(&mut image).hook_method(target, hook, None)?;
//! assert_eq!(image.method(hooked.original)?.name, "__hooked__Add");
//! # Ok::<(), cilhook::Error>(())
//! ```

use log::{debug, trace, warn};
use rustc_hash::FxHashMap;

use crate::{
    assembly::{Instruction, OpCode, Operand},
    inject::{
        config::InjectorConfig,
        detached::{DetachedField, DetachedMethod, DetachedType},
        resolver::{ReferenceResolver, ReferenceSite},
    },
    metadata::{
        attributes::TypeAttributes,
        image::Image,
        method::{LocalVariable, MethodBody, MethodDef},
        token::Token,
        typedef::{FieldDef, TypeDef},
    },
    Error, Result,
};

/// Result of [`CodeInjector::hook_method`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookedMethod {
    /// The injected hook, which now carries the target's name and attributes
    pub hook: Token,
    /// The original target, renamed with the configured prefix
    pub original: Token,
}

/// Owner of an attached type tree.
#[derive(Debug, Clone, Copy)]
enum TypeParent {
    Module(Token),
    Type(Token),
}

/// Which field accesses a field hook intercepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldAccess {
    Read,
    Write,
}

impl FieldAccess {
    fn intercepts(self, opcode: OpCode) -> bool {
        match self {
            FieldAccess::Read => matches!(opcode, OpCode::Ldfld | OpCode::Ldsfld),
            FieldAccess::Write => matches!(opcode, OpCode::Stfld | OpCode::Stsfld),
        }
    }

    fn infix(self) -> &'static str {
        match self {
            FieldAccess::Read => "__hookread__",
            FieldAccess::Write => "__hookwrite__",
        }
    }
}

/// Copies a body instruction by instruction and rebinds branch targets and handler
/// boundaries through an index-remap table.
///
/// Fails if a branch target or handler boundary lies outside the donor body.
fn clone_body(donor: &MethodBody) -> Result<MethodBody> {
    let mut instructions = Vec::with_capacity(donor.len());
    let mut remap = Vec::with_capacity(donor.len() + 1);
    for instruction in &donor.instructions {
        remap.push(instructions.len());
        instructions.push(Instruction::new(instruction.opcode, instruction.operand.clone()));
    }
    // Half-open ranges may end one past the last instruction
    remap.push(instructions.len());

    let mut escaped = None;
    let mut branch_lookup = |index: usize| match remap.get(index) {
        Some(target) if index < donor.len() => *target,
        _ => {
            escaped.get_or_insert(index);
            index
        }
    };
    for instruction in &mut instructions {
        instruction.operand.remap_targets(&mut branch_lookup);
    }
    if let Some(index) = escaped {
        return Err(precondition_error!(
            "branch target {} lies outside a body of {} instructions",
            index,
            donor.len()
        ));
    }

    let mut boundary_lookup = |index: usize| match remap.get(index) {
        Some(target) => *target,
        None => {
            escaped.get_or_insert(index);
            index
        }
    };
    let exception_handlers = donor
        .exception_handlers
        .iter()
        .map(|handler| {
            let mut handler = handler.clone();
            handler.remap(&mut boundary_lookup);
            handler
        })
        .collect();
    if let Some(index) = escaped {
        return Err(precondition_error!(
            "handler boundary {} lies outside a body of {} instructions",
            index,
            donor.len()
        ));
    }

    Ok(MethodBody {
        instructions,
        locals: donor
            .locals
            .iter()
            .map(|local| LocalVariable {
                signature: local.signature.clone(),
                is_pinned: local.is_pinned,
            })
            .collect(),
        exception_handlers,
        max_stack: donor.max_stack,
        init_locals: donor.init_locals,
    })
}

/// Performs injection and hooking on an [`Image`].
pub struct CodeInjector<'a> {
    image: &'a mut Image,
    config: InjectorConfig,
}

impl<'a> CodeInjector<'a> {
    /// Creates an injector with the default configuration.
    pub fn new(image: &'a mut Image) -> Self {
        Self::with_config(image, InjectorConfig::default())
    }

    /// Creates an injector with `config`.
    pub fn with_config(image: &'a mut Image, config: InjectorConfig) -> Self {
        CodeInjector { image, config }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &InjectorConfig {
        &self.config
    }

    /// The image being edited.
    #[must_use]
    pub fn image(&self) -> &Image {
        self.image
    }

    /// Deep-copies a method into a detached value.
    ///
    /// Parameters, locals, instructions and exception handlers are copied; branch targets
    /// and handler ranges are rebound to the copy. Symbolic operands keep pointing at the
    /// donor's symbols.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `source` is not a method, and
    /// [`Error::PreconditionViolated`] if a branch target or handler boundary of its body lies
    /// outside the body.
    pub fn clone_method(&self, source: Token) -> Result<DetachedMethod> {
        let donor = self.image.method(source)?;
        let def = MethodDef {
            token: Token::NULL,
            name: donor.name.clone(),
            flags: donor.flags,
            impl_flags: donor.impl_flags,
            calling_convention: donor.calling_convention,
            has_this: donor.has_this,
            explicit_this: donor.explicit_this,
            return_type: donor.return_type.clone(),
            params: donor.params.clone(),
            body: donor.body.as_ref().map(clone_body).transpose()?,
            declaring_type: None,
        };

        debug!(
            "cloned method {} ({} instructions)",
            donor.name,
            def.body.as_ref().map_or(0, MethodBody::len)
        );
        Ok(DetachedMethod { def, source })
    }

    fn clone_field(&self, source: Token) -> Result<DetachedField> {
        let donor = self.image.field(source)?;
        Ok(DetachedField {
            def: FieldDef {
                token: Token::NULL,
                declaring_type: None,
                ..donor.clone()
            },
            source,
        })
    }

    /// Deep-copies a type, its members and its nested types into a detached tree.
    ///
    /// Event and property accessors are bound to the cloned copies of the type's methods.
    /// An accessor declared outside the type is cloned as well and appended to the method
    /// list of the copy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecursionLimit`] if types are nested deeper than
    /// [`InjectorConfig::max_nesting_depth`], and [`Error::NotFound`] for unknown tokens.
    pub fn clone_type(&self, source: Token) -> Result<DetachedType> {
        let detached = self.clone_type_at(source, 0)?;
        debug!(
            "cloned type {} ({} types in tree)",
            detached.def.name,
            detached.type_count()
        );
        Ok(detached)
    }

    fn clone_type_at(&self, source: Token, depth: usize) -> Result<DetachedType> {
        if depth > self.config.max_nesting_depth {
            return Err(Error::RecursionLimit(self.config.max_nesting_depth));
        }

        let donor = self.image.type_def(source)?;
        let def = TypeDef {
            token: Token::NULL,
            namespace: donor.namespace.clone(),
            name: donor.name.clone(),
            flags: donor.flags,
            extends: donor.extends.clone(),
            interfaces: donor.interfaces.clone(),
            fields: Vec::new(),
            methods: Vec::new(),
            events: Vec::new(),
            properties: Vec::new(),
            nested_types: Vec::new(),
            declaring_type: None,
            module: None,
        };

        let fields = donor
            .fields
            .iter()
            .map(|field| self.clone_field(*field))
            .collect::<Result<Vec<_>>>()?;
        let mut methods = donor
            .methods
            .iter()
            .map(|method| self.clone_method(*method))
            .collect::<Result<Vec<_>>>()?;
        let mut bound: FxHashMap<Token, usize> = donor
            .methods
            .iter()
            .enumerate()
            .map(|(index, method)| (*method, index))
            .collect();

        let (events, properties) = {
            let mut bind = |accessor: Token| -> Result<usize> {
                if let Some(index) = bound.get(&accessor) {
                    return Ok(*index);
                }
                let index = methods.len();
                methods.push(self.clone_method(accessor)?);
                bound.insert(accessor, index);
                Ok(index)
            };
            let events = donor
                .events
                .iter()
                .map(|event| event.try_map_accessors(&mut bind))
                .collect::<Result<Vec<_>>>()?;
            let properties = donor
                .properties
                .iter()
                .map(|property| property.try_map_accessors(&mut bind))
                .collect::<Result<Vec<_>>>()?;
            (events, properties)
        };

        let nested = donor
            .nested_types
            .iter()
            .map(|nested| self.clone_type_at(*nested, depth + 1))
            .collect::<Result<Vec<_>>>()?;

        Ok(DetachedType {
            def,
            fields,
            methods,
            events,
            properties,
            nested,
            source,
        })
    }

    /// Attaches a detached method to `ty` and imports every symbol it mentions.
    ///
    /// # Errors
    ///
    /// Returns an error if `ty` is unknown or not attached to a module.
    pub fn attach_method(&mut self, ty: Token, method: DetachedMethod) -> Result<Token> {
        let name = method.def.name.clone();
        let token = self.image.push_method(method.def)?;
        self.image.attach_method(ty, token)?;
        debug!("attached method {name} as {token} to {ty}");
        self.fix_method_references(token)?;
        Ok(token)
    }

    /// Attaches a detached type tree as a top-level type of `module`.
    ///
    /// References between members of the tree are rebound to the attached copies, every
    /// other symbol is imported into `module`.
    ///
    /// # Errors
    ///
    /// Returns an error if `module` is unknown.
    pub fn attach_type_to_module(&mut self, module: Token, ty: DetachedType) -> Result<Token> {
        self.image.module(module)?;
        self.attach_type(ty, TypeParent::Module(module))
    }

    /// Attaches a detached type tree as a nested type of `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if `parent` is unknown, and [`Error::PreconditionViolated`] if it is
    /// not attached to a module.
    pub fn attach_nested_type(&mut self, parent: Token, ty: DetachedType) -> Result<Token> {
        self.image.owner_module(parent)?;
        self.attach_type(ty, TypeParent::Type(parent))
    }

    fn attach_type(&mut self, ty: DetachedType, parent: TypeParent) -> Result<Token> {
        let mut clones = FxHashMap::default();
        let root = self.attach_tree(ty, parent, &mut clones)?;

        let mut resolver = ReferenceResolver::new();
        resolver.scan_type(self.image, root)?;
        let mut rebound = 0;
        for (donor, clone) in &clones {
            if donor != clone {
                rebound += resolver.replace_all_references(self.image, *donor, *clone, false)?;
            }
        }
        debug!(
            "attached type tree {root} ({} symbols, {rebound} internal references rebound)",
            clones.len()
        );

        self.fix_type_references(root)?;
        Ok(root)
    }

    fn attach_tree(
        &mut self,
        ty: DetachedType,
        parent: TypeParent,
        clones: &mut FxHashMap<Token, Token>,
    ) -> Result<Token> {
        let DetachedType {
            def,
            fields,
            methods,
            events,
            properties,
            nested,
            source,
        } = ty;

        let token = self.image.push_type(def)?;
        clones.insert(source, token);
        match parent {
            TypeParent::Module(module) => self.image.attach_type_to_module(module, token)?,
            TypeParent::Type(outer) => self.image.attach_nested_type(outer, token)?,
        }

        for field in fields {
            let field_token = self.image.push_field(field.def)?;
            self.image.attach_field(token, field_token)?;
            clones.insert(field.source, field_token);
        }

        let mut method_tokens = Vec::with_capacity(methods.len());
        for method in methods {
            let source = method.source;
            let method_token = self.image.push_method(method.def)?;
            self.image.attach_method(token, method_token)?;
            clones.entry(source).or_insert(method_token);
            method_tokens.push(method_token);
        }

        let accessor = |index: usize| {
            method_tokens
                .get(index)
                .copied()
                .ok_or_else(|| precondition_error!("accessor index {} out of range", index))
        };
        let events = events
            .iter()
            .map(|event| event.try_map_accessors(accessor))
            .collect::<Result<Vec<_>>>()?;
        let properties = properties
            .iter()
            .map(|property| property.try_map_accessors(accessor))
            .collect::<Result<Vec<_>>>()?;
        let def = self.image.type_def_mut(token)?;
        def.events = events;
        def.properties = properties;

        for child in nested {
            self.attach_tree(child, TypeParent::Type(token), clones)?;
        }
        Ok(token)
    }

    /// Clones `source` into `target_type`, optionally under a new name.
    ///
    /// # Errors
    ///
    /// Returns an error if a token is unknown or `target_type` is not attached to a module.
    pub fn inject_method(
        &mut self,
        target_type: Token,
        source: Token,
        name: Option<&str>,
    ) -> Result<Token> {
        self.image.owner_module(target_type)?;
        let mut detached = self.clone_method(source)?;
        if let Some(name) = name {
            detached.set_name(name);
        }
        self.attach_method(target_type, detached)
    }

    /// Clones `source` as a top-level type of `module`, optionally under a new name.
    ///
    /// The copy is public if the donor was visible and not public otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if a token is unknown, and [`Error::RecursionLimit`] for too deeply
    /// nested donors.
    pub fn inject_type_into_module(
        &mut self,
        module: Token,
        source: Token,
        name: Option<&str>,
    ) -> Result<Token> {
        let mut detached = self.clone_type(source)?;
        if let Some(name) = name {
            detached.set_name(name);
        }
        let visibility = if detached.def.flags.is_visible() {
            TypeAttributes::PUBLIC
        } else {
            TypeAttributes::NOT_PUBLIC
        };
        detached.def.flags = detached.def.flags.with_visibility(visibility);
        self.attach_type_to_module(module, detached)
    }

    /// Clones `source` as a nested type of `target_type`, optionally under a new name.
    ///
    /// The copy is nested-public if the donor was visible and nested-private otherwise.
    /// Nested types lose their namespace.
    ///
    /// # Errors
    ///
    /// See [`CodeInjector::inject_type_into_module`].
    pub fn inject_nested_type(
        &mut self,
        target_type: Token,
        source: Token,
        name: Option<&str>,
    ) -> Result<Token> {
        let mut detached = self.clone_type(source)?;
        if let Some(name) = name {
            detached.set_name(name);
        }
        let visibility = if detached.def.flags.is_visible() {
            TypeAttributes::NESTED_PUBLIC
        } else {
            TypeAttributes::NESTED_PRIVATE
        };
        detached.def.flags = detached.def.flags.with_visibility(visibility);
        detached.set_namespace("");
        self.attach_nested_type(target_type, detached)
    }

    /// Imports every symbol `method` mentions into the module that owns it.
    ///
    /// Covers the return type, parameter types, local types, handler catch types and
    /// symbolic instruction operands.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PreconditionViolated`] if the method is not attached to a module.
    pub fn fix_method_references(&mut self, method: Token) -> Result<()> {
        let module = self.image.owner_module(method)?;
        let mut def = self.image.method(method)?.clone();

        def.return_type = self.image.import_signature(&def.return_type, module)?;
        for param in &mut def.params {
            param.signature = self.image.import_signature(&param.signature, module)?;
        }

        let mut operands = 0;
        if let Some(body) = def.body.as_mut() {
            for local in &mut body.locals {
                local.signature = self.image.import_signature(&local.signature, module)?;
            }
            for handler in &mut body.exception_handlers {
                if let Some(catch_type) = handler.catch_type.as_ref() {
                    handler.catch_type = Some(self.image.import_signature(catch_type, module)?);
                }
            }
            for instruction in &mut body.instructions {
                if let Operand::Token(token) = instruction.operand {
                    let imported = self.image.import(token, module)?;
                    if imported != token {
                        trace!("{}: {token} -> {imported}", instruction.opcode);
                        instruction.operand = Operand::Token(imported);
                        operands += 1;
                    }
                }
            }
        }

        debug!("fixed references of {} ({operands} operands imported)", def.name);
        *self.image.method_mut(method)? = def;
        Ok(())
    }

    /// Imports every symbol `ty`, its members and nested types mention into its module.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PreconditionViolated`] if the type is not attached to a module.
    pub fn fix_type_references(&mut self, ty: Token) -> Result<()> {
        let def = self.image.type_def(ty)?;
        let module = def
            .module
            .ok_or_else(|| precondition_error!("type {} is not attached to a module", ty))?;
        let mut extends = def.extends.clone();
        let mut interfaces = def.interfaces.clone();
        let mut events = def.events.clone();
        let mut properties = def.properties.clone();
        let fields = def.fields.clone();
        let methods = def.methods.clone();
        let nested = def.nested_types.clone();

        if let Some(base) = extends.as_mut() {
            *base = self.image.import_signature(base, module)?;
        }
        for interface in &mut interfaces {
            *interface = self.image.import_signature(interface, module)?;
        }
        for event in &mut events {
            event.event_type = self.image.import_signature(&event.event_type, module)?;
        }
        for property in &mut properties {
            property.signature = self.image.import_signature(&property.signature, module)?;
        }
        let def = self.image.type_def_mut(ty)?;
        def.extends = extends;
        def.interfaces = interfaces;
        def.events = events;
        def.properties = properties;

        for field in fields {
            let signature = self.image.field(field)?.signature.clone();
            let imported = self.image.import_signature(&signature, module)?;
            self.image.field_mut(field)?.signature = imported;
        }
        for method in methods {
            self.fix_method_references(method)?;
        }
        for nested in nested {
            self.fix_type_references(nested)?;
        }
        Ok(())
    }

    /// Replaces `target` with `hook` while keeping the original reachable.
    ///
    /// A clone of `hook` is injected into the type of `target` with the target's name and
    /// attributes, and `target` is renamed to `hook_prefix + name`. Every call site of
    /// `target` in the corpus of `resolver` (by default the target's module) is repointed
    /// at the clone. Inside the clone, calls the hook made to itself now reach the renamed
    /// original, so a hook delegates by calling itself.
    ///
    /// A receiver-less hook for an instance target declares the instance as its first
    /// parameter; the clone is converted into an instance method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PreconditionViolated`] if the signatures cannot line up, before
    /// anything is modified.
    pub fn hook_method(
        &mut self,
        target: Token,
        hook: Token,
        resolver: Option<&ReferenceResolver>,
    ) -> Result<HookedMethod> {
        let target_def = self.image.method(target)?;
        let target_type = target_def.declaring_type.ok_or_else(|| {
            precondition_error!("target {} has no declaring type", target_def.name)
        })?;
        let module = self.image.owner_module(target)?;
        let hook_def = self.image.method(hook)?;

        let convert = target_def.receiver_slots() == 1 && hook_def.receiver_slots() == 0;
        if convert && hook_def.params.is_empty() {
            return Err(precondition_error!(
                "hook {} must declare the instance of {} as its first parameter",
                hook_def.name,
                target_def.name
            ));
        }
        if target_def.receiver_slots() == 0 && hook_def.receiver_slots() == 1 {
            return Err(precondition_error!(
                "hook {} takes a receiver but target {} does not",
                hook_def.name,
                target_def.name
            ));
        }
        if target_def.argument_slots() != hook_def.argument_slots() {
            return Err(precondition_error!(
                "hook {} takes {} arguments, target {} takes {}",
                hook_def.name,
                hook_def.argument_slots(),
                target_def.name,
                target_def.argument_slots()
            ));
        }

        let self_calls: Vec<usize> = hook_def.body.as_ref().map_or_else(Vec::new, |body| {
            body.instructions
                .iter()
                .enumerate()
                .filter(|(_, i)| i.opcode.is_call() && i.operand == Operand::Token(hook))
                .map(|(index, _)| index)
                .collect()
        });
        let original_name = target_def.name.clone();
        let flags = target_def.flags;
        let impl_flags = target_def.impl_flags;

        let mut detached = self.clone_method(hook)?;
        {
            let def = detached.def_mut();
            def.name.clone_from(&original_name);
            def.flags = flags;
            def.impl_flags = impl_flags;
            if convert {
                def.has_this = true;
                def.explicit_this = false;
                def.params.remove(0);
            }
        }
        let injected = self.attach_method(target_type, detached)?;

        let renamed = format!("{}{original_name}", self.config.hook_prefix);
        debug!("renaming {original_name} ({target}) to {renamed}");
        self.image.method_mut(target)?.name = renamed;

        let scanned;
        let resolver = match resolver {
            Some(resolver) => resolver,
            None => {
                scanned = ReferenceResolver::for_module(self.image, module)?;
                &scanned
            }
        };
        let outside_hook = |site: &ReferenceSite| site.method() != Some(injected);
        let mut redirected =
            resolver.replace_references_where(self.image, target, injected, true, outside_hook)?;
        if self.config.follow_imports {
            for alias in resolver.find_imports_of(self.image, target) {
                redirected += resolver.replace_references_where(
                    self.image,
                    alias,
                    injected,
                    true,
                    outside_hook,
                )?;
            }
        }

        let body = self
            .image
            .method_mut(injected)?
            .body
            .as_mut()
            .ok_or_else(|| precondition_error!("hook {} has no body", original_name))?;
        for index in &self_calls {
            if let Some(instruction) = body.instructions.get_mut(*index) {
                trace!("self-call at {index} -> {target}");
                instruction.operand = Operand::Token(target);
            }
        }

        debug!(
            "hooked {original_name}: {redirected} call sites redirected, {} self-calls bound \
             to the original",
            self_calls.len()
        );
        Ok(HookedMethod {
            hook: injected,
            original: target,
        })
    }

    /// Routes every load of `field` through an accessor cloned from `hook`.
    ///
    /// The accessor is injected into the field's type as `<field>__hookread__<hook>` unless
    /// `name` is given, and every `ldfld`/`ldsfld` of the field becomes a `call` to it. The
    /// accessor's own loads still reach the field. Returns the accessor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PreconditionViolated`] if `hook` does not take the instance (for
    /// instance fields) or does not return a value.
    pub fn hook_field_read(
        &mut self,
        field: Token,
        hook: Token,
        resolver: Option<&ReferenceResolver>,
        name: Option<&str>,
    ) -> Result<Token> {
        self.hook_field(field, hook, resolver, name, FieldAccess::Read)
    }

    /// Routes every store to `field` through an accessor cloned from `hook`.
    ///
    /// Works like [`CodeInjector::hook_field_read`] for `stfld`/`stsfld`; the accessor is
    /// named `<field>__hookwrite__<hook>` and receives the stored value as last argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PreconditionViolated`] if the hook signature does not match a store.
    pub fn hook_field_write(
        &mut self,
        field: Token,
        hook: Token,
        resolver: Option<&ReferenceResolver>,
        name: Option<&str>,
    ) -> Result<Token> {
        self.hook_field(field, hook, resolver, name, FieldAccess::Write)
    }

    fn hook_field(
        &mut self,
        field: Token,
        hook: Token,
        resolver: Option<&ReferenceResolver>,
        name: Option<&str>,
        access: FieldAccess,
    ) -> Result<Token> {
        let field_def = self.image.field(field)?;
        let field_type = field_def
            .declaring_type
            .ok_or_else(|| precondition_error!("field {} has no declaring type", field_def.name))?;
        let module = self.image.owner_module(field)?;
        let hook_def = self.image.method(hook)?;

        let expected =
            usize::from(!field_def.is_static()) + usize::from(access == FieldAccess::Write);
        if hook_def.argument_slots() != expected {
            return Err(precondition_error!(
                "field hook {} takes {} arguments, {} expected",
                hook_def.name,
                hook_def.argument_slots(),
                expected
            ));
        }
        if (access == FieldAccess::Read) == hook_def.returns_void() {
            return Err(precondition_error!(
                "field hook {} has the wrong return type for a {:?} hook",
                hook_def.name,
                access
            ));
        }

        let accessor_name = match name {
            Some(name) => name.to_string(),
            None => format!("{}{}{}", field_def.name, access.infix(), hook_def.name),
        };
        let accessor = self.inject_method(field_type, hook, Some(&accessor_name))?;

        let scanned;
        let resolver = match resolver {
            Some(resolver) => resolver,
            None => {
                scanned = ReferenceResolver::for_module(self.image, module)?;
                &scanned
            }
        };
        let mut symbols = vec![field];
        if self.config.follow_imports {
            symbols.extend(resolver.find_imports_of(self.image, field));
        }

        let mut rewritten = 0;
        let mut address_loads = 0;
        for symbol in symbols {
            for site in resolver.find_all_references(self.image, symbol)? {
                let ReferenceSite::Instruction { method, index } = site else {
                    continue;
                };
                if method == accessor {
                    continue;
                }
                let opcode = self.instruction_at(method, index)?.opcode;
                if matches!(opcode, OpCode::Ldflda | OpCode::Ldsflda) {
                    address_loads += 1;
                    continue;
                }
                if !access.intercepts(opcode) {
                    continue;
                }

                let site_module = self.image.owner_module(method)?;
                let callee = self.image.import(accessor, site_module)?;
                trace!("{method}@{index}: {opcode} {symbol} -> call {callee}");
                *self.instruction_at_mut(method, index)? =
                    Instruction::with_token(OpCode::Call, callee);
                rewritten += 1;
            }
        }

        if address_loads > 0 {
            warn!(
                "{address_loads} address loads of {} bypass the {:?} hook",
                accessor_name, access
            );
        }
        debug!("hooked {:?} of {field} via {accessor_name}: {rewritten} sites rewritten", access);
        Ok(accessor)
    }

    fn instruction_at(&self, method: Token, index: usize) -> Result<&Instruction> {
        self.image
            .method(method)?
            .body
            .as_ref()
            .and_then(|body| body.instructions.get(index))
            .ok_or_else(|| Error::NotFound(format!("instruction {index} of {method}")))
    }

    fn instruction_at_mut(&mut self, method: Token, index: usize) -> Result<&mut Instruction> {
        self.image
            .method_mut(method)?
            .body
            .as_mut()
            .and_then(|body| body.instructions.get_mut(index))
            .ok_or_else(|| Error::NotFound(format!("instruction {index} of {method}")))
    }
}
