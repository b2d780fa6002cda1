//! Modules and the module-local references they import.

use rustc_hash::FxHashMap;

use crate::metadata::token::Token;

/// A module of the image.
///
/// Besides its top-level types, a module owns the cache of references it imported: for every
/// foreign definition it was asked to import, the `TypeRef` or `MemberRef` created for it.
/// The cache makes importing idempotent, so the same foreign symbol is always referenced
/// through the same token from within one module.
#[derive(Debug, Clone)]
pub struct Module {
    /// The token of this module
    pub token: Token,
    /// Module name
    pub name: String,
    /// Top-level types in declaration order
    pub types: Vec<Token>,
    /// Foreign definition -> module-local reference
    pub(crate) import_cache: FxHashMap<Token, Token>,
}

impl Module {
    /// Creates an empty module.
    #[must_use]
    pub fn new(token: Token, name: &str) -> Self {
        Module {
            token,
            name: name.to_string(),
            types: Vec::new(),
            import_cache: FxHashMap::default(),
        }
    }

    /// The reference this module already imported for `definition`, if any.
    #[must_use]
    pub fn imported(&self, definition: Token) -> Option<Token> {
        self.import_cache.get(&definition).copied()
    }

    /// Number of distinct foreign definitions imported into this module.
    #[must_use]
    pub fn import_count(&self) -> usize {
        self.import_cache.len()
    }
}

/// Module-local reference to a type defined in another module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    /// The token of this reference
    pub token: Token,
    /// Module the reference belongs to
    pub module: Token,
    /// The referenced `TypeDef`
    pub target: Token,
}

/// Module-local reference to a method or field defined in another module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    /// The token of this reference
    pub token: Token,
    /// Module the reference belongs to
    pub module: Token,
    /// The referenced `MethodDef` or `Field`
    pub target: Token,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::token::TableId;

    #[test]
    fn test_new_module_is_empty() {
        let token = Token::from_parts(TableId::Module, 1);
        let module = Module::new(token, "App");
        assert_eq!(module.token, token);
        assert_eq!(module.name, "App");
        assert!(module.types.is_empty());
        assert_eq!(module.import_count(), 0);
        assert_eq!(module.imported(Token::from_parts(TableId::TypeDef, 1)), None);
    }
}
