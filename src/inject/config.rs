//! Injector configuration
//!
//! Options that steer how the injector names renamed originals, how far reference rewriting
//! reaches across module boundaries and how deep nested types may be cloned.

/// Configuration for [`crate::inject::CodeInjector`] operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectorConfig {
    /// Prefix prepended to the name of a hooked method, which stays reachable under
    /// `hook_prefix + original_name` (default: `__hooked__`)
    pub hook_prefix: &'static str,

    /// Also rewrite references that reach a hooked symbol through a `MemberRef` of another
    /// scanned module, importing the replacement into that module (default: true)
    pub follow_imports: bool,

    /// Maximum nesting depth for nested classes when cloning types (default: 64)
    pub max_nesting_depth: usize,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            hook_prefix: "__hooked__",
            follow_imports: true,
            max_nesting_depth: 64,
        }
    }
}

impl InjectorConfig {
    /// Creates a configuration that only rewrites references by exact token identity
    ///
    /// Call sites in other modules, which reach the target through their own `MemberRef`,
    /// keep calling the original.
    #[must_use]
    pub fn local_only() -> Self {
        Self {
            follow_imports: false,
            ..Self::default()
        }
    }

    /// Returns this configuration with a different rename prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: &'static str) -> Self {
        self.hook_prefix = prefix;
        self
    }
}
