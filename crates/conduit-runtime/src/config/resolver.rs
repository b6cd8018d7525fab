//! Overrides applied after loading.
//!
//! ```text
//! ConfigLoader.load()  →  ConduitConfig (files + env)
//!                              │
//!                     ConfigResolver.apply()   (CLI flags, embedders)
//!                              ▼
//!                         ConduitConfig (final)
//! ```

use super::ConduitConfig;

/// Applies overrides to a loaded configuration.
///
/// Implementors touch only the options they were given and leave the
/// rest of the config alone.
pub trait ConfigResolver {
    /// Applies overrides.
    fn apply(&self, config: &mut ConduitConfig);
}

/// Resolver that changes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpResolver;

impl ConfigResolver for NoOpResolver {
    fn apply(&self, _config: &mut ConduitConfig) {}
}
