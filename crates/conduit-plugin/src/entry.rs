//! Plugin entry points and loaders.

use crate::{PluginError, PluginMeta};
use async_trait::async_trait;
use std::error::Error as StdError;
use std::sync::Arc;

/// Error type plugin callbacks may return.
pub type EntryError = Box<dyn StdError + Send + Sync>;

/// Lifecycle callbacks of a loaded plugin.
///
/// Every callback defaults to a no-op. The manager calls them with the
/// plugin's state machine already in the matching active state; an `Err`
/// moves the plugin to the matching error state.
///
/// # Example
///
/// ```
/// use conduit_plugin::{async_trait, EntryError, PluginEntry, PluginMeta};
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// #[derive(Default)]
/// struct Greeter {
///     running: AtomicBool,
/// }
///
/// #[async_trait]
/// impl PluginEntry for Greeter {
///     async fn enable(&self, _meta: &PluginMeta) -> Result<(), EntryError> {
///         self.running.store(true, Ordering::SeqCst);
///         Ok(())
///     }
///
///     async fn disable(&self, _meta: &PluginMeta) -> Result<(), EntryError> {
///         self.running.store(false, Ordering::SeqCst);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait PluginEntry: Send + Sync {
    /// Called on `load`.
    async fn load(&self, _meta: &PluginMeta) -> Result<(), EntryError> {
        Ok(())
    }

    /// Called on `enable`.
    async fn enable(&self, _meta: &PluginMeta) -> Result<(), EntryError> {
        Ok(())
    }

    /// Called on `disable`.
    async fn disable(&self, _meta: &PluginMeta) -> Result<(), EntryError> {
        Ok(())
    }

    /// Called on `unload`.
    async fn unload(&self, _meta: &PluginMeta) -> Result<(), EntryError> {
        Ok(())
    }
}

/// Entry whose callbacks all succeed without doing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEntry;

#[async_trait]
impl PluginEntry for NoopEntry {}

/// A plugin ready to be handed to the manager.
#[derive(Clone)]
pub struct PluginArtifact {
    /// Metadata.
    pub meta: PluginMeta,
    /// Callbacks.
    pub entry: Arc<dyn PluginEntry>,
}

impl PluginArtifact {
    /// Pairs metadata with an entry.
    #[must_use]
    pub fn new(meta: PluginMeta, entry: Arc<dyn PluginEntry>) -> Self {
        Self { meta, entry }
    }

    /// Artifact with a [`NoopEntry`].
    #[must_use]
    pub fn noop(meta: PluginMeta) -> Self {
        Self::new(meta, Arc::new(NoopEntry))
    }
}

impl std::fmt::Debug for PluginArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginArtifact")
            .field("coordinate", &self.meta.coordinate)
            .finish_non_exhaustive()
    }
}

/// Produces plugin entries from metadata.
///
/// The runtime ships a static, in-process loader. Other loaders (archives,
/// remote registries) implement the same trait.
#[async_trait]
pub trait PluginLoader: Send + Sync {
    /// Creates the entry for `meta`.
    ///
    /// # Errors
    ///
    /// [`PluginError::LoaderMissing`] if this loader cannot produce the
    /// plugin, or a loader-specific failure.
    async fn load(&self, meta: &PluginMeta) -> Result<Arc<dyn PluginEntry>, PluginError>;

    /// Loads and pairs with the metadata.
    ///
    /// # Errors
    ///
    /// Whatever [`load`](Self::load) returns.
    async fn artifact(&self, meta: PluginMeta) -> Result<PluginArtifact, PluginError> {
        let entry = self.load(&meta).await?;
        Ok(PluginArtifact::new(meta, entry))
    }
}
