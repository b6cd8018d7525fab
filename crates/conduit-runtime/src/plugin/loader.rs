//! In-process plugin loader.

use conduit_plugin::{async_trait, PluginEntry, PluginError, PluginLoader, PluginMeta};
use conduit_types::NamespaceId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

type Factory = Arc<dyn Fn(&PluginMeta) -> Arc<dyn PluginEntry> + Send + Sync>;

/// Loader backed by entry factories compiled into the process.
///
/// # Example
///
/// ```
/// use conduit_plugin::{NoopEntry, PluginLoader};
/// use conduit_runtime::StaticPluginLoader;
/// use std::sync::Arc;
///
/// let loader = StaticPluginLoader::new();
/// loader.register("acme:echo".parse().unwrap(), |_| Arc::new(NoopEntry));
/// assert!(loader.contains(&"acme:echo".parse().unwrap()));
/// ```
#[derive(Default)]
pub struct StaticPluginLoader {
    factories: RwLock<HashMap<NamespaceId, Factory>>,
}

impl StaticPluginLoader {
    /// Loader with no factories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the factory for `id`, replacing any earlier one.
    pub fn register<F>(&self, id: NamespaceId, factory: F)
    where
        F: Fn(&PluginMeta) -> Arc<dyn PluginEntry> + Send + Sync + 'static,
    {
        self.factories.write().insert(id, Arc::new(factory));
    }

    /// Drops the factory for `id`. Returns whether one existed.
    pub fn unregister(&self, id: &NamespaceId) -> bool {
        self.factories.write().remove(id).is_some()
    }

    /// Whether a factory exists for `id`.
    #[must_use]
    pub fn contains(&self, id: &NamespaceId) -> bool {
        self.factories.read().contains_key(id)
    }

    /// Registered ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<NamespaceId> {
        let mut ids: Vec<_> = self.factories.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for StaticPluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticPluginLoader")
            .field("ids", &self.ids())
            .finish()
    }
}

#[async_trait]
impl PluginLoader for StaticPluginLoader {
    async fn load(&self, meta: &PluginMeta) -> Result<Arc<dyn PluginEntry>, PluginError> {
        let factory = self
            .factories
            .read()
            .get(meta.id())
            .cloned()
            .ok_or_else(|| PluginError::LoaderMissing {
                id: meta.id().clone(),
            })?;
        Ok(factory(meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{PluginManager, ResolutionError};
    use conduit_plugin::{NoopEntry, PluginCoordinate, PluginState};
    use semver::Version;

    fn meta(text: &str) -> PluginMeta {
        PluginMeta::new(PluginCoordinate::new(
            text.parse().unwrap(),
            Version::new(1, 0, 0),
        ))
    }

    #[tokio::test]
    async fn unknown_plugin_is_missing() {
        let loader = StaticPluginLoader::new();
        let err = loader.load(&meta("t:ghost")).await.err().unwrap();
        assert!(matches!(err, PluginError::LoaderMissing { .. }));
    }

    #[tokio::test]
    async fn registered_factory_feeds_manager() {
        let loader = StaticPluginLoader::new();
        loader.register("t:echo".parse().unwrap(), |_| Arc::new(NoopEntry));
        assert_eq!(loader.ids(), vec!["t:echo".parse().unwrap()]);

        let manager = PluginManager::new();
        let report = manager
            .enable_from(&loader, vec![meta("t:echo")], false)
            .await
            .unwrap();
        assert_eq!(report.completed.len(), 1);
        assert_eq!(
            manager.state_of(&"t:echo".parse().unwrap()).await,
            Some(PluginState::Enabled)
        );
    }

    #[tokio::test]
    async fn loader_miss_aborts_unless_forced() {
        let loader = StaticPluginLoader::new();
        loader.register("t:echo".parse().unwrap(), |_| Arc::new(NoopEntry));
        let manager = PluginManager::new();

        let err = manager
            .enable_from(&loader, vec![meta("t:ghost"), meta("t:echo")], false)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Aborted { .. }));
        assert!(manager.list().await.is_empty());

        let report = manager
            .enable_from(&loader, vec![meta("t:ghost"), meta("t:echo")], true)
            .await
            .unwrap();
        assert_eq!(report.failed(), vec![&"t:ghost".parse::<NamespaceId>().unwrap()]);
        assert!(loader.unregister(&"t:echo".parse().unwrap()));
    }
}
