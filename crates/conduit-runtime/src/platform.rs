//! The platform facade.
//!
//! [`Platform`] owns one instance of every runtime service and wires them
//! together from a [`ConduitConfig`]:
//!
//! ```text
//! Platform
//!   ├── ActionRegistry ◄── built-in actions (ping, permission.check, plugin.list)
//!   ├── PacketApi      ◄── shared by every connection
//!   ├── ConnectionRegistry
//!   ├── Supervisor     ◄── root scope; connections run under children
//!   ├── PermissionManager
//!   └── PluginManager
//! ```

use crate::auth::PermissionManager;
use crate::config::ConduitConfig;
use crate::connection::{Connection, ConnectionError, ConnectionRegistry};
use crate::dispatch::{ActionRegistry, HandlerError, PacketApi};
use crate::plugin::{BatchReport, PluginManager, PluginSummary, ResolutionError};
use crate::supervisor::Supervisor;
use crate::transport::{memory_pair, TransportSession};
use crate::PlatformError;
use conduit_auth::Permission;
use conduit_plugin::PluginArtifact;
use conduit_protocol::{Action, RequestMode, TypeDescriptor};
use conduit_types::{Cause, NumericalId, Subject};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// `conduit:platform.ping`: answers `"pong"`.
pub const PING: &str = "conduit:platform.ping";

/// `conduit:permission.check`: evaluates a [`PermissionQuery`].
pub const PERMISSION_CHECK: &str = "conduit:permission.check";

/// `conduit:plugin.list`: summaries of resident plugins.
pub const PLUGIN_LIST: &str = "conduit:plugin.list";

/// Argument of [`PERMISSION_CHECK`].
///
/// With a profile the permission is evaluated against that profile;
/// without one, against the profiles assigned to the permission's subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionQuery {
    /// Profile to evaluate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<NumericalId>,
    /// Candidate permission.
    pub permission: Permission,
}

/// Descriptor of [`PING`].
#[must_use]
pub fn ping_action() -> Action<(), String> {
    Action::new(PING, Subject::Platform).with_parameter(TypeDescriptor::unit())
}

/// Descriptor of [`PERMISSION_CHECK`]. `null` means no record decided.
#[must_use]
pub fn permission_check_action() -> Action<PermissionQuery, Option<bool>> {
    Action::new(PERMISSION_CHECK, Subject::Platform)
        .with_result(TypeDescriptor::of::<Option<bool>>().nullable().optional())
}

/// Descriptor of [`PLUGIN_LIST`].
#[must_use]
pub fn plugin_list_action() -> Action<(), Vec<PluginSummary>> {
    Action::new(PLUGIN_LIST, Subject::Platform).with_parameter(TypeDescriptor::unit())
}

/// Every runtime service of one platform process.
///
/// # Example
///
/// ```
/// use conduit_runtime::config::ConduitConfig;
/// use conduit_runtime::Platform;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let platform = Platform::new(ConduitConfig::default()).unwrap();
/// let (connection, _peer) = platform.connect_memory().unwrap();
/// assert!(connection.is_open());
///
/// platform.shutdown().await;
/// assert!(!connection.is_open());
/// # }
/// ```
pub struct Platform {
    config: ConduitConfig,
    actions: Arc<ActionRegistry>,
    api: Arc<PacketApi>,
    connections: Arc<ConnectionRegistry>,
    supervisor: Supervisor,
    permissions: Arc<PermissionManager>,
    plugins: Arc<PluginManager>,
}

impl Platform {
    /// Builds the services and registers the built-in actions.
    ///
    /// # Errors
    ///
    /// [`PlatformError`] if a built-in action cannot be registered.
    pub fn new(config: ConduitConfig) -> Result<Self, PlatformError> {
        let supervisor = Supervisor::new();
        let actions = Arc::new(ActionRegistry::with_supervisor(supervisor.child()));
        let api = PacketApi::new(Arc::clone(&actions))
            .with_language(config.language.table())
            .with_handler_timeout(config.connection.handler_timeout());

        let platform = Self {
            actions,
            api: Arc::new(api),
            connections: Arc::new(ConnectionRegistry::new()),
            supervisor,
            permissions: Arc::new(PermissionManager::new()),
            plugins: Arc::new(PluginManager::new()),
            config,
        };
        platform.register_builtins()?;
        info!(
            locale = platform.config.language.locale.as_str(),
            actions = platform.actions.descriptors().len(),
            "platform ready"
        );
        Ok(platform)
    }

    fn register_builtins(&self) -> Result<(), PlatformError> {
        self.actions
            .handle(&ping_action(), RequestMode::Sync, |(), _ctx| async {
                Ok::<_, HandlerError>("pong".to_string())
            })?;

        let permissions = Arc::clone(&self.permissions);
        self.actions.handle(
            &permission_check_action(),
            RequestMode::Sync,
            move |query: PermissionQuery, _ctx| {
                let permissions = Arc::clone(&permissions);
                async move {
                    let decision = match query.profile {
                        Some(profile) => permissions.has_permission(profile, &query.permission)?,
                        None => permissions.check(&query.permission)?,
                    };
                    Ok::<_, HandlerError>(decision)
                }
            },
        )?;

        let plugins = Arc::clone(&self.plugins);
        self.actions
            .handle(&plugin_list_action(), RequestMode::Sync, move |(), _ctx| {
                let plugins = Arc::clone(&plugins);
                async move { Ok::<_, HandlerError>(plugins.list().await) }
            })?;
        Ok(())
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &ConduitConfig {
        &self.config
    }

    /// Action table shared by every connection.
    #[must_use]
    pub fn actions(&self) -> &Arc<ActionRegistry> {
        &self.actions
    }

    /// Packet dispatcher.
    #[must_use]
    pub fn api(&self) -> &Arc<PacketApi> {
        &self.api
    }

    /// Open connections.
    #[must_use]
    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    /// Root supervisor.
    #[must_use]
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Permission profiles and checks.
    #[must_use]
    pub fn permissions(&self) -> &Arc<PermissionManager> {
        &self.permissions
    }

    /// Resident plugins.
    #[must_use]
    pub fn plugins(&self) -> &Arc<PluginManager> {
        &self.plugins
    }

    /// Opens a connection over `session`.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::AlreadyRegistered`] if the registry refuses it.
    pub fn connect(&self, session: TransportSession) -> Result<Connection, ConnectionError> {
        Connection::open(
            session,
            Arc::clone(&self.api),
            Arc::clone(&self.connections),
            &self.supervisor,
            self.config.connection.request_timeout(),
        )
    }

    /// Opens a connection over an in-process pipe and returns the other
    /// end of the pipe.
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect).
    pub fn connect_memory(&self) -> Result<(Connection, TransportSession), ConnectionError> {
        let (local, remote) = memory_pair(self.config.connection.channel_buffer);
        Ok((self.connect(local)?, remote))
    }

    /// Enables a plugin batch with the configured `force` policy.
    ///
    /// # Errors
    ///
    /// See [`PluginManager::enable_plugins`].
    pub async fn enable_plugins(
        &self,
        artifacts: Vec<PluginArtifact>,
    ) -> Result<BatchReport, ResolutionError> {
        self.plugins
            .enable_plugins(artifacts, self.config.plugins.force)
            .await
    }

    /// Closes every connection, then cancels and waits for all tasks.
    pub async fn shutdown(&self) {
        let cause = Cause::text("platform shutting down").by(Subject::Platform);
        self.connections.close_all(cause).await;
        self.supervisor.shutdown().await;
        info!("platform stopped");
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("connections", &self.connections.len())
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}
