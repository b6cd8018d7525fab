//! Plugin layer errors.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`PluginError::IllegalState`] | `PLUGIN_ILLEGAL_STATE` | No |
//! | [`PluginError::InProgress`] | `PLUGIN_IN_PROGRESS` | Yes |
//! | [`PluginError::NotRecoverable`] | `PLUGIN_NOT_RECOVERABLE` | No |
//! | [`PluginError::Callback`] | `PLUGIN_CALLBACK_FAILED` | Yes |
//! | [`PluginError::Manifest`] | `PLUGIN_MANIFEST` | No |
//! | [`PluginError::LoaderMissing`] | `PLUGIN_LOADER_MISSING` | No |
//! | [`PluginError::NotInstalled`] | `PLUGIN_NOT_INSTALLED` | No |
//! | [`PluginError::AlreadyInstalled`] | `PLUGIN_ALREADY_INSTALLED` | No |
//! | [`PluginError::DependencyFailed`] | `PLUGIN_DEPENDENCY_FAILED` | Yes |
//!
//! `InProgress` clears once the running action finishes. A failed callback
//! may succeed after [`recover`](crate::Lifecycle::recover) and a retry.

use crate::{EntryError, PluginAction, PluginState};
use conduit_types::{ErrorCode, NamespaceId};
use thiserror::Error;

/// Plugin layer error.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The action is not valid from the current state.
    #[error("cannot {action} plugin {id} in state {state}")]
    IllegalState {
        /// Plugin.
        id: NamespaceId,
        /// Refused action.
        action: PluginAction,
        /// State at the time.
        state: PluginState,
    },

    /// Another action is still running.
    #[error("cannot {action} plugin {id}: {state} is in progress")]
    InProgress {
        /// Plugin.
        id: NamespaceId,
        /// Refused action.
        action: PluginAction,
        /// Active state.
        state: PluginState,
    },

    /// `recover` called outside an error state.
    #[error("plugin {id} is {state}, not in an error state")]
    NotRecoverable {
        /// Plugin.
        id: NamespaceId,
        /// State at the time.
        state: PluginState,
    },

    /// The plugin's own callback failed.
    #[error("plugin {id} failed to {action}: {source}")]
    Callback {
        /// Plugin.
        id: NamespaceId,
        /// Action whose callback failed.
        action: PluginAction,
        /// Callback error.
        #[source]
        source: EntryError,
    },

    /// A manifest could not be read or parsed.
    #[error("invalid plugin manifest {origin}: {message}")]
    Manifest {
        /// File path or other origin.
        origin: String,
        /// Reader or parser message.
        message: String,
    },

    /// No loader knows the plugin.
    #[error("no loader can provide plugin {id}")]
    LoaderMissing {
        /// Plugin.
        id: NamespaceId,
    },

    /// The manager does not know the plugin.
    #[error("plugin {id} is not installed")]
    NotInstalled {
        /// Plugin.
        id: NamespaceId,
    },

    /// The plugin is already resident.
    #[error("plugin {id} is already installed")]
    AlreadyInstalled {
        /// Plugin.
        id: NamespaceId,
    },

    /// Skipped because a related plugin failed earlier in the same batch.
    #[error("plugin {id} skipped: {dependency} failed in the same batch")]
    DependencyFailed {
        /// Skipped plugin.
        id: NamespaceId,
        /// The plugin that failed.
        dependency: NamespaceId,
    },
}

impl PluginError {
    /// Plugin the error is about, if any.
    #[must_use]
    pub fn plugin(&self) -> Option<&NamespaceId> {
        match self {
            Self::IllegalState { id, .. }
            | Self::InProgress { id, .. }
            | Self::NotRecoverable { id, .. }
            | Self::Callback { id, .. }
            | Self::LoaderMissing { id }
            | Self::NotInstalled { id }
            | Self::AlreadyInstalled { id }
            | Self::DependencyFailed { id, .. } => Some(id),
            Self::Manifest { .. } => None,
        }
    }
}

impl ErrorCode for PluginError {
    fn code(&self) -> &'static str {
        match self {
            Self::IllegalState { .. } => "PLUGIN_ILLEGAL_STATE",
            Self::InProgress { .. } => "PLUGIN_IN_PROGRESS",
            Self::NotRecoverable { .. } => "PLUGIN_NOT_RECOVERABLE",
            Self::Callback { .. } => "PLUGIN_CALLBACK_FAILED",
            Self::Manifest { .. } => "PLUGIN_MANIFEST",
            Self::LoaderMissing { .. } => "PLUGIN_LOADER_MISSING",
            Self::NotInstalled { .. } => "PLUGIN_NOT_INSTALLED",
            Self::AlreadyInstalled { .. } => "PLUGIN_ALREADY_INSTALLED",
            Self::DependencyFailed { .. } => "PLUGIN_DEPENDENCY_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InProgress { .. } | Self::Callback { .. } | Self::DependencyFailed { .. }
        )
    }
}
