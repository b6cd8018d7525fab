//! Outcomes of plugin batches.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`ResolutionError::Rejected`] | `PLUGIN_RESOLUTION_REJECTED` | No |
//! | [`ResolutionError::Aborted`] | `PLUGIN_RESOLUTION_ABORTED` | Yes |
//!
//! A rejected batch touched nothing. An aborted batch stopped at its
//! first failure; the report says what completed before it.

use conduit_plugin::{PluginError, PluginState, VersionMatcher};
use conduit_types::{ErrorCode, NamespaceId};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One reason a batch cannot run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionIssue {
    /// Required dependencies form a cycle.
    #[error("dependency cycle between {}", join(members))]
    Cycle {
        /// Plugins in the cycle, sorted.
        members: Vec<NamespaceId>,
    },

    /// A different version is resident and cannot be replaced.
    #[error("plugin {id} {candidate} conflicts with resident {resident} in state {state}")]
    VersionConflict {
        /// Plugin.
        id: NamespaceId,
        /// Resident version.
        resident: Version,
        /// Candidate version.
        candidate: Version,
        /// State of the resident copy.
        state: PluginState,
    },

    /// A required dependency is neither in the batch nor enabled.
    #[error("plugin {id} requires {dependency} {wanted}{}", found_suffix(found.as_ref()))]
    MissingDependency {
        /// Dependent plugin.
        id: NamespaceId,
        /// Required plugin.
        dependency: NamespaceId,
        /// Required versions.
        wanted: VersionMatcher,
        /// Version that is present but does not match.
        found: Option<Version>,
    },

    /// The plugin does not accept this platform's protocol.
    #[error("plugin {id} wants protocol {wanted}, platform speaks {platform}")]
    ProtocolMismatch {
        /// Plugin.
        id: NamespaceId,
        /// Accepted protocol versions.
        wanted: VersionMatcher,
        /// Platform protocol version.
        platform: Version,
    },

    /// An enabled plugin outside the batch still requires it.
    #[error("plugin {id} is required by enabled plugin {dependent}")]
    RequiredBy {
        /// Plugin to stop.
        id: NamespaceId,
        /// Enabled dependent.
        dependent: NamespaceId,
    },

    /// The manager does not know the plugin.
    #[error("plugin {id} is not installed")]
    NotInstalled {
        /// Plugin.
        id: NamespaceId,
    },
}

fn join(ids: &[NamespaceId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn found_suffix(found: Option<&Version>) -> String {
    found.map(|v| format!(" (found {v})")).unwrap_or_default()
}

/// A candidate skipped because an enabled plugin provides it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Satisfied {
    /// Skipped candidate.
    pub id: NamespaceId,
    /// Enabled plugin whose provision covers it.
    pub provider: NamespaceId,
}

/// What a batch did.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Processing order.
    pub order: Vec<NamespaceId>,
    /// Plugins that reached the target state.
    pub completed: Vec<NamespaceId>,
    /// Plugins already in the target state.
    pub unchanged: Vec<NamespaceId>,
    /// Candidates covered by a provision.
    pub satisfied: Vec<Satisfied>,
    /// Failures collected under `force`.
    pub failures: Vec<PluginError>,
    /// Optional edges dropped to break cycles, `(dependent, dependency)`.
    pub dropped_edges: Vec<(NamespaceId, NamespaceId)>,
}

impl BatchReport {
    /// Whether nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Ids of failed plugins.
    #[must_use]
    pub fn failed(&self) -> Vec<&NamespaceId> {
        self.failures.iter().filter_map(PluginError::plugin).collect()
    }
}

/// Batch failure.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The batch was refused before anything ran.
    #[error("plugin batch rejected: {}", issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Rejected {
        /// Every problem found.
        issues: Vec<ResolutionIssue>,
    },

    /// A plugin failed without `force`.
    #[error("plugin batch aborted: {failure}")]
    Aborted {
        /// The failure that stopped the batch.
        #[source]
        failure: PluginError,
        /// Progress up to the failure.
        report: BatchReport,
    },
}

impl ResolutionError {
    /// Issues of a rejected batch, empty for an aborted one.
    #[must_use]
    pub fn issues(&self) -> &[ResolutionIssue] {
        match self {
            Self::Rejected { issues } => issues,
            Self::Aborted { .. } => &[],
        }
    }
}

impl ErrorCode for ResolutionError {
    fn code(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "PLUGIN_RESOLUTION_REJECTED",
            Self::Aborted { .. } => "PLUGIN_RESOLUTION_ABORTED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// Listing entry for one resident plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSummary {
    /// Plugin id.
    pub id: NamespaceId,
    /// Version.
    pub version: Version,
    /// Release channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Display name.
    pub name: String,
    /// Lifecycle state.
    pub state: PluginState,
}

impl fmt::Display for PluginSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} [{}]", self.id, self.version, self.state)
    }
}
