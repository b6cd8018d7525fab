//! Permission candidates.

use crate::{AuthError, SegmentPath};
use conduit_types::Subject;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What is being asked for: a subject, a node and optional context.
///
/// # Example
///
/// ```
/// use conduit_auth::Permission;
/// use conduit_types::Subject;
///
/// let permission = Permission::parse(Subject::module("shell"), "conduit.plugin.install")
///     .unwrap()
///     .with_context("plugin", "acme:tool");
/// assert_eq!(permission.node.to_string(), "conduit.plugin.install");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    /// Who wants it.
    pub subject: Subject,
    /// Permission node.
    pub node: SegmentPath,
    /// Extra facts comparators may look at.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
}

impl Permission {
    /// Permission on `node` with empty context.
    #[must_use]
    pub fn new(subject: Subject, node: SegmentPath) -> Self {
        Self {
            subject,
            node,
            context: Map::new(),
        }
    }

    /// Parses `node` and builds the permission.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidPath`] if `node` is not a valid path.
    pub fn parse(subject: Subject, node: &str) -> Result<Self, AuthError> {
        Ok(Self::new(subject, SegmentPath::parse(node)?))
    }

    /// Adds a context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}
