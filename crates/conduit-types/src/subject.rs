//! Subject (actor identity) types.
//!
//! A [`Subject`] names whoever is responsible for something: the platform
//! itself, a plugin, a remote connection, an internal module, an SDK or a
//! test harness. Subjects appear in causes, in handler and action
//! registrations, and as the first thing a permission comparator checks.
//!
//! Subjects compare by value. Two independently constructed
//! `Subject::Plugin` values with the same id are the same subject.

use crate::{ConnectionId, NamespaceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The actor responsible for an action.
///
/// # Variants
///
/// | Variant | Identity | Typical use |
/// |---------|----------|-------------|
/// | `Platform` | none | Built-in handlers and actions |
/// | `Plugin` | [`NamespaceId`] | Actions and handlers a plugin registers |
/// | `Connection` | [`ConnectionId`] | Requests arriving from a remote peer |
/// | `Module` | name | Internal runtime modules (resolver, permissions) |
/// | `Sdk` | name | Client SDKs embedding the protocol |
/// | `Test` | name | Test fixtures |
///
/// # Wire form
///
/// Tagged by `type`:
///
/// ```json
/// { "type": "plugin", "id": "acme:greeter" }
/// ```
///
/// # Example
///
/// ```
/// use conduit_types::Subject;
///
/// let a = Subject::plugin("acme:greeter".parse().unwrap());
/// let b = Subject::plugin("acme:greeter".parse().unwrap());
/// assert_eq!(a, b);
/// assert_eq!(a.kind(), conduit_types::SubjectKind::Plugin);
/// assert_eq!(a.to_string(), "plugin:acme:greeter");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Subject {
    /// The platform process itself.
    Platform,
    /// A plugin, identified by its namespaced id.
    Plugin {
        /// Plugin id.
        id: NamespaceId,
    },
    /// A remote peer on one transport session.
    Connection {
        /// Connection id.
        id: ConnectionId,
    },
    /// An internal module of the runtime.
    Module {
        /// Module name.
        name: String,
    },
    /// A client SDK.
    Sdk {
        /// SDK name.
        name: String,
    },
    /// A test harness.
    Test {
        /// Fixture name.
        name: String,
    },
}

/// Type tag of a [`Subject`], without identity fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// [`Subject::Platform`]
    Platform,
    /// [`Subject::Plugin`]
    Plugin,
    /// [`Subject::Connection`]
    Connection,
    /// [`Subject::Module`]
    Module,
    /// [`Subject::Sdk`]
    Sdk,
    /// [`Subject::Test`]
    Test,
}

impl SubjectKind {
    /// Lowercase tag as used on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::Plugin => "plugin",
            Self::Connection => "connection",
            Self::Module => "module",
            Self::Sdk => "sdk",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Subject {
    /// Plugin subject.
    #[must_use]
    pub fn plugin(id: NamespaceId) -> Self {
        Self::Plugin { id }
    }

    /// Connection subject.
    #[must_use]
    pub fn connection(id: ConnectionId) -> Self {
        Self::Connection { id }
    }

    /// Internal module subject.
    #[must_use]
    pub fn module(name: impl Into<String>) -> Self {
        Self::Module { name: name.into() }
    }

    /// SDK subject.
    #[must_use]
    pub fn sdk(name: impl Into<String>) -> Self {
        Self::Sdk { name: name.into() }
    }

    /// Test subject.
    #[must_use]
    pub fn test(name: impl Into<String>) -> Self {
        Self::Test { name: name.into() }
    }

    /// Returns the type tag.
    #[must_use]
    pub fn kind(&self) -> SubjectKind {
        match self {
            Self::Platform => SubjectKind::Platform,
            Self::Plugin { .. } => SubjectKind::Plugin,
            Self::Connection { .. } => SubjectKind::Connection,
            Self::Module { .. } => SubjectKind::Module,
            Self::Sdk { .. } => SubjectKind::Sdk,
            Self::Test { .. } => SubjectKind::Test,
        }
    }

    /// Returns `true` for [`Subject::Platform`].
    #[must_use]
    pub fn is_platform(&self) -> bool {
        matches!(self, Self::Platform)
    }

    /// Returns the plugin id if this is a plugin subject.
    #[must_use]
    pub fn plugin_id(&self) -> Option<&NamespaceId> {
        match self {
            Self::Plugin { id } => Some(id),
            _ => None,
        }
    }

    /// Returns the connection id if this is a connection subject.
    #[must_use]
    pub fn connection_id(&self) -> Option<ConnectionId> {
        match self {
            Self::Connection { id } => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Platform => write!(f, "platform"),
            Self::Plugin { id } => write!(f, "plugin:{id}"),
            Self::Connection { id } => write!(f, "connection:{}", id.0),
            Self::Module { name } => write!(f, "module:{name}"),
            Self::Sdk { name } => write!(f, "sdk:{name}"),
            Self::Test { name } => write!(f, "test:{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structural_equality() {
        let id = ConnectionId::new();
        assert_eq!(Subject::connection(id), Subject::connection(id));
        assert_ne!(Subject::module("a"), Subject::module("b"));
        assert_ne!(Subject::module("a"), Subject::sdk("a"));
    }

    #[test]
    fn wire_form_is_tagged() {
        let subject = Subject::plugin("acme:tool".parse().unwrap());
        let json = serde_json::to_value(&subject).unwrap();
        assert_eq!(json, json!({"type": "plugin", "id": "acme:tool"}));

        let platform = serde_json::to_value(Subject::Platform).unwrap();
        assert_eq!(platform, json!({"type": "platform"}));
    }

    #[test]
    fn decode_from_wire() {
        let subject: Subject = serde_json::from_value(json!({"type": "module", "name": "resolver"})).unwrap();
        assert_eq!(subject, Subject::module("resolver"));
        assert_eq!(subject.kind(), SubjectKind::Module);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let result = serde_json::from_value::<Subject>(json!({"type": "robot"}));
        assert!(result.is_err());
    }

    #[test]
    fn accessors() {
        let id: NamespaceId = "acme:tool".parse().unwrap();
        let subject = Subject::plugin(id.clone());
        assert_eq!(subject.plugin_id(), Some(&id));
        assert!(subject.connection_id().is_none());
        assert!(!subject.is_platform());
        assert!(Subject::Platform.is_platform());
    }

    #[test]
    fn display() {
        assert_eq!(Subject::Platform.to_string(), "platform");
        assert_eq!(Subject::test("fixture").to_string(), "test:fixture");
        assert_eq!(SubjectKind::Sdk.to_string(), "sdk");
    }
}
