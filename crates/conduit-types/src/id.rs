//! Identifier types.
//!
//! Transport-level identities ([`PacketId`], [`ConnectionId`],
//! [`SessionId`]) are random UUIDs so that independently started peers
//! never collide. Registry identities are either namespaced names
//! ([`NamespaceId`], e.g. plugin ids) or repository-assigned integers
//! ([`NumericalId`], e.g. permission profiles and records).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Correlation identifier carried by every packet.
///
/// A receipt's `target` is the `id` of the request it answers.
///
/// # Example
///
/// ```
/// use conduit_types::PacketId;
///
/// let a = PacketId::new();
/// let b = PacketId::new();
/// assert_ne!(a, b);
/// assert!(a.to_string().starts_with("pkt:"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketId(pub Uuid);

#[allow(clippy::new_without_default)] // ids are allocated explicitly, never defaulted
impl PacketId {
    /// Allocates a random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkt:{}", self.0)
    }
}

/// Identifier of one transport session with one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

#[allow(clippy::new_without_default)]
impl ConnectionId {
    /// Allocates a random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Optional session a packet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Allocates a random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Repository-assigned numeric key.
///
/// Inserts into a repository return a stable `NumericalId`; ids are never
/// reused, including after soft deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NumericalId(pub u64);

impl NumericalId {
    /// Returns the raw value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NumericalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for NumericalId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Error returned when a [`NamespaceId`] cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The text has no `:` separator.
    #[error("namespace id '{0}' must have the form namespace:name")]
    MissingSeparator(String),
    /// One side of the separator is empty.
    #[error("namespace id '{0}' has an empty part")]
    EmptyPart(String),
    /// A part contains a character outside `[a-z0-9_.-]`.
    #[error("namespace id '{id}' contains invalid character '{ch}'")]
    InvalidCharacter {
        /// Offending id.
        id: String,
        /// First invalid character.
        ch: char,
    },
}

impl crate::ErrorCode for IdError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingSeparator(_) => "ID_MISSING_SEPARATOR",
            Self::EmptyPart(_) => "ID_EMPTY_PART",
            Self::InvalidCharacter { .. } => "ID_INVALID_CHARACTER",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// A `namespace:name` identifier.
///
/// Plugin ids and action names are namespaced so that independently
/// developed plugins do not clash. Both parts are restricted to lowercase
/// ASCII letters, digits, `_`, `.` and `-`.
///
/// Serializes as its text form.
///
/// # Example
///
/// ```
/// use conduit_types::NamespaceId;
///
/// let id: NamespaceId = "acme:greeter".parse().unwrap();
/// assert_eq!(id.namespace(), "acme");
/// assert_eq!(id.name(), "greeter");
/// assert_eq!(id.to_string(), "acme:greeter");
///
/// assert!("no-separator".parse::<NamespaceId>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId {
    namespace: String,
    name: String,
}

impl NamespaceId {
    /// Builds an id from validated parts.
    ///
    /// # Errors
    ///
    /// Returns [`IdError`] if either part is empty or has invalid characters.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self, IdError> {
        let namespace = namespace.into();
        let name = name.into();
        let full = format!("{namespace}:{name}");
        if namespace.is_empty() || name.is_empty() {
            return Err(IdError::EmptyPart(full));
        }
        if let Some(ch) = namespace
            .chars()
            .chain(name.chars())
            .find(|c| !is_id_char(*c))
        {
            return Err(IdError::InvalidCharacter { id: full, ch });
        }
        Ok(Self { namespace, name })
    }

    /// Namespace part (before the colon).
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name part (after the colon).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-')
}

impl FromStr for NamespaceId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, name) = s
            .split_once(':')
            .ok_or_else(|| IdError::MissingSeparator(s.to_string()))?;
        Self::new(namespace, name)
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

impl Serialize for NamespaceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NamespaceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
