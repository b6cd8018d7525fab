//! Causal chains.
//!
//! A [`Cause`] explains why a packet, state change or failure happened.
//! Causes nest: the cause of a receipt wraps the request that triggered it,
//! which may wrap the event that triggered the request, and so on.
//!
//! A cause owns its parent by value, and a parent must exist before a child
//! can wrap it, so a chain can never loop back on itself.
//!
//! ```text
//! error{action_handler_timeout}  (subject: platform)
//!   └─ packet{pkt:…}             (subject: connection:…)
//!        └─ text{"user clicked"}
//! ```

use crate::{PacketId, Subject};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// What a [`Cause`] points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reason {
    /// Free text.
    Text {
        /// Human-readable reason.
        message: String,
    },
    /// An earlier packet (usually the request being answered).
    Packet {
        /// Originating packet id.
        id: PacketId,
    },
    /// A named event (disconnect, shutdown, ...).
    Event {
        /// Event name.
        name: String,
    },
    /// A structured error.
    Error {
        /// Machine-readable id, e.g. `unsupported_request_action`.
        id: String,
        /// Human-readable, locale-resolved message.
        message: String,
        /// Structured details (offending values, supported alternatives).
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        context: Map<String, Value>,
    },
}

/// A link in a causal chain.
///
/// # Example
///
/// ```
/// use conduit_types::{Cause, PacketId, Subject};
///
/// let root = Cause::text("operator requested shutdown").by(Subject::Platform);
/// let cause = Cause::event("shutdown").because(root);
///
/// assert_eq!(cause.chain().count(), 2);
/// assert_eq!(cause.root().subject, Some(Subject::Platform));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cause {
    /// What happened.
    pub reason: Reason,
    /// Who is responsible, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
    /// The earlier cause this one derives from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<Cause>>,
}

impl Cause {
    /// Cause with no subject and no parent.
    #[must_use]
    pub fn new(reason: Reason) -> Self {
        Self {
            reason,
            subject: None,
            parent: None,
        }
    }

    /// Free-text cause.
    #[must_use]
    pub fn text(message: impl Into<String>) -> Self {
        Self::new(Reason::Text {
            message: message.into(),
        })
    }

    /// Cause pointing at an earlier packet.
    #[must_use]
    pub fn packet(id: PacketId) -> Self {
        Self::new(Reason::Packet { id })
    }

    /// Cause pointing at a named event.
    #[must_use]
    pub fn event(name: impl Into<String>) -> Self {
        Self::new(Reason::Event { name: name.into() })
    }

    /// Structured error cause.
    #[must_use]
    pub fn error(
        id: impl Into<String>,
        message: impl Into<String>,
        context: Map<String, Value>,
    ) -> Self {
        Self::new(Reason::Error {
            id: id.into(),
            message: message.into(),
            context,
        })
    }

    /// Attributes this cause to `subject`.
    #[must_use]
    pub fn by(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Makes `parent` the cause of this one.
    #[must_use]
    pub fn because(mut self, parent: Cause) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// Iterates from this cause to the root.
    pub fn chain(&self) -> impl Iterator<Item = &Cause> {
        std::iter::successors(Some(self), |c| c.parent.as_deref())
    }

    /// Returns the oldest cause in the chain.
    #[must_use]
    pub fn root(&self) -> &Cause {
        self.chain().last().unwrap_or(self)
    }

    /// Returns the error id if this cause is a structured error.
    #[must_use]
    pub fn error_id(&self) -> Option<&str> {
        match &self.reason {
            Reason::Error { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Returns the first packet id found walking toward the root.
    #[must_use]
    pub fn origin_packet(&self) -> Option<PacketId> {
        self.chain().find_map(|c| match c.reason {
            Reason::Packet { id } => Some(id),
            _ => None,
        })
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Reason::Text { message } => write!(f, "{message}")?,
            Reason::Packet { id } => write!(f, "packet {id}")?,
            Reason::Event { name } => write!(f, "event {name}")?,
            Reason::Error { id, message, .. } => write!(f, "{id}: {message}")?,
        }
        if let Some(subject) = &self.subject {
            write!(f, " (by {subject})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chain_walks_to_root() {
        let first = Cause::text("start");
        let second = Cause::event("tick").because(first.clone());
        let third = Cause::text("end").because(second);

        let kinds: Vec<_> = third.chain().map(ToString::to_string).collect();
        assert_eq!(kinds, vec!["end", "event tick", "start"]);
        assert_eq!(third.root(), &first);
    }

    #[test]
    fn origin_packet_found_in_parent() {
        let id = PacketId::new();
        let cause = Cause::error("action_handler_timeout", "timed out", Map::new())
            .because(Cause::packet(id));
        assert_eq!(cause.origin_packet(), Some(id));
        assert_eq!(cause.error_id(), Some("action_handler_timeout"));
    }

    #[test]
    fn serializes_compactly() {
        let cause = Cause::text("hello").by(Subject::Platform);
        let json = serde_json::to_value(&cause).unwrap();
        assert_eq!(
            json,
            json!({
                "reason": {"kind": "text", "message": "hello"},
                "subject": {"type": "platform"}
            })
        );
    }

    #[test]
    fn error_context_roundtrip() {
        let mut context = Map::new();
        context.insert("got".into(), json!("ping"));
        let cause = Cause::error("unsupported_packet_type", "nope", context);
        let back: Cause = serde_json::from_value(serde_json::to_value(&cause).unwrap()).unwrap();
        assert_eq!(back, cause);
    }

    #[test]
    fn display_includes_subject() {
        let cause = Cause::event("closed").by(Subject::module("connection"));
        assert_eq!(cause.to_string(), "event closed (by module:connection)");
    }
}
