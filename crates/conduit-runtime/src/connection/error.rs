//! Connection errors.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`ConnectionError::Closed`] | `CONNECTION_CLOSED` | Yes |
//! | [`ConnectionError::AlreadyClosed`] | `CONNECTION_ALREADY_CLOSED` | No |
//! | [`ConnectionError::NotRegistered`] | `CONNECTION_NOT_REGISTERED` | No |
//! | [`ConnectionError::AlreadyRegistered`] | `CONNECTION_ALREADY_REGISTERED` | No |
//! | [`ConnectionError::Timeout`] | `CONNECTION_TIMEOUT` | Yes |
//! | [`ConnectionError::Interrupted`] | `CONNECTION_INTERRUPTED` | Yes |
//! | [`ConnectionError::Cancelled`] | `CONNECTION_CANCELLED` | No |
//! | [`ConnectionError::Encode`] | `CONNECTION_ENCODE` | No |
//! | [`ConnectionError::Transport`] | `CONNECTION_TRANSPORT` | per transport |
//! | [`ConnectionError::Protocol`] | `CONNECTION_PROTOCOL` | No |
//! | [`ConnectionError::Raw`] | `CONNECTION_RAW` | No |

use crate::transport::TransportError;
use conduit_protocol::ProtocolError;
use conduit_raw::RawError;
use conduit_types::{Cause, ConnectionId, ErrorCode, PacketId};
use thiserror::Error;

/// Connection layer error.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The connection no longer accepts requests.
    #[error("connection {id} is closed")]
    Closed {
        /// Connection.
        id: ConnectionId,
    },

    /// `close` was called on a connection that is closing or closed.
    #[error("connection {id} was already closed")]
    AlreadyClosed {
        /// Connection.
        id: ConnectionId,
    },

    /// The routing table has no entry for the connection.
    #[error("connection {id} is not registered")]
    NotRegistered {
        /// Connection.
        id: ConnectionId,
    },

    /// The routing table already has an entry for the connection.
    #[error("connection {id} is already registered")]
    AlreadyRegistered {
        /// Connection.
        id: ConnectionId,
    },

    /// No receipt within the request timeout.
    #[error("request {packet} for '{action}' timed out after {timeout_ms}ms")]
    Timeout {
        /// Request id.
        packet: PacketId,
        /// Action name.
        action: String,
        /// Elapsed timeout.
        timeout_ms: u64,
    },

    /// The connection closed while the request was pending.
    #[error("request {packet} interrupted: {cause}")]
    Interrupted {
        /// Request id.
        packet: PacketId,
        /// Why the connection closed.
        cause: Cause,
    },

    /// Reconnection was cancelled.
    #[error("reconnect cancelled")]
    Cancelled,

    /// The argument could not be serialized.
    #[error("cannot encode argument for '{action}': {source}")]
    Encode {
        /// Action name.
        action: String,
        /// Serializer error.
        #[source]
        source: serde_json::Error,
    },

    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Frame could not be decoded or encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Receipt data did not match the action's result descriptor.
    #[error(transparent)]
    Raw(#[from] RawError),
}

impl ErrorCode for ConnectionError {
    fn code(&self) -> &'static str {
        match self {
            Self::Closed { .. } => "CONNECTION_CLOSED",
            Self::AlreadyClosed { .. } => "CONNECTION_ALREADY_CLOSED",
            Self::NotRegistered { .. } => "CONNECTION_NOT_REGISTERED",
            Self::AlreadyRegistered { .. } => "CONNECTION_ALREADY_REGISTERED",
            Self::Timeout { .. } => "CONNECTION_TIMEOUT",
            Self::Interrupted { .. } => "CONNECTION_INTERRUPTED",
            Self::Cancelled => "CONNECTION_CANCELLED",
            Self::Encode { .. } => "CONNECTION_ENCODE",
            Self::Transport(_) => "CONNECTION_TRANSPORT",
            Self::Protocol(_) => "CONNECTION_PROTOCOL",
            Self::Raw(_) => "CONNECTION_RAW",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Closed { .. } | Self::Timeout { .. } | Self::Interrupted { .. } => true,
            Self::Transport(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_types::assert_error_codes;

    #[test]
    fn all_error_codes_valid() {
        let id = ConnectionId::new();
        let encode = serde_json::from_str::<u8>("x").unwrap_err();
        let errors = vec![
            ConnectionError::Closed { id },
            ConnectionError::AlreadyClosed { id },
            ConnectionError::NotRegistered { id },
            ConnectionError::AlreadyRegistered { id },
            ConnectionError::Timeout {
                packet: PacketId::new(),
                action: "acme:echo".into(),
                timeout_ms: 10,
            },
            ConnectionError::Interrupted {
                packet: PacketId::new(),
                cause: Cause::text("connection closed"),
            },
            ConnectionError::Cancelled,
            ConnectionError::Encode {
                action: "acme:echo".into(),
                source: encode,
            },
            ConnectionError::Transport(TransportError::Closed),
            ConnectionError::Raw(RawError::MissingField {
                field: "data".into(),
            }),
        ];
        assert_error_codes(&errors, "CONNECTION_");
    }

    #[test]
    fn recoverability_follows_transport() {
        assert!(ConnectionError::Transport(TransportError::Closed).is_recoverable());
        assert!(!ConnectionError::Transport(TransportError::Unauthorized {
            reason: "expired".into()
        })
        .is_recoverable());
        assert!(!ConnectionError::AlreadyClosed {
            id: ConnectionId::new()
        }
        .is_recoverable());
    }
}
