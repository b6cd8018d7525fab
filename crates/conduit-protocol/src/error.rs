//! Protocol layer errors.
//!
//! These describe frames that could not become packets. They are local
//! faults of the receiving side; action-layer failures that the peer must
//! learn about live in [`ActionError`](crate::ActionError).
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`ProtocolError::Malformed`] | `PROTOCOL_MALFORMED_PACKET` | No |
//! | [`ProtocolError::Raw`] | `PROTOCOL_RAW` | No |
//! | [`ProtocolError::UnexpectedType`] | `PROTOCOL_UNEXPECTED_TYPE` | No |

use conduit_raw::RawError;
use conduit_types::ErrorCode;
use thiserror::Error;

/// Failure to decode or encode a packet.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame with a known `type` failed validation.
    #[error("malformed {packet_type} packet: {source}")]
    Malformed {
        /// Declared packet type, or `unknown` when unreadable.
        packet_type: String,
        /// Underlying access error.
        #[source]
        source: RawError,
    },

    /// Frame-level failure before a packet type could be determined.
    #[error(transparent)]
    Raw(#[from] RawError),

    /// A decoded packet had a different type than the caller expected.
    #[error("expected {expected} packet, got {got}")]
    UnexpectedType {
        /// Wanted type.
        expected: &'static str,
        /// Actual type.
        got: String,
    },
}

impl ErrorCode for ProtocolError {
    fn code(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "PROTOCOL_MALFORMED_PACKET",
            Self::Raw(_) => "PROTOCOL_RAW",
            Self::UnexpectedType { .. } => "PROTOCOL_UNEXPECTED_TYPE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
