//! Platform registration errors.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`PlatformError::DuplicateHandler`] | `PLATFORM_DUPLICATE_HANDLER` | No |
//! | [`PlatformError::HandlerNotFound`] | `PLATFORM_HANDLER_NOT_FOUND` | No |
//! | [`PlatformError::DuplicateAdapter`] | `PLATFORM_DUPLICATE_ADAPTER` | No |
//! | [`PlatformError::ActionConflict`] | `PLATFORM_ACTION_CONFLICT` | No |
//! | [`PlatformError::ActionNotFound`] | `PLATFORM_ACTION_NOT_FOUND` | No |
//! | [`PlatformError::Decoder`] | `PLATFORM_DECODER` | No |
//!
//! All of these are programming or wiring mistakes reported to the caller
//! that attempted the registration. None reaches a peer.

use conduit_protocol::RequestMode;
use conduit_raw::RawError;
use conduit_types::ErrorCode;
use thiserror::Error;

/// Registration error of the dispatch tables.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// A packet type already has a handler.
    #[error("packet type '{packet_type}' already has a handler")]
    DuplicateHandler {
        /// Packet type.
        packet_type: String,
    },

    /// No handler to remove.
    #[error("no handler registered for packet type '{packet_type}'")]
    HandlerNotFound {
        /// Packet type.
        packet_type: String,
    },

    /// The action already has a handler for this mode.
    #[error("action '{action}' already has a {mode} handler")]
    DuplicateAdapter {
        /// Action name.
        action: String,
        /// Mode.
        mode: RequestMode,
    },

    /// The name is declared with different descriptors.
    #[error("action '{action}' is already declared with a different signature")]
    ActionConflict {
        /// Action name.
        action: String,
    },

    /// Nothing declared under the name, or no handler for the mode.
    #[error("action '{action}' is not registered")]
    ActionNotFound {
        /// Action name.
        action: String,
    },

    /// Decoder registration failed.
    #[error("decoder registration failed: {0}")]
    Decoder(#[from] RawError),
}

impl ErrorCode for PlatformError {
    fn code(&self) -> &'static str {
        match self {
            Self::DuplicateHandler { .. } => "PLATFORM_DUPLICATE_HANDLER",
            Self::HandlerNotFound { .. } => "PLATFORM_HANDLER_NOT_FOUND",
            Self::DuplicateAdapter { .. } => "PLATFORM_DUPLICATE_ADAPTER",
            Self::ActionConflict { .. } => "PLATFORM_ACTION_CONFLICT",
            Self::ActionNotFound { .. } => "PLATFORM_ACTION_NOT_FOUND",
            Self::Decoder(_) => "PLATFORM_DECODER",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
