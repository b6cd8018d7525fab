//! Action-layer failures reported to peers.
//!
//! These never travel as transport faults. The dispatcher turns each one
//! into a `failed` receipt whose cause carries:
//!
//! - `id`: the stable wire id below,
//! - `message`: rendered from the [`LanguageTable`],
//! - `context`: the structured fields of the variant.
//!
//! | Variant | Wire id | Code |
//! |---------|---------|------|
//! | [`UnsupportedPacketType`](ActionError::UnsupportedPacketType) | `unsupported_packet_type` | `ACTION_UNSUPPORTED_PACKET_TYPE` |
//! | [`UnsupportedRequestMode`](ActionError::UnsupportedRequestMode) | `unsupported_request_mode` | `ACTION_UNSUPPORTED_REQUEST_MODE` |
//! | [`UnsupportedRequestAction`](ActionError::UnsupportedRequestAction) | `unsupported_request_action` | `ACTION_UNSUPPORTED_REQUEST_ACTION` |
//! | [`InternalActionHandlerError`](ActionError::InternalActionHandlerError) | `internal_action_handler_error` | `ACTION_INTERNAL_HANDLER_ERROR` |
//! | [`ActionHandlerTimeout`](ActionError::ActionHandlerTimeout) | `action_handler_timeout` | `ACTION_HANDLER_TIMEOUT` |
//! | [`AdapterNotFound`](ActionError::AdapterNotFound) | `adapter_not_found` | `ACTION_ADAPTER_NOT_FOUND` |
//! | [`InvalidArgument`](ActionError::InvalidArgument) | `invalid_argument` | `ACTION_INVALID_ARGUMENT` |

use crate::{LanguageTable, RequestMode};
use conduit_types::{Cause, ErrorCode, Reason, Subject};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Failure of a single request at the action layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// No packet handler for this `type`.
    #[error("unsupported packet type '{got}'")]
    UnsupportedPacketType {
        /// Type found on the packet.
        got: String,
        /// Types with a registered handler.
        supported: Vec<String>,
    },

    /// The action exists but has no handler for the requested mode.
    #[error("action '{action}' does not support {mode} mode")]
    UnsupportedRequestMode {
        /// Action name.
        action: String,
        /// Requested mode.
        mode: RequestMode,
        /// Modes with a handler.
        supported: Vec<RequestMode>,
    },

    /// The action name is unknown.
    #[error("unsupported request action '{action}'")]
    UnsupportedRequestAction {
        /// Action name.
        action: String,
    },

    /// The handler returned an error or panicked.
    #[error("handler for '{action}' failed: {message}")]
    InternalActionHandlerError {
        /// Action name.
        action: String,
        /// Local description. Not sent to the peer.
        message: String,
    },

    /// The handler exceeded the request timeout and was cancelled.
    #[error("handler for '{action}' exceeded {timeout_ms}ms")]
    ActionHandlerTimeout {
        /// Action name.
        action: String,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// The action is declared but no handler was ever attached.
    #[error("no handler registered for declared action '{action}'")]
    AdapterNotFound {
        /// Action name.
        action: String,
    },

    /// The argument violates the action's parameter descriptor.
    #[error("invalid argument for '{action}': {message}")]
    InvalidArgument {
        /// Action name.
        action: String,
        /// What is wrong with it.
        message: String,
    },
}

impl ActionError {
    /// Every wire id this enum can produce.
    pub const IDS: [&'static str; 7] = [
        "unsupported_packet_type",
        "unsupported_request_mode",
        "unsupported_request_action",
        "internal_action_handler_error",
        "action_handler_timeout",
        "adapter_not_found",
        "invalid_argument",
    ];

    /// Stable wire id.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::UnsupportedPacketType { .. } => Self::IDS[0],
            Self::UnsupportedRequestMode { .. } => Self::IDS[1],
            Self::UnsupportedRequestAction { .. } => Self::IDS[2],
            Self::InternalActionHandlerError { .. } => Self::IDS[3],
            Self::ActionHandlerTimeout { .. } => Self::IDS[4],
            Self::AdapterNotFound { .. } => Self::IDS[5],
            Self::InvalidArgument { .. } => Self::IDS[6],
        }
    }

    /// Structured context sent to the peer.
    ///
    /// The internal message of a handler error is withheld; only the action
    /// name is shared.
    #[must_use]
    pub fn context(&self) -> Map<String, Value> {
        let value = match self {
            Self::UnsupportedPacketType { got, supported } => {
                json!({ "got": got, "supported": supported })
            }
            Self::UnsupportedRequestMode {
                action,
                mode,
                supported,
            } => json!({ "action": action, "mode": mode, "supported": supported }),
            Self::UnsupportedRequestAction { action }
            | Self::InternalActionHandlerError { action, .. }
            | Self::AdapterNotFound { action } => json!({ "action": action }),
            Self::ActionHandlerTimeout { action, timeout_ms } => {
                json!({ "action": action, "timeout_ms": timeout_ms })
            }
            Self::InvalidArgument { action, message } => {
                json!({ "action": action, "message": message })
            }
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Renders this failure as a cause attributed to `subject`.
    #[must_use]
    pub fn to_cause(&self, language: &LanguageTable, subject: Subject) -> Cause {
        let context = self.context();
        let message = language
            .render(self.id(), &context)
            .unwrap_or_else(|| self.id().replace('_', " "));
        Cause::error(self.id(), message, context).by(subject)
    }

    /// Reconstructs a failure from a receipt cause.
    ///
    /// Returns `None` for causes that are not action-layer errors. The
    /// message of an internal handler error is not on the wire and comes
    /// back as the rendered text.
    #[must_use]
    pub fn from_cause(cause: &Cause) -> Option<Self> {
        let Reason::Error {
            id,
            message,
            context,
        } = &cause.reason
        else {
            return None;
        };
        let text = |key: &str| context.get(key).and_then(Value::as_str).map(str::to_string);
        let list = |key: &str| -> Vec<String> {
            context
                .get(key)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default()
        };
        let action = text("action").unwrap_or_default();
        match id.as_str() {
            "unsupported_packet_type" => Some(Self::UnsupportedPacketType {
                got: text("got")?,
                supported: list("supported"),
            }),
            "unsupported_request_mode" => {
                let mode = context
                    .get("mode")
                    .cloned()
                    .and_then(|v| serde_json::from_value(v).ok())?;
                let supported = context
                    .get("supported")
                    .cloned()
                    .and_then(|v| serde_json::from_value(v).ok())
                    .unwrap_or_default();
                Some(Self::UnsupportedRequestMode {
                    action,
                    mode,
                    supported,
                })
            }
            "unsupported_request_action" => Some(Self::UnsupportedRequestAction { action }),
            "internal_action_handler_error" => Some(Self::InternalActionHandlerError {
                action,
                message: message.clone(),
            }),
            "action_handler_timeout" => Some(Self::ActionHandlerTimeout {
                action,
                timeout_ms: context.get("timeout_ms").and_then(Value::as_u64)?,
            }),
            "adapter_not_found" => Some(Self::AdapterNotFound { action }),
            "invalid_argument" => Some(Self::InvalidArgument {
                action,
                message: text("message").unwrap_or_default(),
            }),
            _ => None,
        }
    }
}

impl ErrorCode for ActionError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedPacketType { .. } => "ACTION_UNSUPPORTED_PACKET_TYPE",
            Self::UnsupportedRequestMode { .. } => "ACTION_UNSUPPORTED_REQUEST_MODE",
            Self::UnsupportedRequestAction { .. } => "ACTION_UNSUPPORTED_REQUEST_ACTION",
            Self::InternalActionHandlerError { .. } => "ACTION_INTERNAL_HANDLER_ERROR",
            Self::ActionHandlerTimeout { .. } => "ACTION_HANDLER_TIMEOUT",
            Self::AdapterNotFound { .. } => "ACTION_ADAPTER_NOT_FOUND",
            Self::InvalidArgument { .. } => "ACTION_INVALID_ARGUMENT",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ActionHandlerTimeout { .. } | Self::InternalActionHandlerError { .. }
        )
    }
}
