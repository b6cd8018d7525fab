//! Machine-readable error codes.
//!
//! Every error enum in the workspace implements [`ErrorCode`]. The code is
//! what operators grep for and what gets embedded in failure receipts, so it
//! is treated as API: once published, a code does not change.
//!
//! | Prefix | Crate |
//! |--------|-------|
//! | `ID_` | conduit-types |
//! | `RAW_` | conduit-raw |
//! | `PROTOCOL_`, `ACTION_` | conduit-protocol |
//! | `AUTH_` | conduit-auth |
//! | `PLUGIN_` | conduit-plugin |
//! | `CONNECTION_`, `CONFIG_`, `PLATFORM_`, `RESOLUTION_` | conduit-runtime |
//!
//! # Example
//!
//! ```
//! use conduit_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum LinkError {
//!     Reset,
//!     BadFrame,
//! }
//!
//! impl ErrorCode for LinkError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Reset => "LINK_RESET",
//!             Self::BadFrame => "LINK_BAD_FRAME",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Reset)
//!     }
//! }
//!
//! assert_eq!(LinkError::Reset.code(), "LINK_RESET");
//! assert!(!LinkError::BadFrame.is_recoverable());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error identification shared by all conduit error types.
///
/// # Code format
///
/// - UPPER_SNAKE_CASE, prefixed with the owning crate's domain
///   (`"CONNECTION_TIMEOUT"`, `"PLUGIN_ILLEGAL_STATE"`).
/// - Never reused for a different meaning.
///
/// # Recoverability
///
/// `true` when retrying, reconnecting or correcting input may succeed
/// (timeouts, closed transports). `false` for programmer and
/// configuration errors (illegal state transitions, malformed patterns).
pub trait ErrorCode {
    /// Returns the machine-readable code.
    fn code(&self) -> &'static str;

    /// Returns whether retrying may succeed.
    fn is_recoverable(&self) -> bool;
}

/// Serializable projection of an error implementing [`ErrorCode`].
///
/// Used wherever an error has to leave the process as data, e.g. in the
/// context of an `internal_action_handler_error` receipt or in CLI error
/// output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummary {
    /// Machine-readable code.
    pub code: String,
    /// Rendered `Display` text.
    pub message: String,
    /// Whether a retry may help.
    pub recoverable: bool,
}

impl ErrorSummary {
    /// Captures code, message and recoverability of `err`.
    #[must_use]
    pub fn of<E: ErrorCode + fmt::Display + ?Sized>(err: &E) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}

impl fmt::Display for ErrorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Asserts that `err` carries a well-formed code with `expected_prefix`.
///
/// Intended for tests of error enums.
///
/// # Panics
///
/// Panics if the code is empty, lacks the prefix, or is not UPPER_SNAKE_CASE.
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();
    assert!(!code.is_empty(), "error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "error code '{code}' must start with '{expected_prefix}'"
    );
    assert!(
        is_upper_snake_case(code),
        "error code '{code}' must be UPPER_SNAKE_CASE"
    );
}

/// Runs [`assert_error_code`] over every variant in `errors` and checks that
/// no two variants share a code.
///
/// # Panics
///
/// Panics on the first malformed or duplicated code.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    let mut seen = std::collections::HashSet::new();
    for err in errors {
        assert_error_code(err, expected_prefix);
        assert!(seen.insert(err.code()), "duplicate error code '{}'", err.code());
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('_')
        && !s.ends_with('_')
        && !s.contains("__")
        && s.chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
