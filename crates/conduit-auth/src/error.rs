//! Permission layer errors.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`AuthError::InvalidPattern`] | `AUTH_INVALID_PATTERN` | No |
//! | [`AuthError::MultipleGreedy`] | `AUTH_MULTIPLE_GREEDY` | No |
//! | [`AuthError::InvalidRegex`] | `AUTH_INVALID_REGEX` | No |
//! | [`AuthError::InvalidPath`] | `AUTH_INVALID_PATH` | No |
//! | [`AuthError::ProfileNotFound`] | `AUTH_PROFILE_NOT_FOUND` | No |
//! | [`AuthError::DuplicateProfile`] | `AUTH_DUPLICATE_PROFILE` | No |
//! | [`AuthError::RecordNotFound`] | `AUTH_RECORD_NOT_FOUND` | No |
//! | [`AuthError::InheritanceCycle`] | `AUTH_INHERITANCE_CYCLE` | No |
//!
//! None of these change on retry: they describe bad input or missing
//! bookkeeping.

use conduit_types::{ErrorCode, NumericalId};
use thiserror::Error;

/// Error from pattern compilation or profile bookkeeping.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The pattern text does not follow the segment grammar.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Pattern source.
        pattern: String,
        /// What is wrong with it.
        reason: String,
    },

    /// More than one of `++`, `??` or `*` in one pattern.
    #[error("pattern '{pattern}' has more than one greedy wildcard")]
    MultipleGreedy {
        /// Pattern source.
        pattern: String,
    },

    /// A `{regex}` segment does not compile.
    #[error("pattern '{pattern}' has an invalid regex segment '{segment}': {source}")]
    InvalidRegex {
        /// Pattern source.
        pattern: String,
        /// Offending segment, without braces.
        segment: String,
        /// Regex compiler error.
        #[source]
        source: regex::Error,
    },

    /// A path is not a dot-separated list of non-empty segments.
    #[error("invalid segment path '{path}': {reason}")]
    InvalidPath {
        /// Path text.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// No live profile has this id.
    #[error("permission profile {0} not found")]
    ProfileNotFound(NumericalId),

    /// A live profile already uses this name.
    #[error("permission profile '{0}' already exists")]
    DuplicateProfile(String),

    /// No live record has this id.
    #[error("permission record {0} not found")]
    RecordNotFound(NumericalId),

    /// Adding the inheritance edge would close a loop.
    #[error("profile {from} cannot inherit from {to}: {to} already inherits from {from}")]
    InheritanceCycle {
        /// Profile gaining the record.
        from: NumericalId,
        /// Profile it would inherit from.
        to: NumericalId,
    },
}

impl ErrorCode for AuthError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidPattern { .. } => "AUTH_INVALID_PATTERN",
            Self::MultipleGreedy { .. } => "AUTH_MULTIPLE_GREEDY",
            Self::InvalidRegex { .. } => "AUTH_INVALID_REGEX",
            Self::InvalidPath { .. } => "AUTH_INVALID_PATH",
            Self::ProfileNotFound(_) => "AUTH_PROFILE_NOT_FOUND",
            Self::DuplicateProfile(_) => "AUTH_DUPLICATE_PROFILE",
            Self::RecordNotFound(_) => "AUTH_RECORD_NOT_FOUND",
            Self::InheritanceCycle { .. } => "AUTH_INHERITANCE_CYCLE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_types::assert_error_codes;

    #[test]
    fn all_error_codes_valid() {
        let regex_error = regex::Regex::new("(").unwrap_err();
        let errors = vec![
            AuthError::InvalidPattern {
                pattern: "a..b".into(),
                reason: "empty segment".into(),
            },
            AuthError::MultipleGreedy {
                pattern: "++.??".into(),
            },
            AuthError::InvalidRegex {
                pattern: "{(}".into(),
                segment: "(".into(),
                source: regex_error,
            },
            AuthError::InvalidPath {
                path: ".".into(),
                reason: "empty segment".into(),
            },
            AuthError::ProfileNotFound(NumericalId(1)),
            AuthError::DuplicateProfile("admin".into()),
            AuthError::RecordNotFound(NumericalId(2)),
            AuthError::InheritanceCycle {
                from: NumericalId(1),
                to: NumericalId(2),
            },
        ];
        assert_error_codes(&errors, "AUTH_");
    }

    #[test]
    fn cycle_message_names_both_profiles() {
        let err = AuthError::InheritanceCycle {
            from: NumericalId(3),
            to: NumericalId(7),
        };
        let msg = err.to_string();
        assert!(msg.contains("#3") && msg.contains("#7"), "got: {msg}");
    }
}
