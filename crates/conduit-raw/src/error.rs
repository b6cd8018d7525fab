//! Raw field access errors.
//!
//! Every variant names the offending field so that the failure can be
//! traced to the access site.
//!
//! | Code | Recoverable |
//! |------|-------------|
//! | `RAW_MISSING_FIELD` | No |
//! | `RAW_NO_DEFAULT` | No |
//! | `RAW_NULL_NOT_ALLOWED` | No |
//! | `RAW_DECODE` | No |
//! | `RAW_ENCODE` | No |
//! | `RAW_REQUIRED_FIELD` | No |
//! | `RAW_TYPE_MISMATCH` | No |
//! | `RAW_NOT_AN_OBJECT` | No |
//! | `RAW_UNKNOWN_DISCRIMINATOR` | No |
//! | `RAW_DUPLICATE_DECODER` | No |
//! | `RAW_MALFORMED_FRAME` | No |

use crate::schema::FieldType;
use conduit_types::ErrorCode;
use thiserror::Error;

/// Raw envelope error.
#[derive(Debug, Error)]
pub enum RawError {
    /// A required field is absent.
    #[error("missing required field '{field}'")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// An optional, non-nullable field is absent and the reader supplied no default.
    #[error("field '{field}' is absent (optional, non-nullable) and no default was supplied")]
    NoDefault {
        /// Field name.
        field: String,
    },

    /// A null was read from or written to a non-nullable field.
    #[error("field '{field}' is null but declared non-nullable")]
    NullNotAllowed {
        /// Field name.
        field: String,
    },

    /// The stored tree does not deserialize into the requested type.
    #[error("field '{field}' cannot be read as {expected}: {source}")]
    Decode {
        /// Field name.
        field: String,
        /// Requested Rust type.
        expected: &'static str,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// A typed value could not be serialized into a tree.
    #[error("field '{field}' cannot be encoded: {source}")]
    Encode {
        /// Field name.
        field: String,
        /// Underlying encode failure.
        #[source]
        source: serde_json::Error,
    },

    /// Attempted to remove a field declared required.
    #[error("field '{field}' is required and cannot be removed")]
    RequiredField {
        /// Field name.
        field: String,
    },

    /// Schema validation found a value of the wrong shape.
    #[error("field '{field}' in {schema} must be {expected}, found {found}")]
    TypeMismatch {
        /// Schema name.
        schema: &'static str,
        /// Field name.
        field: String,
        /// Declared type tag.
        expected: FieldType,
        /// Observed JSON kind.
        found: &'static str,
    },

    /// A raw payload must be a JSON object.
    #[error("raw payload must be an object, found {found}")]
    NotAnObject {
        /// Observed JSON kind.
        found: &'static str,
    },

    /// No decoder is registered for the discriminator.
    #[error("no {base} decoder registered for '{discriminator}'")]
    UnknownDiscriminator {
        /// Base type the registry decodes.
        base: &'static str,
        /// Discriminator value found in the payload.
        discriminator: String,
    },

    /// A decoder is already registered for the discriminator.
    #[error("{base} decoder for '{discriminator}' is already registered")]
    DuplicateDecoder {
        /// Base type the registry decodes.
        base: &'static str,
        /// Discriminator value.
        discriminator: String,
    },

    /// A text frame is not valid JSON.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),
}

impl RawError {
    /// Returns the field this error refers to, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field }
            | Self::NoDefault { field }
            | Self::NullNotAllowed { field }
            | Self::Decode { field, .. }
            | Self::Encode { field, .. }
            | Self::RequiredField { field }
            | Self::TypeMismatch { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl ErrorCode for RawError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "RAW_MISSING_FIELD",
            Self::NoDefault { .. } => "RAW_NO_DEFAULT",
            Self::NullNotAllowed { .. } => "RAW_NULL_NOT_ALLOWED",
            Self::Decode { .. } => "RAW_DECODE",
            Self::Encode { .. } => "RAW_ENCODE",
            Self::RequiredField { .. } => "RAW_REQUIRED_FIELD",
            Self::TypeMismatch { .. } => "RAW_TYPE_MISMATCH",
            Self::NotAnObject { .. } => "RAW_NOT_AN_OBJECT",
            Self::UnknownDiscriminator { .. } => "RAW_UNKNOWN_DISCRIMINATOR",
            Self::DuplicateDecoder { .. } => "RAW_DUPLICATE_DECODER",
            Self::MalformedFrame(_) => "RAW_MALFORMED_FRAME",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
