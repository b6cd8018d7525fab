//! Configuration errors.
//!
//! | Error | Code |
//! |-------|------|
//! | [`ConfigError::ReadFile`] | `CONFIG_READ_FILE` |
//! | [`ConfigError::ParseToml`] | `CONFIG_PARSE_TOML` |
//! | [`ConfigError::InvalidEnvVar`] | `CONFIG_INVALID_ENV_VAR` |
//! | [`ConfigError::InvalidValue`] | `CONFIG_INVALID_VALUE` |
//!
//! None is recoverable: the input has to change.

use conduit_types::ErrorCode;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce a usable [`ConduitConfig`](super::ConduitConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("cannot read config file '{}': {source}", path.display())]
    ReadFile {
        /// File.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A config file is not valid TOML for the schema.
    #[error("config file '{}' is malformed: {source}", path.display())]
    ParseToml {
        /// File.
        path: PathBuf,
        /// Parser failure.
        #[source]
        source: toml::de::Error,
    },

    /// A `CONDUIT_*` variable could not be parsed.
    #[error("environment variable '{name}' is invalid: {message}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// What was expected.
        message: String,
    },

    /// The merged configuration breaks a constraint.
    #[error("config key '{key}' is invalid: {message}")]
    InvalidValue {
        /// Dotted key, e.g. `connection.reconnect.multiplier`.
        key: &'static str,
        /// Broken constraint.
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_value(key: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            message: message.into(),
        }
    }
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::ReadFile { .. } => "CONFIG_READ_FILE",
            Self::ParseToml { .. } => "CONFIG_PARSE_TOML",
            Self::InvalidEnvVar { .. } => "CONFIG_INVALID_ENV_VAR",
            Self::InvalidValue { .. } => "CONFIG_INVALID_VALUE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
