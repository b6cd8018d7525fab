//! Configuration with hierarchical layering.
//!
//! # Architecture
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌────────────────────────────────────────────┐
//! │  1. Environment Variables (CONDUIT_*)      │  Runtime override
//! ├────────────────────────────────────────────┤
//! │  2. Project Config (.conduit/config.toml)  │  Project-specific
//! ├────────────────────────────────────────────┤
//! │  3. Global Config (~/.conduit/config.toml) │  User defaults
//! ├────────────────────────────────────────────┤
//! │  4. Default Values                         │  Fallback
//! └────────────────────────────────────────────┘
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `CONDUIT_DEBUG` | `debug` | bool |
//! | `CONDUIT_REQUEST_TIMEOUT_MS` | `connection.request_timeout_ms` | u64 |
//! | `CONDUIT_HANDLER_TIMEOUT_MS` | `connection.handler_timeout_ms` | u64 |
//! | `CONDUIT_RECONNECT_INTERVAL_MS` | `connection.reconnect.interval_ms` | u64 |
//! | `CONDUIT_RECONNECT_STRATEGY` | `connection.reconnect.strategy` | `fixed` / `exponential` |
//! | `CONDUIT_FORCE_PLUGINS` | `plugins.force` | bool |
//! | `CONDUIT_LOCALE` | `language.locale` | String |
//!
//! # Example Configuration
//!
//! ```toml
//! debug = false
//!
//! [connection]
//! request_timeout_ms = 30000
//! handler_timeout_ms = 30000
//! channel_buffer = 64
//!
//! [connection.reconnect]
//! strategy = "exponential"
//! interval_ms = 1000
//! max_interval_ms = 60000
//! multiplier = 2.0
//! retry_unauthorized = false
//!
//! [plugins]
//! force = false
//! directory = "plugins"
//!
//! [language]
//! locale = "en"
//!
//! [language.messages]
//! action_handler_timeout = "'{action}' took longer than {timeout_ms} ms"
//! ```

mod error;
mod loader;
mod resolver;
mod types;

pub use error::ConfigError;
pub use loader::{env, ConfigLoader};
pub use resolver::{ConfigResolver, NoOpResolver};
pub use types::{
    ConduitConfig, ConnectionConfig, LanguageConfig, PluginsConfig, ReconnectConfig,
    ReconnectStrategy,
};

use std::path::PathBuf;

/// Global config directory (`~/.conduit`).
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".conduit")
}

/// Global config file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Project config directory name.
pub const PROJECT_CONFIG_DIR: &str = ".conduit";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "config.toml";
