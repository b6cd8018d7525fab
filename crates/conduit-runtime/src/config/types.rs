//! Configuration types.
//!
//! Every section implements [`Default`]; a file only needs the keys it
//! changes.

use super::ConfigError;
use conduit_protocol::{LanguageTable, DEFAULT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Effective configuration after all layers are merged.
///
/// # Example
///
/// ```
/// use conduit_runtime::config::ConduitConfig;
///
/// let config = ConduitConfig::default();
/// assert!(!config.debug);
/// assert_eq!(config.connection.request_timeout_ms, 30_000);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConduitConfig {
    /// Verbose diagnostics.
    pub debug: bool,

    /// Connection and dispatch settings.
    pub connection: ConnectionConfig,

    /// Plugin manager settings.
    pub plugins: PluginsConfig,

    /// Message templates for peer-facing errors.
    pub language: LanguageConfig,
}

impl ConduitConfig {
    /// Config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Parses TOML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid for this schema.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Overlays `other` onto `self`.
    ///
    /// A value from `other` wins only where it differs from the default,
    /// so an overlay that omits a key never resets the base.
    pub fn merge(&mut self, other: &Self) {
        if other.debug {
            self.debug = true;
        }
        self.connection.merge(&other.connection);
        self.plugins.merge(&other.plugins);
        self.language.merge(&other.language);
    }

    /// Checks constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let connection = &self.connection;
        if connection.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "connection.request_timeout_ms",
                "must be positive",
            ));
        }
        if connection.handler_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "connection.handler_timeout_ms",
                "must be positive",
            ));
        }
        if connection.channel_buffer == 0 {
            return Err(ConfigError::invalid_value(
                "connection.channel_buffer",
                "must be at least 1",
            ));
        }

        let reconnect = &connection.reconnect;
        if !reconnect.multiplier.is_finite() || reconnect.multiplier < 1.0 {
            return Err(ConfigError::invalid_value(
                "connection.reconnect.multiplier",
                format!("must be a finite number >= 1, got {}", reconnect.multiplier),
            ));
        }
        if reconnect.max_interval_ms < reconnect.interval_ms {
            return Err(ConfigError::invalid_value(
                "connection.reconnect.max_interval_ms",
                format!(
                    "{} is below interval_ms {}",
                    reconnect.max_interval_ms, reconnect.interval_ms
                ),
            ));
        }

        if self.language.locale.trim().is_empty() {
            return Err(ConfigError::invalid_value("language.locale", "must not be empty"));
        }
        Ok(())
    }
}

/// `[connection]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Wait for a receipt when the caller gives no timeout.
    pub request_timeout_ms: u64,

    /// Handler budget when a request carries no usable timeout.
    pub handler_timeout_ms: u64,

    /// Inbound frame buffer per connection.
    pub channel_buffer: usize,

    /// Reconnection behaviour.
    pub reconnect: ReconnectConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
            handler_timeout_ms: DEFAULT_TIMEOUT_MS,
            channel_buffer: 64,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ConnectionConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.request_timeout_ms != default.request_timeout_ms {
            self.request_timeout_ms = other.request_timeout_ms;
        }
        if other.handler_timeout_ms != default.handler_timeout_ms {
            self.handler_timeout_ms = other.handler_timeout_ms;
        }
        if other.channel_buffer != default.channel_buffer {
            self.channel_buffer = other.channel_buffer;
        }
        self.reconnect.merge(&other.reconnect);
    }

    /// [`request_timeout_ms`](Self::request_timeout_ms) as a duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// [`handler_timeout_ms`](Self::handler_timeout_ms) as a duration.
    #[must_use]
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }
}

/// Delay growth between reconnect attempts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectStrategy {
    /// Same delay every time.
    #[default]
    Fixed,
    /// Delay multiplied after each failure, capped.
    Exponential,
}

impl std::str::FromStr for ReconnectStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "exponential" => Ok(Self::Exponential),
            other => Err(format!("expected 'fixed' or 'exponential', got '{other}'")),
        }
    }
}

/// `[connection.reconnect]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Fixed or exponential.
    pub strategy: ReconnectStrategy,

    /// Delay before the first retry, and every retry when fixed.
    pub interval_ms: u64,

    /// Cap for exponential growth.
    pub max_interval_ms: u64,

    /// Growth factor for exponential retries.
    pub multiplier: f64,

    /// Keep retrying after the peer rejected our credentials.
    pub retry_unauthorized: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            strategy: ReconnectStrategy::Fixed,
            interval_ms: 5_000,
            max_interval_ms: 60_000,
            multiplier: 2.0,
            retry_unauthorized: false,
        }
    }
}

impl ReconnectConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.strategy != default.strategy {
            self.strategy = other.strategy;
        }
        if other.interval_ms != default.interval_ms {
            self.interval_ms = other.interval_ms;
        }
        if other.max_interval_ms != default.max_interval_ms {
            self.max_interval_ms = other.max_interval_ms;
        }
        if (other.multiplier - default.multiplier).abs() > f64::EPSILON {
            self.multiplier = other.multiplier;
        }
        if other.retry_unauthorized != default.retry_unauthorized {
            self.retry_unauthorized = other.retry_unauthorized;
        }
    }
}

/// `[plugins]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PluginsConfig {
    /// Best-effort batches: keep going past failures and replace plugins
    /// stuck in an error state.
    pub force: bool,

    /// Directory scanned for `*.toml` plugin manifests.
    pub directory: Option<PathBuf>,
}

impl PluginsConfig {
    fn merge(&mut self, other: &Self) {
        if other.force {
            self.force = true;
        }
        if other.directory.is_some() {
            self.directory.clone_from(&other.directory);
        }
    }
}

/// `[language]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LanguageConfig {
    /// Locale tag, e.g. `en` or `de-CH`.
    pub locale: String,

    /// Template overrides keyed by error id, e.g.
    /// `action_handler_timeout = "Too slow: {action}"`.
    pub messages: BTreeMap<String, String>,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            locale: "en".into(),
            messages: BTreeMap::new(),
        }
    }
}

impl LanguageConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.locale != default.locale {
            self.locale.clone_from(&other.locale);
        }
        for (id, text) in &other.messages {
            self.messages.insert(id.clone(), text.clone());
        }
    }

    /// Message table for this locale with the overrides applied.
    #[must_use]
    pub fn table(&self) -> LanguageTable {
        LanguageTable::for_locale(&self.locale).with_overrides(self.messages.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn default_config() {
        let config = ConduitConfig::default();
        assert!(!config.debug);
        assert_eq!(config.connection.handler_timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.connection.reconnect.strategy, ReconnectStrategy::Fixed);
        assert!(!config.plugins.force);
        assert_eq!(config.language.locale, "en");
    }

    #[test]
    fn toml_roundtrip() {
        let config = ConduitConfig::default();
        let text = config.to_toml().expect("should serialize default config");
        let restored = ConduitConfig::from_toml(&text).expect("should parse serialized config");
        assert_eq!(config, restored);
    }

    #[test]
    fn toml_partial_parse() {
        let text = r#"
[connection]
request_timeout_ms = 500

[connection.reconnect]
strategy = "exponential"

[language.messages]
adapter_not_found = "nobody home: {action}"
"#;
        let config = ConduitConfig::from_toml(text).expect("should parse partial TOML");
        assert_eq!(config.connection.request_timeout_ms, 500);
        assert_eq!(config.connection.channel_buffer, 64);
        assert_eq!(
            config.connection.reconnect.strategy,
            ReconnectStrategy::Exponential
        );
        assert_eq!(config.connection.reconnect.interval_ms, 5_000);
        assert_eq!(config.language.messages.len(), 1);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let text = "[connection.reconnect]\nstrategy = \"linear\"\n";
        assert!(ConduitConfig::from_toml(text).is_err());
        assert!("linear".parse::<ReconnectStrategy>().is_err());
        assert_eq!(
            "Exponential".parse::<ReconnectStrategy>(),
            Ok(ReconnectStrategy::Exponential)
        );
    }

    #[test]
    fn merge_overrides_non_default() {
        let mut base = ConduitConfig::default();
        let overlay = ConduitConfig {
            connection: ConnectionConfig {
                handler_timeout_ms: 250,
                ..Default::default()
            },
            plugins: PluginsConfig {
                directory: Some(PathBuf::from("plugins")),
                ..Default::default()
            },
            ..Default::default()
        };

        base.merge(&overlay);

        assert_eq!(base.connection.handler_timeout_ms, 250);
        assert_eq!(base.connection.request_timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(base.plugins.directory, Some(PathBuf::from("plugins")));
    }

    #[test]
    fn merge_keeps_base_when_overlay_is_default() {
        let mut base = ConduitConfig {
            debug: true,
            ..Default::default()
        };
        base.connection.reconnect.interval_ms = 100;

        base.merge(&ConduitConfig::default());

        assert!(base.debug);
        assert_eq!(base.connection.reconnect.interval_ms, 100);
    }

    #[test]
    fn messages_accumulate_across_layers() {
        let mut base = ConduitConfig::default();
        base.language
            .messages
            .insert("adapter_not_found".into(), "base".into());
        let mut overlay = ConduitConfig::default();
        overlay
            .language
            .messages
            .insert("invalid_argument".into(), "overlay".into());

        base.merge(&overlay);

        assert_eq!(base.language.messages.len(), 2);
    }

    #[test]
    fn language_table_applies_overrides() {
        let mut language = LanguageConfig::default();
        language
            .messages
            .insert("adapter_not_found".into(), "nobody home".into());
        let table = language.table();
        assert_eq!(
            table.render("adapter_not_found", &Map::new()).as_deref(),
            Some("nobody home")
        );
    }

    #[test]
    fn defaults_validate() {
        assert!(ConduitConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_names_offending_key() {
        let mut config = ConduitConfig::default();
        config.connection.reconnect.multiplier = 0.5;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key: "connection.reconnect.multiplier", .. }
        ));

        let mut config = ConduitConfig::default();
        config.connection.reconnect.interval_ms = 90_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("below interval_ms 90000"));

        let mut config = ConduitConfig::default();
        config.connection.channel_buffer = 0;
        assert!(config.validate().is_err());
    }
}
