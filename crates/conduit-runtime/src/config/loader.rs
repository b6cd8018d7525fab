//! Layered configuration loading.
//!
//! # Load Order
//!
//! 1. Default values
//! 2. Global config (`~/.conduit/config.toml`)
//! 3. Project config (`<project>/.conduit/config.toml`)
//! 4. Environment variables (`CONDUIT_*`)
//!
//! Each layer overrides the previous.

use super::{
    default_config_path, ConduitConfig, ConfigError, ReconnectStrategy, PROJECT_CONFIG_DIR,
    PROJECT_CONFIG_FILE,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Environment variables read by [`ConfigLoader`].
pub mod env {
    /// `debug`
    pub const DEBUG: &str = "CONDUIT_DEBUG";
    /// `connection.request_timeout_ms`
    pub const REQUEST_TIMEOUT_MS: &str = "CONDUIT_REQUEST_TIMEOUT_MS";
    /// `connection.handler_timeout_ms`
    pub const HANDLER_TIMEOUT_MS: &str = "CONDUIT_HANDLER_TIMEOUT_MS";
    /// `connection.reconnect.interval_ms`
    pub const RECONNECT_INTERVAL_MS: &str = "CONDUIT_RECONNECT_INTERVAL_MS";
    /// `connection.reconnect.strategy`
    pub const RECONNECT_STRATEGY: &str = "CONDUIT_RECONNECT_STRATEGY";
    /// `plugins.force`
    pub const FORCE_PLUGINS: &str = "CONDUIT_FORCE_PLUGINS";
    /// `language.locale`
    pub const LOCALE: &str = "CONDUIT_LOCALE";
}

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```no_run
/// use conduit_runtime::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_project_root("/path/to/project")
///     .skip_env_vars()
///     .load()?;
/// # Ok::<(), conduit_runtime::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    global_config_path: Option<PathBuf>,
    project_root: Option<PathBuf>,
    /// Replaces the process environment when set.
    env_override: Option<BTreeMap<String, String>>,
    skip_env: bool,
    skip_global: bool,
    skip_project: bool,
}

impl ConfigLoader {
    /// Loader reading every layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom global config path.
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Sets the project root. The project file is
    /// `<root>/.conduit/config.toml`.
    #[must_use]
    pub fn with_project_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_root = Some(path.into());
        self
    }

    /// Reads variables from `vars` instead of the process environment.
    #[must_use]
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_override = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Skips environment variables.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Skips the global file.
    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    /// Skips the project file.
    #[must_use]
    pub fn skip_project_config(mut self) -> Self {
        self.skip_project = true;
        self
    }

    /// Loads and merges every enabled layer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a config file exists but cannot be read
    /// or parsed, if an environment variable has an invalid value, or if
    /// the merged result fails [`ConduitConfig::validate`]. Missing files
    /// are skipped.
    pub fn load(&self) -> Result<ConduitConfig, ConfigError> {
        let mut config = ConduitConfig::default();

        if !self.skip_global {
            let path = self
                .global_config_path
                .clone()
                .unwrap_or_else(default_config_path);
            if let Some(global) = load_file(&path)? {
                debug!(path = %path.display(), "loaded global config");
                config.merge(&global);
            }
        }

        if !self.skip_project {
            if let Some(root) = &self.project_root {
                let path = root.join(PROJECT_CONFIG_DIR).join(PROJECT_CONFIG_FILE);
                if let Some(project) = load_file(&path)? {
                    debug!(path = %path.display(), "loaded project config");
                    config.merge(&project);
                }
            }
        }

        if !self.skip_env {
            self.apply_env_vars(&mut config)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn var(&self, name: &str) -> Option<String> {
        match &self.env_override {
            Some(vars) => vars.get(name).cloned(),
            None => std::env::var(name).ok(),
        }
    }

    fn apply_env_vars(&self, config: &mut ConduitConfig) -> Result<(), ConfigError> {
        if let Some(v) = self.parsed(env::DEBUG, parse_bool, "expected bool")? {
            config.debug = v;
        }
        if let Some(v) = self.parsed(env::FORCE_PLUGINS, parse_bool, "expected bool")? {
            config.plugins.force = v;
        }
        if let Some(v) = self.parsed(env::REQUEST_TIMEOUT_MS, parse_millis, "expected milliseconds")? {
            config.connection.request_timeout_ms = v;
        }
        if let Some(v) = self.parsed(env::HANDLER_TIMEOUT_MS, parse_millis, "expected milliseconds")? {
            config.connection.handler_timeout_ms = v;
        }
        if let Some(v) = self.parsed(env::RECONNECT_INTERVAL_MS, parse_millis, "expected milliseconds")? {
            config.connection.reconnect.interval_ms = v;
        }
        if let Some(raw) = self.var(env::RECONNECT_STRATEGY) {
            config.connection.reconnect.strategy = ReconnectStrategy::from_str(&raw)
                .map_err(|message| ConfigError::invalid_env_var(env::RECONNECT_STRATEGY, message))?;
        }
        if let Some(locale) = self.var(env::LOCALE) {
            let locale = locale.trim();
            if locale.is_empty() {
                return Err(ConfigError::invalid_env_var(env::LOCALE, "empty locale"));
            }
            config.language.locale = locale.to_string();
        }
        Ok(())
    }

    fn parsed<T>(
        &self,
        name: &str,
        parse: fn(&str) -> Option<T>,
        expected: &str,
    ) -> Result<Option<T>, ConfigError> {
        match self.var(name) {
            None => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| ConfigError::invalid_env_var(name, expected)),
        }
    }
}

/// Reads a config file; `None` if it does not exist.
fn load_file(path: &Path) -> Result<Option<ConduitConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    let config = ConduitConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;
    Ok(Some(config))
}

/// Accepts "true", "false", "1", "0", "yes", "no", "on", "off"
/// (case-insensitive).
fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_millis(s: &str) -> Option<u64> {
    s.trim().parse().ok().filter(|ms| *ms > 0)
}
