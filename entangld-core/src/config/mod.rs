//! Configuration for entangld stores
//!
//! Defaults, `ENTANGLD_*` environment overrides, TOML files and validation.
//!
//! ```toml
//! [store]
//! name = "gateway"
//! orphan_cleanup = true
//! max_pending_requests = 1024
//! slow_request_warning = "5s"
//!
//! [logging]
//! level = "debug"
//! json_format = false
//! with_timestamp = true
//! with_target = true
//! directives = ["entangld_core::store=trace"]
//!
//! [metrics]
//! enabled = true
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

mod error;

pub use error::ConfigError;

use crate::logging::LogLevel;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// Per-store behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Label for log output; the store id is used when unset
    pub name: Option<String>,

    /// Answer events nobody is subscribed to with an `unsubscribe`
    pub orphan_cleanup: bool,

    /// Cap on forwarded gets awaiting an answer, 0 for no cap
    pub max_pending_requests: usize,

    /// Warn once about a forwarded get outstanding this long, 0 to disable.
    /// The request keeps waiting either way.
    #[serde(with = "humantime_serde")]
    pub slow_request_warning: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub json_format: bool,
    pub with_timestamp: bool,
    pub with_target: bool,
    /// Extra EnvFilter directives
    pub directives: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Register metric descriptions at startup
    pub enabled: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: None,
            orphan_cleanup: true,
            max_pending_requests: 0,
            slow_request_warning: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn orphan_cleanup(mut self, enabled: bool) -> Self {
        self.orphan_cleanup = enabled;
        self
    }

    pub fn max_pending_requests(mut self, max: usize) -> Self {
        self.max_pending_requests = max;
        self
    }

    pub fn slow_request_warning(mut self, after: Duration) -> Self {
        self.slow_request_warning = after;
        self
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            json_format: false,
            with_timestamp: true,
            with_target: true,
            directives: Vec::new(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    raw.parse().map_err(|e| ConfigError::env(key, e))
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: ENTANGLD_<SECTION>_<KEY>
    /// Example: ENTANGLD_STORE_SLOW_REQUEST_WARNING=500ms
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values found by `lookup` onto this configuration
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Store config
        if let Some(name) = lookup("ENTANGLD_STORE_NAME") {
            self.store.name = Some(name);
        }
        if let Some(raw) = lookup("ENTANGLD_STORE_ORPHAN_CLEANUP") {
            self.store.orphan_cleanup = parse_flag("ENTANGLD_STORE_ORPHAN_CLEANUP", &raw)?;
        }
        if let Some(raw) = lookup("ENTANGLD_STORE_MAX_PENDING_REQUESTS") {
            self.store.max_pending_requests = raw
                .parse()
                .map_err(|e| ConfigError::env("ENTANGLD_STORE_MAX_PENDING_REQUESTS", e))?;
        }
        if let Some(raw) = lookup("ENTANGLD_STORE_SLOW_REQUEST_WARNING") {
            self.store.slow_request_warning = humantime_serde::re::humantime::parse_duration(&raw)
                .map_err(|e| ConfigError::env("ENTANGLD_STORE_SLOW_REQUEST_WARNING", e))?;
        }

        // Logging config
        if let Some(raw) = lookup("ENTANGLD_LOG_LEVEL") {
            self.logging.level = raw
                .parse()
                .map_err(|e| ConfigError::env("ENTANGLD_LOG_LEVEL", e))?;
        }
        if let Some(raw) = lookup("ENTANGLD_LOG_JSON") {
            self.logging.json_format = parse_flag("ENTANGLD_LOG_JSON", &raw)?;
        }

        // Metrics config
        if let Some(raw) = lookup("ENTANGLD_METRICS_ENABLED") {
            self.metrics.enabled = parse_flag("ENTANGLD_METRICS_ENABLED", &raw)?;
        }

        Ok(())
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.store.name {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "store name must not be blank".to_string(),
                ));
            }
        }

        for directive in &self.logging.directives {
            directive
                .parse::<tracing_subscriber::filter::Directive>()
                .map_err(|e| {
                    ConfigError::Invalid(format!(
                        "Invalid log directive '{}': {}",
                        directive, e
                    ))
                })?;
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;

        std::fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.store.orphan_cleanup);
        assert_eq!(config.store.max_pending_requests, 0);
        assert_eq!(config.store.slow_request_warning, Duration::from_secs(5));
    }

    #[test]
    fn test_env_overlay() {
        let mut config = Config::default();
        config
            .apply_env(lookup(&[
                ("ENTANGLD_STORE_NAME", "gateway"),
                ("ENTANGLD_STORE_ORPHAN_CLEANUP", "false"),
                ("ENTANGLD_STORE_MAX_PENDING_REQUESTS", "64"),
                ("ENTANGLD_STORE_SLOW_REQUEST_WARNING", "250ms"),
                ("ENTANGLD_LOG_LEVEL", "debug"),
                ("ENTANGLD_METRICS_ENABLED", "false"),
            ]))
            .unwrap();

        assert_eq!(config.store.name.as_deref(), Some("gateway"));
        assert!(!config.store.orphan_cleanup);
        assert_eq!(config.store.max_pending_requests, 64);
        assert_eq!(config.store.slow_request_warning, Duration::from_millis(250));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let mut config = Config::default();
        let result = config.apply_env(lookup(&[("ENTANGLD_STORE_ORPHAN_CLEANUP", "maybe")]));
        assert!(matches!(
            result,
            Err(ConfigError::Env { ref key, .. }) if key == "ENTANGLD_STORE_ORPHAN_CLEANUP"
        ));

        let result = config.apply_env(lookup(&[("ENTANGLD_LOG_LEVEL", "loud")]));
        assert!(matches!(
            result,
            Err(ConfigError::Env { ref key, .. }) if key == "ENTANGLD_LOG_LEVEL"
        ));

        let result = config.apply_env(lookup(&[("ENTANGLD_STORE_SLOW_REQUEST_WARNING", "soon")]));
        assert!(matches!(
            result,
            Err(ConfigError::Env { ref key, .. }) if key == "ENTANGLD_STORE_SLOW_REQUEST_WARNING"
        ));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.store.name = Some("  ".to_string());
        assert!(config.validate().is_err());

        config = Config::default();
        config.logging.directives = vec!["entangld_core=[[".to_string()];
        assert!(config.validate().is_err());

        config.logging.directives = vec!["entangld_core::store=trace".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[store]\nslow_request_warning = \"1s\"\n").unwrap();
        assert_eq!(config.store.slow_request_warning, Duration::from_secs(1));
        assert!(config.store.orphan_cleanup);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_store_config_builder() {
        let store = StoreConfig::named("edge")
            .orphan_cleanup(false)
            .max_pending_requests(8)
            .slow_request_warning(Duration::ZERO);
        assert_eq!(store.name.as_deref(), Some("edge"));
        assert!(!store.orphan_cleanup);
        assert_eq!(store.max_pending_requests, 8);
        assert!(store.slow_request_warning.is_zero());
    }
}
