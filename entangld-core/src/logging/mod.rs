//! Logging setup for applications embedding entangld.
//!
//! The store itself only emits `tracing` events:
//! - `debug` for routing decisions (local vs forwarded)
//! - `trace` for every message sent and received
//! - `warn` for dropped, malformed and orphaned traffic
//!
//! This module installs a `tracing-subscriber` registry to print them.
//! `ENTANGLD_LOG` (EnvFilter syntax) overrides the configured level and directives.

use tracing::Subscriber;
use tracing_subscriber::{
    filter::Directive, fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
    EnvFilter, Layer,
};

mod error;
mod level;

pub use error::LoggingError;
pub use level::LogLevel;

use crate::config::LoggingConfig;

/// Environment variable holding an EnvFilter expression
pub const LOG_ENV: &str = "ENTANGLD_LOG";

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub with_timestamp: bool,
    pub with_target: bool,
    pub json_format: bool,
    /// Extra filter directives, e.g. `entangld_core::store=trace`
    pub directives: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamp: true,
            with_target: true,
            json_format: false,
            directives: Vec::new(),
        }
    }
}

impl LogConfig {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.with_timestamp = enabled;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Build the filter: `ENTANGLD_LOG` if set, else level plus directives
    pub fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
            return Ok(filter);
        }

        let mut filter = EnvFilter::default().add_directive(self.level.to_filter().into());
        for raw in &self.directives {
            let directive: Directive = raw.parse().map_err(|e| LoggingError::BadDirective {
                directive: raw.clone(),
                reason: format!("{}", e),
            })?;
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }

    fn fmt_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let target = self.with_target;
        match (self.json_format, self.with_timestamp) {
            (true, true) => fmt::layer().json().with_target(target).boxed(),
            (true, false) => fmt::layer().json().without_time().with_target(target).boxed(),
            (false, true) => fmt::layer().with_target(target).boxed(),
            (false, false) => fmt::layer().without_time().with_target(target).boxed(),
        }
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level,
            with_timestamp: config.with_timestamp,
            with_target: config.with_target,
            json_format: config.json_format,
            directives: config.directives.clone(),
        }
    }
}

/// Initialize the logging subsystem with default configuration
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize the logging subsystem with custom configuration
///
/// # Example
/// ```
/// use entangld_core::logging::{init_logging_with_config, LogConfig, LogLevel};
///
/// let config = LogConfig::new(LogLevel::Debug)
///     .with_target(false)
///     .directive("entangld_core::core_router=trace");
///
/// init_logging_with_config(config).expect("Failed to initialize logging");
/// ```
pub fn init_logging_with_config(config: LogConfig) -> Result<(), LoggingError> {
    let env_filter = config.env_filter()?;

    tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(env_filter)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}

/// Route logs through the test harness' captured output.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::new(LogLevel::Debug)
            .with_timestamp(false)
            .with_target(false)
            .json_format(true)
            .directive("entangld_core=trace");

        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.with_timestamp);
        assert!(!config.with_target);
        assert!(config.json_format);
        assert_eq!(config.directives, vec!["entangld_core=trace".to_string()]);
    }

    #[test]
    fn test_bad_directive_rejected() {
        if std::env::var(LOG_ENV).is_ok() {
            return;
        }
        let config = LogConfig::default().directive("entangld_core=[[");
        assert!(matches!(
            config.env_filter(),
            Err(LoggingError::BadDirective { .. })
        ));
    }

    #[test]
    fn test_from_logging_config() {
        let mut section = LoggingConfig::default();
        section.level = LogLevel::Trace;
        section.json_format = true;

        let config = LogConfig::from(&section);
        assert_eq!(config.level, LogLevel::Trace);
        assert!(config.json_format);
    }

    #[test]
    fn test_init_test_logging_is_idempotent() {
        init_test_logging();
        init_test_logging();
        tracing::warn!(store = "unit", "logging initialized twice");
    }
}
