//! Configuration errors

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Cannot encode configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// An `ENTANGLD_*` variable could not be parsed
    #[error("Invalid value for {key}: {reason}")]
    Env { key: String, reason: String },

    /// Parsed fine but unusable, e.g. a blank store name
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn env(key: &str, reason: impl ToString) -> Self {
        ConfigError::Env {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_source() {
        let err = ConfigError::env("ENTANGLD_LOG_JSON", "provided string was not `true` or `false`");
        assert_eq!(
            err.to_string(),
            "Invalid value for ENTANGLD_LOG_JSON: provided string was not `true` or `false`"
        );

        let err = ConfigError::Read {
            path: PathBuf::from("/etc/entangld.toml"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.to_string(), "Cannot read /etc/entangld.toml: no such file");
        assert!(std::error::Error::source(&err).is_some());
    }
}
