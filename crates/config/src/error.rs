//! Configuration error types

use std::io;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A value is out of range or malformed
    #[error("[{section}] has invalid {field}: {message}")]
    InvalidValue {
        /// Config section (e.g. "engine", "engine.lines.tick")
        section: String,
        field: &'static str,
        message: String,
    },

    /// A per-type override names a record type the binary does not know
    #[error("[engine.lines] configures unknown record type '{name}'")]
    UnknownRecordType { name: String },
}

impl ConfigError {
    /// Create an InvalidValue error
    pub fn invalid_value(
        section: impl Into<String>,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            section: section.into(),
            field,
            message: message.into(),
        }
    }

    /// Create an UnknownRecordType error
    pub fn unknown_record_type(name: impl Into<String>) -> Self {
        Self::UnknownRecordType { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_error() {
        let err = ConfigError::invalid_value("engine", "default_capacity", "must be a power of two");
        let msg = err.to_string();
        assert!(msg.contains("[engine]"));
        assert!(msg.contains("default_capacity"));
        assert!(msg.contains("power of two"));
    }

    #[test]
    fn test_unknown_record_type_error() {
        let err = ConfigError::unknown_record_type("quote");
        assert!(err.to_string().contains("'quote'"));
    }

    #[test]
    fn test_io_error_includes_path() {
        let err = ConfigError::IoError {
            path: "missing.toml".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("missing.toml"));
    }
}
