//! Tickline Configuration
//!
//! TOML-based configuration loading with sensible defaults. An empty file
//! is a valid configuration; only specify what you need to change.
//!
//! # Parsing
//!
//! ```
//! use tickline_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[engine]\ndefault_capacity = 1024").unwrap();
//! assert_eq!(config.engine.default_capacity, 1024);
//! ```
//!
//! # Example
//!
//! ```toml
//! [engine]
//! default_capacity = 4096
//! overflow = "reject"
//! flush_workers = 2
//!
//! [engine.lines.order_book]
//! capacity = 16384
//!
//! [log]
//! level = "debug"
//!
//! [metrics]
//! interval = "5s"
//! ```

mod engine;
mod error;
mod logging;
mod metrics;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use engine::{
    DEFAULT_LINE_CAPACITY, EngineConfig, LineConfig, MAX_FLUSH_WORKERS, OverflowPolicy,
    WaitStrategy,
};
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use metrics::{MetricsConfig, MetricsFormat};
pub use validation::validate_capacity;

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Rotation engine settings
    pub engine: EngineConfig,

    /// Logging configuration
    pub log: LogConfig,

    /// Metrics reporting configuration
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, is not valid TOML or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Reject `[engine.lines.*]` entries that name no known record type
    ///
    /// The set of record types is fixed by whoever builds the engine, so
    /// this check runs after parsing, once that set is known.
    pub fn check_record_types(&self, known: &[&str]) -> Result<()> {
        for name in self.engine.lines.keys() {
            if !known.contains(&name.as_str()) {
                return Err(ConfigError::unknown_record_type(name));
            }
        }
        Ok(())
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
