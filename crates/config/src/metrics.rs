//! Metrics reporting configuration
//!
//! Controls the periodic engine metrics report.

use serde::Deserialize;
use std::time::Duration;

/// Metrics output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetricsFormat {
    /// Compact single-line summary (default)
    #[default]
    Human,
    /// JSON object per report
    Json,
}

/// Metrics configuration
///
/// ```toml
/// [metrics]
/// enabled = true
/// interval = "10s"
/// format = "human"
/// include_lines = true
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable periodic reporting
    /// Default: true
    pub enabled: bool,

    /// Reporting interval
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Output format (human, json)
    /// Default: human
    pub format: MetricsFormat,

    /// Include per-record-type line counters in each report
    /// Default: true
    pub include_lines: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(10),
            format: MetricsFormat::Human,
            include_lines: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.format, MetricsFormat::Human);
        assert!(config.include_lines);
    }

    #[test]
    fn test_deserialize_empty() {
        let config: MetricsConfig = toml::from_str("").unwrap();
        assert_eq!(config, MetricsConfig::default());
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
enabled = false
interval = "250ms"
format = "json"
include_lines = false
"#;
        let config: MetricsConfig = toml::from_str(toml).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.interval, Duration::from_millis(250));
        assert_eq!(config.format, MetricsFormat::Json);
        assert!(!config.include_lines);
    }

    #[test]
    fn test_deserialize_interval_variants() {
        for (s, expected) in [
            ("100ms", Duration::from_millis(100)),
            ("1s", Duration::from_secs(1)),
            ("2m", Duration::from_secs(120)),
        ] {
            let toml = format!("interval = \"{}\"", s);
            let config: MetricsConfig = toml::from_str(&toml).unwrap();
            assert_eq!(config.interval, expected, "Failed for {}", s);
        }
    }
}
