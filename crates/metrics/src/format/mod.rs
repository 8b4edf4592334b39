//! Metrics output formatters
//!
//! Formats engine snapshots for human-readable or JSON output.

mod human;
mod json;

pub use human::HumanFormatter;
pub use json::JsonFormatter;

use std::time::Duration;

use crate::{EngineRates, EngineSnapshot};

/// Trait for metrics formatters
pub trait MetricsFormatter: Send + Sync {
    /// Format one report
    ///
    /// `rates` is None on the first report, before a baseline exists.
    fn format(
        &self,
        snapshot: &EngineSnapshot,
        rates: Option<&EngineRates>,
        include_lines: bool,
    ) -> String;
}

/// Format count with K/M suffix for readability
pub fn format_count(count: u64) -> String {
    const K: u64 = 1000;
    const M: u64 = 1_000_000;

    if count >= M {
        format!("{:.1}M", count as f64 / M as f64)
    } else if count >= K {
        format!("{:.1}K", count as f64 / K as f64)
    } else {
        count.to_string()
    }
}

/// Format rate per second with K/M suffix
pub fn format_rate(rate: f64) -> String {
    const K: f64 = 1000.0;
    const M: f64 = 1_000_000.0;

    if rate >= M {
        format!("{:.1}M/s", rate / M)
    } else if rate >= K {
        format!("{:.1}K/s", rate / K)
    } else {
        format!("{:.0}/s", rate)
    }
}

/// Format a short duration with the most readable unit
pub fn format_duration(d: Duration) -> String {
    let ns = d.as_nanos();
    if ns >= 1_000_000_000 {
        format!("{:.2}s", d.as_secs_f64())
    } else if ns >= 1_000_000 {
        format!("{:.1}ms", ns as f64 / 1_000_000.0)
    } else if ns >= 1_000 {
        format!("{:.1}us", ns as f64 / 1_000.0)
    } else {
        format!("{}ns", ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(500), "500");
        assert_eq!(format_count(1500), "1.5K");
        assert_eq!(format_count(2_500_000), "2.5M");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(42.0), "42/s");
        assert_eq!(format_rate(1000.0), "1.0K/s");
        assert_eq!(format_rate(1_200_000.0), "1.2M/s");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_nanos(250)), "250ns");
        assert_eq!(format_duration(Duration::from_nanos(1_500)), "1.5us");
        assert_eq!(format_duration(Duration::from_micros(2_500)), "2.5ms");
        assert_eq!(format_duration(Duration::from_millis(1_250)), "1.25s");
    }
}
