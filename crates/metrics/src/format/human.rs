//! Human-readable metrics formatter
//!
//! # Example Output
//!
//! ```text
//! [metrics] engine: in 1.2M/s | out 1.2M/s | rotations 850/s | wait 140ns | dispatch 3.2us
//! [metrics] lines: order_book (610.0K/s, peak 12%) | basic_data (590.0K/s, peak 11%, 4 full)
//! ```

use std::fmt::Write;

use super::{MetricsFormatter, format_count, format_duration, format_rate};
use crate::{EngineRates, EngineSnapshot};

/// Human-readable metrics formatter
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter;

impl HumanFormatter {
    pub fn new() -> Self {
        Self
    }

    fn format_engine(&self, rates: &EngineRates) -> String {
        let mut output = format!(
            "[metrics] engine: in {} | out {} | rotations {:.0}/s | wait {} | dispatch {}",
            format_rate(rates.appended_per_sec),
            format_rate(rates.flushed_per_sec),
            rates.rotations_per_sec,
            format_duration(rates.avg_drain_wait),
            format_duration(rates.avg_dispatch),
        );

        if rates.dropped > 0 {
            let _ = write!(output, " | dropped {}", format_count(rates.dropped));
        }
        if rates.rejected > 0 {
            let _ = write!(output, " | rejected {}", format_count(rates.rejected));
        }
        if rates.failures > 0 {
            let _ = write!(output, " | FAILED rotations {}", rates.failures);
        }

        output
    }

    fn format_lines(&self, rates: &EngineRates) -> Option<String> {
        if rates.lines.is_empty() {
            return None;
        }

        let mut output = String::from("[metrics] lines:");

        for (i, line) in rates.lines.iter().enumerate() {
            if i > 0 {
                output.push_str(" |");
            }

            let _ = write!(
                output,
                " {} ({}, peak {:.0}%",
                line.name,
                format_rate(line.appended_per_sec),
                line.peak_fill * 100.0,
            );

            if line.overflowed > 0 {
                let _ = write!(output, ", {} full", line.overflowed);
            }

            output.push(')');
        }

        Some(output)
    }
}

impl MetricsFormatter for HumanFormatter {
    fn format(
        &self,
        snapshot: &EngineSnapshot,
        rates: Option<&EngineRates>,
        include_lines: bool,
    ) -> String {
        let Some(rates) = rates else {
            return format!(
                "[metrics] engine: collecting baseline (appended {}, flushed {})",
                format_count(snapshot.records_appended),
                format_count(snapshot.records_flushed),
            );
        };

        let mut lines = vec![self.format_engine(rates)];
        if include_lines && let Some(line_output) = self.format_lines(rates) {
            lines.push(line_output);
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LineRates;
    use std::time::Duration;

    fn rates() -> EngineRates {
        EngineRates {
            appended_per_sec: 1_200_000.0,
            flushed_per_sec: 1_100_000.0,
            rotations_per_sec: 850.0,
            dropped: 0,
            rejected: 3,
            retries: 0,
            failures: 0,
            avg_drain_wait: Duration::from_nanos(140),
            avg_dispatch: Duration::from_micros(3),
            lines: vec![LineRates {
                name: "order_book".into(),
                appended_per_sec: 610_000.0,
                overflowed: 4,
                peak_fill: 0.12,
            }],
        }
    }

    #[test]
    fn test_baseline_output() {
        let snapshot = EngineSnapshot {
            records_appended: 1500,
            ..Default::default()
        };
        let output = HumanFormatter::new().format(&snapshot, None, true);
        assert!(output.contains("collecting baseline"));
        assert!(output.contains("1.5K"));
    }

    #[test]
    fn test_engine_line() {
        let output = HumanFormatter::new().format(&EngineSnapshot::default(), Some(&rates()), false);
        assert!(output.contains("in 1.2M/s"));
        assert!(output.contains("out 1.1M/s"));
        assert!(output.contains("wait 140ns"));
        assert!(output.contains("rejected 3"));
        assert!(!output.contains("dropped"));
        assert!(!output.contains("lines:"));
    }

    #[test]
    fn test_includes_lines() {
        let output = HumanFormatter::new().format(&EngineSnapshot::default(), Some(&rates()), true);
        assert!(output.contains("order_book (610.0K/s, peak 12%, 4 full)"));
        assert_eq!(output.lines().count(), 2);
    }
}
