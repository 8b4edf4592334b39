//! Periodic metrics reporter
//!
//! Samples an [`EngineMetricsProvider`] on a fixed interval and logs the
//! formatted report through `tracing`. Runs as a tokio task until its
//! cancellation token fires, then logs one final cumulative report.

use std::sync::Arc;
use std::time::Instant;

use tickline_config::{MetricsConfig, MetricsFormat};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::format::{HumanFormatter, JsonFormatter, MetricsFormatter};
use crate::{EngineMetricsProvider, EngineSnapshot};

/// Periodic engine metrics reporter
pub struct MetricsReporter {
    config: MetricsConfig,
    formatter: Box<dyn MetricsFormatter>,
    provider: Arc<dyn EngineMetricsProvider>,
    previous: Option<(Instant, EngineSnapshot)>,
}

impl MetricsReporter {
    pub fn new(config: MetricsConfig, provider: Arc<dyn EngineMetricsProvider>) -> Self {
        let formatter: Box<dyn MetricsFormatter> = match config.format {
            MetricsFormat::Human => Box::new(HumanFormatter::new()),
            MetricsFormat::Json => Box::new(JsonFormatter::new()),
        };

        Self {
            config,
            formatter,
            provider,
            previous: None,
        }
    }

    /// Run the reporter until cancellation
    ///
    /// Spawn this as a tokio task.
    pub async fn run(mut self, cancel: CancellationToken) {
        if !self.config.enabled {
            info!("metrics reporting disabled");
            return;
        }

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            format = ?self.config.format,
            "metrics reporter started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {
                    self.report();
                }
            }
        }

        let last = self.provider.snapshot();
        info!(
            records_appended = last.records_appended,
            records_flushed = last.records_flushed,
            records_dropped = last.records_dropped,
            rotations = last.rotations,
            rotation_failures = last.rotation_failures,
            "metrics reporter shutting down"
        );
    }

    /// Sample and log once, returning the formatted report
    pub fn report(&mut self) -> String {
        let now = Instant::now();
        let snapshot = self.provider.snapshot();

        let rates = self
            .previous
            .as_ref()
            .and_then(|(at, prev)| snapshot.rates(prev, now.duration_since(*at)));

        let output = self
            .formatter
            .format(&snapshot, rates.as_ref(), self.config.include_lines);

        for line in output.lines() {
            info!("{}", line);
        }

        self.previous = Some((now, snapshot));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineMetrics;
    use std::time::Duration;

    fn provider() -> Arc<EngineMetrics> {
        let metrics = Arc::new(EngineMetrics::new());
        metrics.register_line("tick", 64);
        metrics
    }

    #[test]
    fn test_first_report_is_baseline() {
        let metrics = provider();
        metrics.record_appended();

        let mut reporter = MetricsReporter::new(MetricsConfig::default(), metrics);
        let output = reporter.report();
        assert!(output.contains("collecting baseline"));
    }

    #[test]
    fn test_second_report_has_rates() {
        let metrics = provider();
        let mut reporter = MetricsReporter::new(MetricsConfig::default(), metrics.clone());
        reporter.report();

        std::thread::sleep(Duration::from_millis(5));
        for _ in 0..100 {
            metrics.record_appended();
        }
        metrics.record_rotation(100, Duration::from_nanos(10), Duration::from_nanos(10));

        let output = reporter.report();
        assert!(output.contains("engine: in"));
        assert!(output.contains("tick"));
    }

    #[test]
    fn test_json_format_selected() {
        let config = MetricsConfig {
            format: MetricsFormat::Json,
            ..Default::default()
        };
        let mut reporter = MetricsReporter::new(config, provider());
        let output = reporter.report();
        assert!(output.starts_with('{'));
    }

    #[tokio::test]
    async fn test_run_disabled() {
        let config = MetricsConfig {
            enabled: false,
            ..Default::default()
        };

        let reporter = MetricsReporter::new(config, provider());

        // Returns immediately without waiting on the token
        reporter.run(CancellationToken::new()).await;
    }

    #[tokio::test]
    async fn test_run_cancellation() {
        let config = MetricsConfig {
            interval: Duration::from_millis(20),
            ..Default::default()
        };

        let reporter = MetricsReporter::new(config, provider());
        let cancel = CancellationToken::new();

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_clone.cancel();
        });

        reporter.run(cancel).await;
    }
}
