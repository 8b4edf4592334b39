//! Tickline - Metrics
//!
//! Explicit, caller-owned instrumentation for the rotation engine.
//!
//! # Overview
//!
//! - [`EngineMetrics`] is created by the caller and handed to the engine at
//!   construction. There is no process-wide state, so two engines (or two
//!   tests) never share counters by accident.
//! - [`LineMetrics`] are registered on the context once per record type.
//! - [`EngineSnapshot`] is a point-in-time copy with `diff`/rate helpers.
//! - [`MetricsReporter`] logs a formatted report on an interval until
//!   cancelled.
//!
//! ```text
//! caller: Arc<EngineMetrics> ──► engine builder (hot path: relaxed adds)
//!              │
//!              └──► MetricsReporter::run(cancel) ──► tracing::info!
//! ```
//!
//! All updates use relaxed atomics: values are eventually consistent and
//! meant for observability, never for synchronisation.

mod engine;
pub mod format;
mod reporter;
mod snapshot;

pub use engine::{EngineMetrics, EngineMetricsProvider, LineMetrics};
pub use format::{HumanFormatter, JsonFormatter, MetricsFormatter};
pub use reporter::MetricsReporter;
pub use snapshot::{EngineRates, EngineSnapshot, LineRates, LineSnapshot};

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter wrapper for convenient metric operations
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    #[inline]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    #[inline]
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc(&self) {
        self.add(1);
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Reset to 0 and return the previous value
    #[inline]
    pub fn take(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// Monotonic maximum, for high-water marks
#[derive(Debug, Default)]
pub struct MaxGauge(AtomicU64);

impl MaxGauge {
    #[inline]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Raise the gauge to `val` if it is higher than the current value
    #[inline]
    pub fn observe(&self, val: u64) {
        self.0.fetch_max(val, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        counter.inc();
        counter.add(4);
        assert_eq!(counter.get(), 5);
        assert_eq!(counter.take(), 5);
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_max_gauge_only_rises() {
        let gauge = MaxGauge::new();
        gauge.observe(10);
        gauge.observe(3);
        assert_eq!(gauge.get(), 10);
        gauge.observe(11);
        assert_eq!(gauge.get(), 11);
    }
}
