//! Rate-limited overflow logging
//!
//! Under the drop policy a full line discards records on the append path.
//! Logging each discard would flood the logs exactly when the system is
//! already overloaded, so drops are aggregated and summarized at most once
//! per second.
//!
//! # Thresholds
//!
//! - >0 drops/sec: WARN level
//! - >1000 drops/sec: ERROR level (consumers cannot keep up)

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Log interval in milliseconds
const LOG_INTERVAL_MS: u64 = 1000;
/// Drops per interval that escalate the summary to ERROR
const CRITICAL_DROP_THRESHOLD: u64 = 1000;

/// Aggregates dropped records and logs a summary per interval
pub(crate) struct OverflowTracker {
    interval_drops: AtomicU64,
    /// Last log time (epoch milliseconds)
    last_log_ms: AtomicU64,
}

impl OverflowTracker {
    pub(crate) fn new() -> Self {
        Self::starting_at(now_ms())
    }

    fn starting_at(now_ms: u64) -> Self {
        Self {
            interval_drops: AtomicU64::new(0),
            last_log_ms: AtomicU64::new(now_ms),
        }
    }

    /// Record one dropped record; returns true if a summary was logged
    pub(crate) fn record_drop(&self, record_type: &'static str) -> bool {
        self.interval_drops.fetch_add(1, Ordering::Relaxed);
        self.maybe_log(record_type, now_ms())
    }

    fn maybe_log(&self, record_type: &'static str, now: u64) -> bool {
        let last = self.last_log_ms.load(Ordering::Relaxed);
        if now.saturating_sub(last) < LOG_INTERVAL_MS {
            return false;
        }

        // Only one concurrent caller gets to log
        if self
            .last_log_ms
            .compare_exchange(last, now, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }

        let drops = self.interval_drops.swap(0, Ordering::Relaxed);
        if drops == 0 {
            return false;
        }

        if drops > CRITICAL_DROP_THRESHOLD {
            tracing::error!(
                dropped_records = drops,
                last_record_type = record_type,
                threshold = CRITICAL_DROP_THRESHOLD,
                "CRITICAL: lines overflowing - consumers cannot keep up"
            );
        } else {
            tracing::warn!(
                dropped_records = drops,
                last_record_type = record_type,
                "line full: records dropped in last second"
            );
        }

        true
    }

    #[cfg(test)]
    fn current_drops(&self) -> u64 {
        self.interval_drops.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for OverflowTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverflowTracker")
            .field("interval_drops", &self.interval_drops.load(Ordering::Relaxed))
            .finish()
    }
}

#[inline]
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
