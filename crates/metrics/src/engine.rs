//! Engine and per-line metrics
//!
//! Counters updated by the rotation engine. Writers touch only the append
//! counters; everything else is updated from the flush thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

use crate::snapshot::{EngineSnapshot, LineSnapshot};
use crate::{Counter, MaxGauge};

/// Trait for anything that can produce an engine snapshot
///
/// The reporter holds an `Arc<dyn EngineMetricsProvider>` so it stays
/// valid independently of the engine's lifetime.
pub trait EngineMetricsProvider: Send + Sync {
    fn snapshot(&self) -> EngineSnapshot;
}

/// Counters for one record type's line
#[derive(Debug)]
pub struct LineMetrics {
    name: String,
    /// Current line capacity; follows the latest registration
    capacity: AtomicU64,
    appended: Counter,
    flushed: Counter,
    overflowed: Counter,
    high_water: MaxGauge,
}

impl LineMetrics {
    fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity: AtomicU64::new(capacity as u64),
            appended: Counter::new(),
            flushed: Counter::new(),
            overflowed: Counter::new(),
            high_water: MaxGauge::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed) as usize
    }

    fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_appended(&self) {
        self.appended.inc();
    }

    /// Record a full line (rejected or dropped, depending on policy)
    #[inline]
    pub fn record_overflow(&self) {
        self.overflowed.inc();
    }

    /// Record one generation's worth of records handed to the consumer
    #[inline]
    pub fn record_flushed(&self, records: usize) {
        self.flushed.add(records as u64);
        self.high_water.observe(records as u64);
    }

    pub fn snapshot(&self) -> LineSnapshot {
        LineSnapshot {
            name: self.name.clone(),
            capacity: self.capacity.load(Ordering::Relaxed),
            appended: self.appended.get(),
            flushed: self.flushed.get(),
            overflowed: self.overflowed.get(),
            high_water: self.high_water.get(),
        }
    }
}

/// Engine-wide metrics context
///
/// # Thread Safety
///
/// All record methods are safe to call from any thread. The line registry
/// is behind a lock that is only taken at registration and snapshot time.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    records_appended: Counter,
    records_dropped: Counter,
    rejected_full: Counter,
    rejected_closed: Counter,
    append_retries: Counter,

    rotations: Counter,
    empty_rotations: Counter,
    rotation_failures: Counter,
    records_flushed: Counter,
    drain_wait_ns: Counter,
    dispatch_ns: Counter,

    lines: RwLock<Vec<Arc<LineMetrics>>>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or fetch) the counters for a record type
    ///
    /// Registering the same name twice returns the existing counters, so a
    /// metrics context can outlive and be reused by successive engines. The
    /// reported capacity is updated to the latest registration.
    pub fn register_line(&self, name: &str, capacity: usize) -> Arc<LineMetrics> {
        if let Some(existing) = self.lines.read().iter().find(|l| l.name == name) {
            existing.set_capacity(capacity);
            return Arc::clone(existing);
        }

        let mut lines = self.lines.write();
        if let Some(existing) = lines.iter().find(|l| l.name == name) {
            existing.set_capacity(capacity);
            return Arc::clone(existing);
        }
        let line = Arc::new(LineMetrics::new(name, capacity));
        lines.push(Arc::clone(&line));
        line
    }

    /// Counters for a previously registered record type
    pub fn line(&self, name: &str) -> Option<Arc<LineMetrics>> {
        self.lines.read().iter().find(|l| l.name == name).cloned()
    }

    // Writer side

    #[inline]
    pub fn record_appended(&self) {
        self.records_appended.inc();
    }

    /// A record was discarded under the drop overflow policy
    #[inline]
    pub fn record_dropped(&self) {
        self.records_dropped.inc();
    }

    /// A record was handed back because its line was full
    #[inline]
    pub fn record_rejected_full(&self) {
        self.rejected_full.inc();
    }

    /// A record was handed back because the engine was closed
    #[inline]
    pub fn record_rejected_closed(&self) {
        self.rejected_closed.inc();
    }

    /// A writer observed a concurrent rotation and retried
    #[inline]
    pub fn record_append_retry(&self) {
        self.append_retries.inc();
    }

    // Flush side

    /// Record a completed rotation
    pub fn record_rotation(&self, records: usize, drain_wait: Duration, dispatch: Duration) {
        self.rotations.inc();
        if records == 0 {
            self.empty_rotations.inc();
        }
        self.records_flushed.add(records as u64);
        self.drain_wait_ns.add(drain_wait.as_nanos() as u64);
        self.dispatch_ns.add(dispatch.as_nanos() as u64);
    }

    #[inline]
    pub fn record_rotation_failure(&self) {
        self.rotation_failures.inc();
    }

    // Accessors

    #[inline]
    pub fn records_appended(&self) -> u64 {
        self.records_appended.get()
    }

    #[inline]
    pub fn records_flushed(&self) -> u64 {
        self.records_flushed.get()
    }

    #[inline]
    pub fn records_dropped(&self) -> u64 {
        self.records_dropped.get()
    }

    #[inline]
    pub fn rotations(&self) -> u64 {
        self.rotations.get()
    }

    #[inline]
    pub fn append_retries(&self) -> u64 {
        self.append_retries.get()
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            records_appended: self.records_appended.get(),
            records_dropped: self.records_dropped.get(),
            rejected_full: self.rejected_full.get(),
            rejected_closed: self.rejected_closed.get(),
            append_retries: self.append_retries.get(),
            rotations: self.rotations.get(),
            empty_rotations: self.empty_rotations.get(),
            rotation_failures: self.rotation_failures.get(),
            records_flushed: self.records_flushed.get(),
            drain_wait_ns: self.drain_wait_ns.get(),
            dispatch_ns: self.dispatch_ns.get(),
            lines: self.lines.read().iter().map(|l| l.snapshot()).collect(),
        }
    }
}

impl EngineMetricsProvider for EngineMetrics {
    fn snapshot(&self) -> EngineSnapshot {
        EngineMetrics::snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_zero() {
        let metrics = EngineMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_appended, 0);
        assert_eq!(snapshot.rotations, 0);
        assert!(snapshot.lines.is_empty());
    }

    #[test]
    fn test_register_line_is_idempotent() {
        let metrics = EngineMetrics::new();
        let a = metrics.register_line("tick", 64);
        let b = metrics.register_line("tick", 64);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(metrics.snapshot().lines.len(), 1);
    }

    #[test]
    fn test_reregister_updates_capacity() {
        let metrics = EngineMetrics::new();
        let first = metrics.register_line("tick", 64);
        first.record_appended();

        let second = metrics.register_line("tick", 256);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.capacity(), 256);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.lines[0].capacity, 256);
        assert_eq!(snapshot.lines[0].appended, 1);
    }

    #[test]
    fn test_line_lookup() {
        let metrics = EngineMetrics::new();
        metrics.register_line("tick", 64);
        assert!(metrics.line("tick").is_some());
        assert!(metrics.line("quote").is_none());
    }

    #[test]
    fn test_record_rotation() {
        let metrics = EngineMetrics::new();
        metrics.record_rotation(10, Duration::from_nanos(500), Duration::from_micros(2));
        metrics.record_rotation(0, Duration::ZERO, Duration::ZERO);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rotations, 2);
        assert_eq!(snapshot.empty_rotations, 1);
        assert_eq!(snapshot.records_flushed, 10);
        assert_eq!(snapshot.drain_wait_ns, 500);
        assert_eq!(snapshot.dispatch_ns, 2000);
    }

    #[test]
    fn test_line_high_water() {
        let metrics = EngineMetrics::new();
        let line = metrics.register_line("tick", 64);
        line.record_flushed(7);
        line.record_flushed(3);

        let snapshot = line.snapshot();
        assert_eq!(snapshot.flushed, 10);
        assert_eq!(snapshot.high_water, 7);
        assert_eq!(snapshot.capacity, 64);
    }

    #[test]
    fn test_concurrent_appends() {
        use std::thread;

        let metrics = Arc::new(EngineMetrics::new());
        let line = metrics.register_line("tick", 1024);
        let mut handles = vec![];

        for _ in 0..4 {
            let m = Arc::clone(&metrics);
            let l = Arc::clone(&line);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    m.record_appended();
                    l.record_appended();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_appended, 4000);
        assert_eq!(snapshot.lines[0].appended, 4000);
    }
}
