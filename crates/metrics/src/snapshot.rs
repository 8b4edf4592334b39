//! Snapshots and rate calculation
//!
//! A snapshot is a plain copy of every counter. Two snapshots and the time
//! between them give per-second rates for the reporter.

use std::time::Duration;

use serde::Serialize;

/// Point-in-time copy of one line's counters
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LineSnapshot {
    pub name: String,
    pub capacity: u64,
    pub appended: u64,
    pub flushed: u64,
    pub overflowed: u64,
    /// Largest number of records flushed from one generation
    pub high_water: u64,
}

impl LineSnapshot {
    /// Peak fill level as a fraction of capacity (0.0 - 1.0)
    pub fn peak_fill(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.high_water as f64 / self.capacity as f64
        }
    }
}

/// Point-in-time copy of the engine metrics
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EngineSnapshot {
    pub records_appended: u64,
    pub records_dropped: u64,
    pub rejected_full: u64,
    pub rejected_closed: u64,
    pub append_retries: u64,
    pub rotations: u64,
    pub empty_rotations: u64,
    pub rotation_failures: u64,
    pub records_flushed: u64,
    pub drain_wait_ns: u64,
    pub dispatch_ns: u64,
    pub lines: Vec<LineSnapshot>,
}

impl EngineSnapshot {
    /// Records appended but not yet flushed (in the open or closing generation)
    pub fn in_flight(&self) -> u64 {
        self.records_appended.saturating_sub(self.records_flushed)
    }

    /// Average time the flush thread waited for writers to leave a generation
    pub fn avg_drain_wait(&self) -> Option<Duration> {
        (self.rotations > 0).then(|| Duration::from_nanos(self.drain_wait_ns / self.rotations))
    }

    /// Average time spent dispatching a generation to consumers
    pub fn avg_dispatch(&self) -> Option<Duration> {
        (self.rotations > 0).then(|| Duration::from_nanos(self.dispatch_ns / self.rotations))
    }

    /// Difference from an earlier snapshot
    ///
    /// Lines are matched by name; lines missing from `previous` are kept
    /// as-is.
    pub fn diff(&self, previous: &EngineSnapshot) -> EngineSnapshot {
        EngineSnapshot {
            records_appended: self.records_appended.saturating_sub(previous.records_appended),
            records_dropped: self.records_dropped.saturating_sub(previous.records_dropped),
            rejected_full: self.rejected_full.saturating_sub(previous.rejected_full),
            rejected_closed: self.rejected_closed.saturating_sub(previous.rejected_closed),
            append_retries: self.append_retries.saturating_sub(previous.append_retries),
            rotations: self.rotations.saturating_sub(previous.rotations),
            empty_rotations: self.empty_rotations.saturating_sub(previous.empty_rotations),
            rotation_failures: self
                .rotation_failures
                .saturating_sub(previous.rotation_failures),
            records_flushed: self.records_flushed.saturating_sub(previous.records_flushed),
            drain_wait_ns: self.drain_wait_ns.saturating_sub(previous.drain_wait_ns),
            dispatch_ns: self.dispatch_ns.saturating_sub(previous.dispatch_ns),
            lines: self
                .lines
                .iter()
                .map(|line| match previous.lines.iter().find(|p| p.name == line.name) {
                    Some(prev) => LineSnapshot {
                        name: line.name.clone(),
                        capacity: line.capacity,
                        appended: line.appended.saturating_sub(prev.appended),
                        flushed: line.flushed.saturating_sub(prev.flushed),
                        overflowed: line.overflowed.saturating_sub(prev.overflowed),
                        high_water: line.high_water,
                    },
                    None => line.clone(),
                })
                .collect(),
        }
    }

    /// Per-second rates relative to an earlier snapshot
    ///
    /// Returns None if no time has elapsed.
    pub fn rates(&self, previous: &EngineSnapshot, elapsed: Duration) -> Option<EngineRates> {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return None;
        }

        let delta = self.diff(previous);
        Some(EngineRates {
            appended_per_sec: delta.records_appended as f64 / secs,
            flushed_per_sec: delta.records_flushed as f64 / secs,
            rotations_per_sec: delta.rotations as f64 / secs,
            dropped: delta.records_dropped,
            rejected: delta.rejected_full + delta.rejected_closed,
            retries: delta.append_retries,
            failures: delta.rotation_failures,
            avg_drain_wait: delta.avg_drain_wait().unwrap_or_default(),
            avg_dispatch: delta.avg_dispatch().unwrap_or_default(),
            lines: delta
                .lines
                .iter()
                .map(|line| LineRates {
                    name: line.name.clone(),
                    appended_per_sec: line.appended as f64 / secs,
                    overflowed: line.overflowed,
                    peak_fill: line.peak_fill(),
                })
                .collect(),
        })
    }
}

/// Per-line rates over a reporting interval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineRates {
    pub name: String,
    pub appended_per_sec: f64,
    pub overflowed: u64,
    pub peak_fill: f64,
}

/// Engine rates over a reporting interval
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRates {
    pub appended_per_sec: f64,
    pub flushed_per_sec: f64,
    pub rotations_per_sec: f64,
    pub dropped: u64,
    pub rejected: u64,
    pub retries: u64,
    pub failures: u64,
    pub avg_drain_wait: Duration,
    pub avg_dispatch: Duration,
    pub lines: Vec<LineRates>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, appended: u64, flushed: u64) -> LineSnapshot {
        LineSnapshot {
            name: name.into(),
            capacity: 128,
            appended,
            flushed,
            overflowed: 0,
            high_water: 32,
        }
    }

    #[test]
    fn test_in_flight() {
        let snapshot = EngineSnapshot {
            records_appended: 100,
            records_flushed: 90,
            ..Default::default()
        };
        assert_eq!(snapshot.in_flight(), 10);
    }

    #[test]
    fn test_averages_empty() {
        let snapshot = EngineSnapshot::default();
        assert_eq!(snapshot.avg_drain_wait(), None);
        assert_eq!(snapshot.avg_dispatch(), None);
    }

    #[test]
    fn test_diff() {
        let prev = EngineSnapshot {
            records_appended: 100,
            rotations: 5,
            lines: vec![line("tick", 60, 50)],
            ..Default::default()
        };
        let current = EngineSnapshot {
            records_appended: 250,
            rotations: 8,
            lines: vec![line("tick", 160, 150), line("quote", 5, 0)],
            ..Default::default()
        };

        let diff = current.diff(&prev);
        assert_eq!(diff.records_appended, 150);
        assert_eq!(diff.rotations, 3);
        assert_eq!(diff.lines[0].appended, 100);
        assert_eq!(diff.lines[0].flushed, 100);
        assert_eq!(diff.lines[1], line("quote", 5, 0));
    }

    #[test]
    fn test_diff_saturating() {
        let prev = EngineSnapshot {
            records_appended: 100,
            ..Default::default()
        };
        let current = EngineSnapshot {
            records_appended: 10,
            ..Default::default()
        };
        assert_eq!(current.diff(&prev).records_appended, 0);
    }

    #[test]
    fn test_rates() {
        let prev = EngineSnapshot::default();
        let current = EngineSnapshot {
            records_appended: 2000,
            records_flushed: 1000,
            rotations: 4,
            drain_wait_ns: 400,
            lines: vec![line("tick", 2000, 1000)],
            ..Default::default()
        };

        let rates = current.rates(&prev, Duration::from_secs(2)).unwrap();
        assert_eq!(rates.appended_per_sec, 1000.0);
        assert_eq!(rates.flushed_per_sec, 500.0);
        assert_eq!(rates.rotations_per_sec, 2.0);
        assert_eq!(rates.avg_drain_wait, Duration::from_nanos(100));
        assert_eq!(rates.lines[0].peak_fill, 0.25);
    }

    #[test]
    fn test_rates_zero_elapsed() {
        let snapshot = EngineSnapshot::default();
        assert!(snapshot.rates(&snapshot, Duration::ZERO).is_none());
    }
}
