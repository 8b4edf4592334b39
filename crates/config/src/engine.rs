//! Engine configuration
//!
//! Tunables for the generation-rotation engine: line capacities, overflow
//! handling, the drain-barrier wait strategy, rotation pacing and flush
//! fan-out.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// Default line capacity (records per type per generation)
pub const DEFAULT_LINE_CAPACITY: usize = 4096;

/// Upper bound on flush worker threads
pub const MAX_FLUSH_WORKERS: usize = 1024;

/// What `append` does when the target line is at capacity
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Hand the record back to the caller so it can retry after the next rotation
    #[default]
    Reject,
    /// Drop the record, count it and emit a rate-limited warning
    Drop,
}

impl OverflowPolicy {
    /// Name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Drop => "drop",
        }
    }
}

/// How the rotation thread waits for in-flight writers to leave a generation
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WaitStrategy {
    /// Pure busy spin with a CPU relax hint
    Spin,
    /// Yield the processor on every iteration (default)
    #[default]
    Yield,
    /// Spin with exponential backoff, then yield
    Backoff,
}

impl WaitStrategy {
    /// Name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spin => "spin",
            Self::Yield => "yield",
            Self::Backoff => "backoff",
        }
    }
}

/// Per-record-type line settings
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct LineConfig {
    /// Slots per generation, must be a power of two
    pub capacity: usize,
}

/// Engine configuration
///
/// # Example
///
/// ```toml
/// [engine]
/// default_capacity = 4096
/// overflow = "reject"
/// wait_strategy = "yield"
/// min_rotation_interval = "100us"
/// flush_workers = 0
///
/// [engine.lines.tick]
/// capacity = 8192
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity for record types without an entry in `lines`
    /// Default: 4096
    pub default_capacity: usize,

    /// Behaviour when a line is full
    /// Default: reject
    pub overflow: OverflowPolicy,

    /// Drain-barrier wait strategy
    /// Default: yield
    pub wait_strategy: WaitStrategy,

    /// Minimum time between rotations started by the flush driver.
    /// Zero rotates continuously.
    /// Default: 100us
    #[serde(with = "humantime_serde")]
    pub min_rotation_interval: Duration,

    /// Worker threads used to dispatch lines to consumers in parallel.
    /// Zero dispatches inline on the flush thread, one type after another.
    /// Default: 0
    pub flush_workers: usize,

    /// Per-type overrides keyed by record type name
    pub lines: BTreeMap<String, LineConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_capacity: DEFAULT_LINE_CAPACITY,
            overflow: OverflowPolicy::Reject,
            wait_strategy: WaitStrategy::Yield,
            min_rotation_interval: Duration::from_micros(100),
            flush_workers: 0,
            lines: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Capacity configured for a record type, falling back to the default
    pub fn capacity_for(&self, record_type: &str) -> usize {
        self.lines
            .get(record_type)
            .map(|line| line.capacity)
            .unwrap_or(self.default_capacity)
    }

    /// Whether flush work is fanned out across a worker pool
    #[inline]
    pub fn uses_flush_pool(&self) -> bool {
        self.flush_workers > 0
    }
}
