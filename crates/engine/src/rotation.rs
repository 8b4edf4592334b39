//! Double-buffered generation rotation
//!
//! Two generations live for the whole life of the engine. An atomic
//! `selector` names the generation being drained; writers always append to
//! the other one. Each generation slot has a writer counter that tracks
//! writers inside the append critical section.
//!
//! # Append
//!
//! 1. load `selector` as `draining`, target `draining ^ 1`
//! 2. increment `writers[target]`
//! 3. re-load `selector`; if it moved, a rotation raced us: leave and retry
//! 4. push into the target line
//! 5. decrement `writers[target]`
//!
//! # Rotate
//!
//! 1. flip `selector` (the commit point)
//! 2. wait until `writers[draining]` is zero
//! 3. hand every line of `draining` to its consumer, then reset it
//!
//! Steps 2-3 of append and 1-2 of rotate are a store-then-load pattern on
//! two different atomics from two threads. Both sides use `SeqCst` so at
//! least one of them observes the other: either the writer sees the flip
//! and retries, or the rotation sees the writer's increment and waits.
//!
//! Rotations are serialized by a mutex that the append path never touches.

use std::any::TypeId;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam::utils::CachePadded;
use parking_lot::Mutex;
use tickline_config::{EngineConfig, OverflowPolicy, WaitStrategy};
use tickline_metrics::{EngineMetrics, LineMetrics};
use tracing::{error, trace, warn};

use crate::consumer::Record;
use crate::error::{AppendError, RotationError};
use crate::generation::{FlushFailure, Generation};
use crate::overflow::OverflowTracker;
use crate::pool::WorkerPool;
use crate::wait::wait_until;

/// Outcome of a successful append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appended {
    /// The record is buffered and will reach its consumer
    Stored,
    /// The line was full and the drop policy discarded the record
    Dropped,
}

impl Appended {
    #[inline]
    pub fn is_stored(self) -> bool {
        self == Self::Stored
    }
}

/// What one rotation drained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationReport {
    /// Generation slot that was drained (0 or 1)
    pub generation: usize,
    /// Records handed to each consumer, in registration order
    pub records: Vec<(&'static str, usize)>,
    /// Time spent waiting for in-flight writers
    pub drain_wait: Duration,
    /// Time spent in consumers
    pub dispatch: Duration,
    /// Wait-strategy steps taken on the writer barrier (0 if no writer was in flight)
    pub wait_steps: u64,
}

impl RotationReport {
    /// Total records drained across all types
    pub fn total(&self) -> usize {
        self.records.iter().map(|(_, count)| count).sum()
    }

    /// Records drained for one type, if it is registered
    pub fn count(&self, record_type: &str) -> Option<usize> {
        self.records
            .iter()
            .find(|(name, _)| *name == record_type)
            .map(|(_, count)| *count)
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Registers a writer in a generation slot for the life of the guard
struct WriterGuard<'a>(&'a AtomicUsize);

impl<'a> WriterGuard<'a> {
    #[inline]
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for WriterGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Release);
    }
}

/// State shared by the engine, its producers, the flush driver and pool tasks
pub(crate) struct Shared {
    /// Generation being drained; writers target the other one
    selector: CachePadded<AtomicUsize>,
    writers: [CachePadded<AtomicUsize>; 2],
    generations: [Generation; 2],
    /// Lane index by registration order; small, so scanned linearly
    type_ids: Box<[TypeId]>,

    /// Set once by `stop`; appends observing it are rejected
    shutdown: AtomicBool,
    /// Set once a rotation fails; the engine stops rotating and accepting
    halted: AtomicBool,
    rotation: Mutex<()>,

    overflow: OverflowPolicy,
    wait_strategy: WaitStrategy,
    overflow_tracker: OverflowTracker,
    metrics: Arc<EngineMetrics>,
}

impl Shared {
    pub(crate) fn new(
        generations: [Generation; 2],
        type_ids: Box<[TypeId]>,
        config: &EngineConfig,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            // Writers start in generation 0
            selector: CachePadded::new(AtomicUsize::new(1)),
            writers: [
                CachePadded::new(AtomicUsize::new(0)),
                CachePadded::new(AtomicUsize::new(0)),
            ],
            generations,
            type_ids,
            shutdown: AtomicBool::new(false),
            halted: AtomicBool::new(false),
            rotation: Mutex::new(()),
            overflow: config.overflow,
            wait_strategy: config.wait_strategy,
            overflow_tracker: OverflowTracker::new(),
            metrics,
        }
    }

    // ------------------------------------------------------------------
    // Append path
    // ------------------------------------------------------------------

    #[inline]
    pub(crate) fn append<T: Record>(&self, record: T) -> Result<Appended, AppendError<T>> {
        self.append_with(record, || {})
    }

    /// Append, running `inside` after entering the critical section
    ///
    /// `inside` lets tests hold a writer mid-append.
    #[inline]
    pub(crate) fn append_with<T: Record>(
        &self,
        record: T,
        inside: impl FnOnce(),
    ) -> Result<Appended, AppendError<T>> {
        let Some(index) = self.lane_index::<T>() else {
            return Err(AppendError::Unregistered {
                record_type: T::NAME,
                record,
            });
        };

        let (target, guard) = self.enter();

        if self.shutdown.load(Ordering::SeqCst) || self.halted.load(Ordering::Acquire) {
            drop(guard);
            self.metrics.record_rejected_closed();
            return Err(AppendError::Closed { record });
        }

        inside();

        let Some(lane) = self.generations[target].typed::<T>(index) else {
            return Err(AppendError::Unregistered {
                record_type: T::NAME,
                record,
            });
        };
        let pushed = lane.push(record);
        drop(guard);

        match pushed {
            Ok(_) => {
                lane.metrics().record_appended();
                self.metrics.record_appended();
                Ok(Appended::Stored)
            }
            Err(record) => self.overflowed(lane.metrics(), record),
        }
    }

    /// Join the open generation, retrying if a rotation flips it under us
    #[inline]
    fn enter(&self) -> (usize, WriterGuard<'_>) {
        loop {
            let draining = self.selector.load(Ordering::Relaxed);
            let target = draining ^ 1;
            let guard = WriterGuard::enter(&self.writers[target]);
            if self.selector.load(Ordering::SeqCst) == draining {
                return (target, guard);
            }
            drop(guard);
            self.metrics.record_append_retry();
        }
    }

    fn overflowed<T: Record>(
        &self,
        line: &LineMetrics,
        record: T,
    ) -> Result<Appended, AppendError<T>> {
        line.record_overflow();
        match self.overflow {
            OverflowPolicy::Reject => {
                self.metrics.record_rejected_full();
                Err(AppendError::Full {
                    record_type: T::NAME,
                    record,
                })
            }
            OverflowPolicy::Drop => {
                drop(record);
                self.metrics.record_dropped();
                self.overflow_tracker.record_drop(T::NAME);
                Ok(Appended::Dropped)
            }
        }
    }

    #[inline]
    fn lane_index<T: Record>(&self) -> Option<usize> {
        let id = TypeId::of::<T>();
        self.type_ids.iter().position(|registered| *registered == id)
    }

    // ------------------------------------------------------------------
    // Rotation
    // ------------------------------------------------------------------

    /// Close the open generation, wait out its writers, and drain it
    ///
    /// With a pool, lanes are flushed in parallel and every task is awaited
    /// before returning. A failed lane halts the engine.
    pub(crate) fn rotate_and_drain(
        self: &Arc<Self>,
        pool: Option<&WorkerPool>,
    ) -> Result<RotationReport, RotationError> {
        let _rotation = self.rotation.lock();
        if self.halted.load(Ordering::Acquire) {
            return Err(RotationError::Halted);
        }

        let started = Instant::now();

        // Only rotations write the selector, and they hold the lock
        let draining = self.selector.load(Ordering::Relaxed) ^ 1;
        self.selector.store(draining, Ordering::SeqCst);

        let wait_steps = wait_until(self.wait_strategy, || {
            self.writers[draining].load(Ordering::SeqCst) == 0
        });
        let drain_wait = started.elapsed();

        let dispatch_started = Instant::now();
        let outcomes = match pool {
            Some(pool) => self.flush_pooled(pool, draining),
            None => self.flush_inline(draining),
        };
        let dispatch = dispatch_started.elapsed();

        let mut records = Vec::with_capacity(outcomes.len());
        let mut failure = None;
        for (record_type, outcome) in outcomes {
            match outcome {
                Ok(count) => records.push((record_type, count)),
                Err(FlushFailure { pending, reason }) => {
                    error!(
                        record_type,
                        generation = draining,
                        pending,
                        reason = %reason,
                        "consumer failed, line left undrained"
                    );
                    if failure.is_none() {
                        failure = Some(RotationError::Poisoned {
                            record_type,
                            pending,
                            reason,
                        });
                    }
                }
            }
        }

        if let Some(err) = failure {
            self.halted.store(true, Ordering::SeqCst);
            self.metrics.record_rotation_failure();
            error!(generation = draining, "rotation failed, engine halted");
            return Err(err);
        }

        let report = RotationReport {
            generation: draining,
            records,
            drain_wait,
            dispatch,
            wait_steps,
        };
        self.metrics
            .record_rotation(report.total(), drain_wait, dispatch);

        if !report.is_empty() {
            trace!(
                generation = draining,
                records = report.total(),
                drain_wait_ns = drain_wait.as_nanos() as u64,
                dispatch_ns = dispatch.as_nanos() as u64,
                "generation drained"
            );
        }

        Ok(report)
    }

    fn flush_inline(&self, draining: usize) -> Vec<(&'static str, Result<usize, FlushFailure>)> {
        self.generations[draining]
            .lanes()
            .map(|lane| {
                // SAFETY: the selector points away from `draining`, its writer
                // count reached zero after the flip, and the rotation lock
                // keeps the next flip from reopening it until we return.
                let outcome = unsafe { lane.flush() };
                (lane.record_type(), outcome)
            })
            .collect()
    }

    fn flush_pooled(
        self: &Arc<Self>,
        pool: &WorkerPool,
        draining: usize,
    ) -> Vec<(&'static str, Result<usize, FlushFailure>)> {
        let generation = &self.generations[draining];

        let handles: Vec<_> = (0..generation.lane_count())
            .map(|index| {
                let shared = Arc::clone(self);
                let handle = pool.submit(move || {
                    // SAFETY: as in `flush_inline`; the rotation lock is held
                    // until every handle below has been awaited.
                    unsafe { shared.generations[draining].lane(index).flush() }
                });
                (index, handle)
            })
            .collect();

        // Completion barrier
        handles
            .into_iter()
            .map(|(index, handle)| {
                let lane = generation.lane(index);
                let outcome = handle.wait().unwrap_or_else(|err| {
                    Err(FlushFailure {
                        pending: lane.len(),
                        reason: err.to_string(),
                    })
                });
                (lane.record_type(), outcome)
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Set the shutdown flag; returns true if it was already set
    pub(crate) fn begin_shutdown(&self) -> bool {
        self.shutdown.swap(true, Ordering::SeqCst)
    }

    #[inline]
    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    #[inline]
    pub(crate) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// Generation slot currently closed to new writers
    pub(crate) fn closed_generation(&self) -> usize {
        self.selector.load(Ordering::Acquire)
    }

    pub(crate) fn writers_in(&self, generation: usize) -> usize {
        self.writers[generation].load(Ordering::Acquire)
    }

    pub(crate) fn wait_strategy(&self) -> WaitStrategy {
        self.wait_strategy
    }

    pub(crate) fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    /// Records buffered in both generations (approximate while writers run)
    pub(crate) fn pending(&self) -> usize {
        self.generations.iter().map(Generation::pending).sum()
    }

    pub(crate) fn record_types(&self) -> Vec<&'static str> {
        self.generations[0].lanes().map(|lane| lane.record_type()).collect()
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let pending = self.pending();
        if pending > 0 {
            warn!(pending, "engine dropped with undrained records");
        }
    }
}

/// Handle used to run rotations, shared by the engine and the flush driver
#[derive(Clone)]
pub(crate) struct Rotator {
    shared: Arc<Shared>,
    pool: Option<Arc<WorkerPool>>,
}

impl Rotator {
    pub(crate) fn new(shared: Arc<Shared>, pool: Option<Arc<WorkerPool>>) -> Self {
        Self { shared, pool }
    }

    pub(crate) fn rotate_and_drain(&self) -> Result<RotationReport, RotationError> {
        self.shared.rotate_and_drain(self.pool.as_deref())
    }

    #[inline]
    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub(crate) fn flush_workers(&self) -> usize {
        self.pool.as_ref().map_or(0, |pool| pool.threads())
    }
}
