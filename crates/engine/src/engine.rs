//! Engine builder, lifecycle and producer handles

use std::any::TypeId;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tickline_config::EngineConfig;
use tickline_metrics::{EngineMetrics, LineMetrics};
use tracing::{info, warn};

use crate::consumer::{Consumer, Record};
use crate::driver::{DriverReport, FlushDriver};
use crate::error::{AppendError, BuildError, EngineError, InvalidCapacity, Result, RotationError};
use crate::generation::{Generation, Lane, TypedLane};
use crate::pool::WorkerPool;
use crate::rotation::{Appended, RotationReport, Rotator, Shared};
use crate::wait::wait_until;

type LaneFactory = Box<
    dyn Fn(usize, &Arc<LineMetrics>) -> std::result::Result<Box<dyn Lane>, InvalidCapacity> + Send,
>;

/// One registered record type, waiting for `build`
struct Registration {
    record_type: &'static str,
    type_id: TypeId,
    /// Explicit capacity; `None` defers to the config
    capacity: Option<usize>,
    make_lane: LaneFactory,
}

/// Collects record types and consumers, then builds an [`Engine`]
pub struct EngineBuilder {
    config: EngineConfig,
    metrics: Option<Arc<EngineMetrics>>,
    registrations: Vec<Registration>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            metrics: None,
            registrations: Vec::new(),
        }
    }

    /// Use a caller-owned metrics context
    ///
    /// Without one the engine creates its own, reachable via
    /// [`Engine::metrics`].
    pub fn metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register record type `T` with its consumer
    ///
    /// Line capacity comes from `[engine.lines.<T::NAME>]`, falling back to
    /// `default_capacity`.
    pub fn register<T, C>(self, consumer: C) -> Self
    where
        T: Record,
        C: Consumer<T> + 'static,
    {
        self.push_registration(None, consumer)
    }

    /// Register record type `T` with an explicit line capacity
    pub fn register_with_capacity<T, C>(self, capacity: usize, consumer: C) -> Self
    where
        T: Record,
        C: Consumer<T> + 'static,
    {
        self.push_registration(Some(capacity), consumer)
    }

    fn push_registration<T, C>(mut self, capacity: Option<usize>, consumer: C) -> Self
    where
        T: Record,
        C: Consumer<T> + 'static,
    {
        let consumer: Arc<dyn Consumer<T>> = Arc::new(consumer);
        self.registrations.push(Registration {
            record_type: T::NAME,
            type_id: TypeId::of::<T>(),
            capacity,
            make_lane: Box::new(move |capacity: usize, metrics: &Arc<LineMetrics>| {
                let lane = TypedLane::new(capacity, Arc::clone(&consumer), Arc::clone(metrics))?;
                Ok(Box::new(lane) as Box<dyn Lane>)
            }),
        });
        self
    }

    /// Allocate both generations and the flush pool
    pub fn build(self) -> std::result::Result<Engine, BuildError> {
        if self.registrations.is_empty() {
            return Err(BuildError::NoRecordTypes);
        }

        for (i, registration) in self.registrations.iter().enumerate() {
            let duplicate = self.registrations[..i].iter().any(|earlier| {
                earlier.type_id == registration.type_id
                    || earlier.record_type == registration.record_type
            });
            if duplicate {
                return Err(BuildError::Duplicate(registration.record_type));
            }
        }

        if let Some(unknown) = self.config.lines.keys().find(|name| {
            !self
                .registrations
                .iter()
                .any(|r| r.record_type == name.as_str())
        }) {
            return Err(BuildError::UnknownLine(unknown.clone()));
        }

        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(EngineMetrics::new()));

        let count = self.registrations.len();
        let mut lanes: [Vec<Box<dyn Lane>>; 2] = [Vec::with_capacity(count), Vec::with_capacity(count)];
        let mut type_ids = Vec::with_capacity(count);

        for registration in &self.registrations {
            let capacity = registration
                .capacity
                .unwrap_or_else(|| self.config.capacity_for(registration.record_type));
            let line_metrics = metrics.register_line(registration.record_type, capacity);

            for generation in &mut lanes {
                let lane = (registration.make_lane)(capacity, &line_metrics).map_err(|source| {
                    BuildError::Capacity {
                        record_type: registration.record_type,
                        source,
                    }
                })?;
                generation.push(lane);
            }
            type_ids.push(registration.type_id);
        }

        let pool = if self.config.uses_flush_pool() {
            let pool = WorkerPool::new(self.config.flush_workers).map_err(BuildError::Spawn)?;
            Some(Arc::new(pool))
        } else {
            None
        };

        let [first, second] = lanes;
        let shared = Arc::new(Shared::new(
            [Generation::new(first), Generation::new(second)],
            type_ids.into_boxed_slice(),
            &self.config,
            metrics,
        ));

        info!(
            record_types = ?shared.record_types(),
            overflow = self.config.overflow.as_str(),
            wait_strategy = self.config.wait_strategy.as_str(),
            flush_workers = self.config.flush_workers,
            "engine built"
        );

        Ok(Engine {
            rotator: Rotator::new(shared, pool),
            driver: Mutex::new(None),
            min_rotation_interval: self.config.min_rotation_interval,
        })
    }
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let record_types: Vec<_> = self.registrations.iter().map(|r| r.record_type).collect();
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("record_types", &record_types)
            .finish_non_exhaustive()
    }
}

/// Summary returned by [`Engine::stop`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    /// Totals from the flush driver, if it was started
    pub driver: Option<DriverReport>,
    /// The rotation `stop` ran after the driver exited
    pub final_rotation: RotationReport,
}

impl StopReport {
    /// Records flushed by the driver and the final rotation
    pub fn records_flushed(&self) -> u64 {
        self.driver.map_or(0, |d| d.records) + self.final_rotation.total() as u64
    }
}

/// Double-buffered ingestion engine
///
/// Producers append from any thread; the flush driver (or manual calls to
/// [`rotate_and_drain`](Self::rotate_and_drain)) hands closed generations
/// to consumers.
pub struct Engine {
    rotator: Rotator,
    driver: Mutex<Option<FlushDriver>>,
    min_rotation_interval: Duration,
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Append a record to the open generation
    ///
    /// Never blocks on a lock. Returns the record on `Full` (reject
    /// policy), after shutdown, or for an unregistered type.
    #[inline]
    pub fn append<T: Record>(&self, record: T) -> std::result::Result<Appended, AppendError<T>> {
        self.rotator.shared().append(record)
    }

    /// Cloneable append handle for producer threads
    pub fn producer(&self) -> Producer {
        Producer {
            shared: Arc::clone(self.rotator.shared()),
        }
    }

    /// Close the open generation and hand it to the consumers
    ///
    /// Safe to call while the driver runs; rotations are serialized.
    pub fn rotate_and_drain(&self) -> std::result::Result<RotationReport, RotationError> {
        self.rotator.rotate_and_drain()
    }

    /// Spawn the background flush driver
    pub fn start(&self) -> Result<()> {
        let shared = self.rotator.shared();
        let mut driver = self.driver.lock();

        if shared.is_shutdown() {
            return Err(EngineError::Stopped);
        }
        if shared.is_halted() {
            return Err(RotationError::Halted.into());
        }
        if driver.is_some() {
            return Err(EngineError::AlreadyStarted);
        }

        let spawned = FlushDriver::spawn(self.rotator.clone(), self.min_rotation_interval)
            .map_err(EngineError::Spawn)?;
        *driver = Some(spawned);
        Ok(())
    }

    /// Stop accepting records, flush everything stored, and join the driver
    ///
    /// Appends racing with `stop` either succeed and are flushed, or fail
    /// with [`AppendError::Closed`]. Calling `stop` again is harmless.
    pub fn stop(&self) -> Result<StopReport> {
        let shared = self.rotator.shared();

        // Let any rotation in progress finish its barrier first
        let closed = shared.closed_generation();
        wait_until(shared.wait_strategy(), || shared.writers_in(closed) == 0);

        if !shared.begin_shutdown() {
            info!("engine stopping");
        }

        let driver = self.driver.lock().take();
        let driver = match driver {
            Some(driver) => Some(driver.join()?),
            None => None,
        };

        let final_rotation = self.rotator.rotate_and_drain()?;

        info!(
            driver_rotations = driver.map_or(0, |d| d.rotations),
            final_records = final_rotation.total(),
            "engine stopped"
        );

        Ok(StopReport {
            driver,
            final_rotation,
        })
    }

    /// True while the flush driver thread is alive
    pub fn is_running(&self) -> bool {
        self.driver
            .lock()
            .as_ref()
            .is_some_and(|driver| !driver.is_finished())
    }

    /// True once appends are rejected (stopped or halted)
    pub fn is_closed(&self) -> bool {
        let shared = self.rotator.shared();
        shared.is_shutdown() || shared.is_halted()
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        self.rotator.shared().metrics()
    }

    /// Registered record type names, in registration order
    pub fn record_types(&self) -> Vec<&'static str> {
        self.rotator.shared().record_types()
    }

    /// Records currently buffered (approximate while writers run)
    pub fn pending(&self) -> usize {
        self.rotator.shared().pending()
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<Shared> {
        self.rotator.shared()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let shared = Arc::clone(self.rotator.shared());
        let already_stopped = shared.begin_shutdown();

        // Producers may outlive the engine; from here on they get `Closed`
        if let Some(driver) = self.driver.get_mut().take() {
            warn!("engine dropped without stop, shutting down flush driver");
            if let Err(err) = driver.join() {
                warn!(error = %err, "flush driver failed during drop");
            }
            return;
        }

        if already_stopped || shared.is_halted() {
            return;
        }

        // No driver will rotate again: flush what producers already stored
        match self.rotator.rotate_and_drain() {
            Ok(report) if !report.is_empty() => {
                warn!(
                    records = report.total(),
                    "engine dropped without stop, flushed remaining records"
                );
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "final flush failed during drop"),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("record_types", &self.record_types())
            .field("running", &self.is_running())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Cloneable append handle
///
/// Keeps the engine's buffers alive; records appended after `stop`, or
/// after the engine is dropped, are rejected with [`AppendError::Closed`].
#[derive(Clone)]
pub struct Producer {
    shared: Arc<Shared>,
}

impl Producer {
    #[inline]
    pub fn append<T: Record>(&self, record: T) -> std::result::Result<Appended, AppendError<T>> {
        self.shared.append(record)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_shutdown() || self.shared.is_halted()
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;
