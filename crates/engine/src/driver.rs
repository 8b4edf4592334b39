//! Background flush driver
//!
//! One named OS thread per engine calls `rotate_and_drain` until the
//! shutdown flag is set, then performs one final rotation so every record
//! stored before the flag reaches its consumer. A failed rotation ends the
//! loop and is returned through [`FlushDriver::join`].
//!
//! With a non-zero `min_rotation_interval` the driver parks between
//! rotations; `join` unparks it so shutdown does not wait out the interval.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::error::{EngineError, RotationError};
use crate::rotation::{RotationReport, Rotator};

/// Totals from one driver run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverReport {
    /// Rotations performed, including the final one
    pub rotations: u64,
    /// Records handed to consumers
    pub records: u64,
}

impl DriverReport {
    fn absorb(&mut self, rotation: &RotationReport) {
        self.rotations += 1;
        self.records += rotation.total() as u64;
    }
}

/// Handle to the running flush thread
pub(crate) struct FlushDriver {
    handle: JoinHandle<Result<DriverReport, RotationError>>,
}

impl FlushDriver {
    pub(crate) fn spawn(rotator: Rotator, min_interval: Duration) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name("tickline-flush".into())
            .spawn(move || run(rotator, min_interval))?;
        Ok(Self { handle })
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wake the driver and wait for it to exit
    ///
    /// The shutdown flag must already be set, or the driver must have
    /// stopped on its own after a failed rotation.
    pub(crate) fn join(self) -> Result<DriverReport, EngineError> {
        self.handle.thread().unpark();
        match self.handle.join() {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => Err(EngineError::DriverPanicked),
        }
    }
}

fn run(rotator: Rotator, min_interval: Duration) -> Result<DriverReport, RotationError> {
    let shared = rotator.shared();
    let mut report = DriverReport::default();

    info!(
        min_rotation_interval_us = min_interval.as_micros() as u64,
        flush_workers = rotator.flush_workers(),
        "flush driver started"
    );

    while !shared.is_shutdown() {
        let started = Instant::now();

        match rotator.rotate_and_drain() {
            Ok(rotation) => report.absorb(&rotation),
            Err(err) => {
                error!(error = %err, rotations = report.rotations, "flush driver stopped");
                return Err(err);
            }
        }

        if let Some(remaining) = min_interval.checked_sub(started.elapsed())
            && !remaining.is_zero()
            && !shared.is_shutdown()
        {
            thread::park_timeout(remaining);
        }
    }

    // Everything stored before the flag was set lands in the generation
    // this rotation drains
    let last = rotator.rotate_and_drain().inspect_err(|err| {
        error!(error = %err, "final flush failed");
    })?;
    report.absorb(&last);

    info!(
        rotations = report.rotations,
        records = report.records,
        final_records = last.total(),
        "flush driver stopped"
    );

    Ok(report)
}
