//! Synthetic multi-producer workload
//!
//! Each producer thread appends `records` pairs of order-book and basic-data
//! messages, retrying while a line is full, until it is done, the engine
//! closes, or a stop is requested.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result, anyhow, bail, ensure};
use chrono::Utc;
use serde::Serialize;
use tickline_engine::{AppendError, Appended, Producer, Record};
use tracing::debug;

use crate::records::{BasicDataMessage, OrderBookMessage, synthetic_price};

/// Instruments cycled through when none are given
pub const DEFAULT_SYMBOLS: [&str; 4] = ["MSFT", "NVDA", "AAPL", "AMZN"];

const ORDER_BOOK_BASE: f64 = 12.0;
const BASIC_DATA_BASE: f64 = 67.0;

/// What the producers managed to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkloadReport {
    /// Records the engine accepted
    pub stored: u64,
    /// Records discarded by the drop overflow policy
    pub dropped: u64,
    /// Appends retried because a line was full
    pub full_retries: u64,
    /// Producers that stopped early because the engine closed
    pub closed: u64,
}

impl WorkloadReport {
    fn merge(&mut self, other: WorkloadReport) {
        self.stored += other.stored;
        self.dropped += other.dropped;
        self.full_retries += other.full_retries;
        self.closed += other.closed;
    }
}

/// N producer threads appending interleaved records
#[derive(Debug, Clone)]
pub struct Workload {
    producers: usize,
    records: u64,
    symbols: Arc<[String]>,
    stop: Arc<AtomicBool>,
}

impl Workload {
    pub fn new(producers: usize, records: u64, symbols: Vec<String>) -> Result<Self> {
        ensure!(producers > 0, "at least one producer is required");
        ensure!(!symbols.is_empty(), "at least one symbol is required");

        Ok(Self {
            producers,
            records,
            symbols: symbols.into(),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that makes every producer finish its current append and exit
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Records of both types each producer appends when not stopped
    pub fn planned(&self) -> u64 {
        self.producers as u64 * self.records * 2
    }

    /// Run every producer to completion on its own thread
    pub fn run(&self, producer: &Producer) -> Result<WorkloadReport> {
        let mut handles = Vec::with_capacity(self.producers);

        for id in 0..self.producers {
            let producer = producer.clone();
            let symbols = Arc::clone(&self.symbols);
            let stop = Arc::clone(&self.stop);
            let records = self.records;

            let spawned = thread::Builder::new()
                .name(format!("tickline-producer-{id}"))
                .spawn(move || produce(id, &producer, &symbols, records, &stop));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    self.stop.store(true, Ordering::Relaxed);
                    return Err(e).with_context(|| format!("failed to spawn producer {id}"));
                }
            }
        }

        let mut report = WorkloadReport::default();
        for handle in handles {
            let part = handle
                .join()
                .map_err(|_| anyhow!("producer thread panicked"))??;
            report.merge(part);
        }
        Ok(report)
    }
}

fn produce(
    id: usize,
    producer: &Producer,
    symbols: &[String],
    records: u64,
    stop: &AtomicBool,
) -> Result<WorkloadReport> {
    let mut report = WorkloadReport::default();

    for i in 0..records {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        let symbol = &symbols[(id + i as usize) % symbols.len()];
        let timestamp = now_nanos();

        let order_book = OrderBookMessage {
            timestamp,
            symbol: symbol.clone(),
            price: synthetic_price(ORDER_BOOK_BASE, i),
        };
        if !append_retrying(producer, order_book, stop, &mut report)? {
            break;
        }

        let basic_data = BasicDataMessage {
            timestamp,
            symbol: symbol.clone(),
            price: synthetic_price(BASIC_DATA_BASE, i),
        };
        if !append_retrying(producer, basic_data, stop, &mut report)? {
            break;
        }
    }

    debug!(
        producer = id,
        stored = report.stored,
        full_retries = report.full_retries,
        "producer finished"
    );
    Ok(report)
}

/// Append, retrying on `Full`; `Ok(false)` once the producer should exit
fn append_retrying<T: Record>(
    producer: &Producer,
    mut record: T,
    stop: &AtomicBool,
    report: &mut WorkloadReport,
) -> Result<bool> {
    loop {
        match producer.append(record) {
            Ok(Appended::Stored) => {
                report.stored += 1;
                return Ok(true);
            }
            Ok(Appended::Dropped) => {
                report.dropped += 1;
                return Ok(true);
            }
            Err(AppendError::Full { record: back, .. }) => {
                if stop.load(Ordering::Relaxed) {
                    return Ok(false);
                }
                report.full_retries += 1;
                record = back;
                thread::yield_now();
            }
            Err(AppendError::Closed { .. }) => {
                report.closed += 1;
                return Ok(false);
            }
            Err(err @ AppendError::Unregistered { .. }) => bail!("{err}"),
        }
    }
}

fn now_nanos() -> u64 {
    Utc::now()
        .timestamp_nanos_opt()
        .map_or(0, |nanos| nanos.max(0) as u64)
}
