//! In-memory instrument store
//!
//! Append-only per-instrument history of prices, written by the engine's
//! consumers. One mutex guards the whole map; consumers take it once per
//! flushed batch, not once per record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// One stored observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    /// When the batch holding this record was flushed
    pub time: DateTime<Utc>,
    pub record_type: &'static str,
    pub price: f64,
}

/// Per-instrument totals for reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentSummary {
    pub instrument: String,
    pub points: usize,
    pub last_price: Option<f64>,
}

/// Mutex-guarded map of instrument id to its data points
#[derive(Debug, Default)]
pub struct InstrumentStore {
    instruments: Mutex<HashMap<String, Vec<DataPoint>>>,
}

impl InstrumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a flushed batch of `(instrument, price)` pairs under one lock
    ///
    /// Every point in the batch shares the same timestamp. Returns the number
    /// of points stored.
    pub fn record_batch<'a, I>(&self, record_type: &'static str, batch: I) -> usize
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let time = Utc::now();
        let mut instruments = self.instruments.lock();
        let mut stored = 0;
        for (instrument, price) in batch {
            let point = DataPoint {
                time,
                record_type,
                price,
            };
            match instruments.get_mut(instrument) {
                Some(history) => history.push(point),
                None => {
                    instruments.insert(instrument.to_string(), vec![point]);
                }
            }
            stored += 1;
        }
        stored
    }

    /// Total data points across all instruments
    pub fn total(&self) -> usize {
        self.instruments.lock().values().map(Vec::len).sum()
    }

    /// Copy of the history for `instrument`
    #[cfg(test)]
    pub(crate) fn history_of(&self, instrument: &str) -> Vec<DataPoint> {
        self.instruments
            .lock()
            .get(instrument)
            .cloned()
            .unwrap_or_default()
    }

    /// Per-instrument totals, sorted by instrument id
    pub fn summary(&self) -> Vec<InstrumentSummary> {
        let instruments = self.instruments.lock();
        let mut summary: Vec<_> = instruments
            .iter()
            .map(|(instrument, points)| InstrumentSummary {
                instrument: instrument.clone(),
                points: points.len(),
                last_price: points.last().map(|p| p.price),
            })
            .collect();
        summary.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        summary
    }
}
