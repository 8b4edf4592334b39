//! Market data records carried through the engine by the demo workload

use serde::Serialize;
use tickline_engine::Record;

/// Every record type the binary registers, in registration order
pub const RECORD_TYPES: [&str; 2] = [OrderBookMessage::NAME, BasicDataMessage::NAME];

/// Top-of-book update for one instrument
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBookMessage {
    pub timestamp: u64,
    pub symbol: String,
    pub price: f64,
}

impl Record for OrderBookMessage {
    const NAME: &'static str = "order_book";
}

/// Last-trade data point for one instrument
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicDataMessage {
    pub timestamp: u64,
    pub symbol: String,
    pub price: f64,
}

impl Record for BasicDataMessage {
    const NAME: &'static str = "basic_data";
}

/// Deterministic price walk around `base`, one cent per step, wrapping every
/// hundred steps
pub fn synthetic_price(base: f64, step: u64) -> f64 {
    base + (step % 100) as f64 * 0.01
}
