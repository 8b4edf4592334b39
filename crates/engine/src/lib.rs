//! Tickline - Double-buffered ingestion engine
//!
//! Many producer threads append typed records without taking a lock while a
//! background flush driver periodically closes the current generation and
//! hands each type's records to its consumer.
//!
//! # Architecture
//!
//! ```text
//!  producers ──append──→ generation[!selector] ─┐
//!                                               │  rotate: flip selector,
//!  flush driver ──rotate_and_drain──────────────┤  wait writers[closed] == 0,
//!                                               │  drain closed generation
//!  consumers  ←──&[T] per type── generation[selector] ←┘
//! ```
//!
//! # Key Design
//!
//! - **Two generations**: one open for writers, one being drained or idle
//! - **Writer barrier**: per-generation writer counters plus an optimistic
//!   selector re-check; the flusher waits for the closed generation's count
//!   to reach zero before touching it
//! - **Typed lines**: one fixed-capacity, power-of-two [`Line`] per record
//!   type per generation; slots claimed with an atomic bounded increment
//! - **Closed type set**: record types register once at build time and are
//!   resolved by `TypeId`
//! - **Optional fan-out**: lines can be flushed in parallel on a
//!   [`WorkerPool`], awaited before the rotation returns
//!
//! # Example
//!
//! ```ignore
//! use tickline_engine::{Engine, EngineConfig, Record};
//!
//! struct Tick { timestamp: u64, price: f64 }
//! impl Record for Tick { const NAME: &'static str = "tick"; }
//!
//! let engine = Engine::builder(EngineConfig::default())
//!     .register::<Tick, _>(|ticks: &[Tick]| println!("{} ticks", ticks.len()))
//!     .build()?;
//!
//! engine.start()?;
//!
//! let producer = engine.producer();
//! std::thread::spawn(move || {
//!     producer.append(Tick { timestamp: 1, price: 100.0 }).ok();
//! });
//!
//! // Flushes everything stored, joins the driver
//! engine.stop()?;
//! ```

mod consumer;
mod driver;
mod engine;
mod error;
mod generation;
mod line;
mod overflow;
mod pool;
mod rotation;
mod wait;

pub use consumer::{Consumer, Record};
pub use driver::DriverReport;
pub use engine::{Engine, EngineBuilder, Producer, StopReport};
pub use error::{
    AppendError, BuildError, EngineError, InvalidCapacity, PoolError, Result, RotationError,
};
pub use line::Line;
pub use pool::{TaskHandle, WorkerPool};
pub use rotation::{Appended, RotationReport};

// Re-export configuration and metrics types used in the engine API
pub use tickline_config::{EngineConfig, LineConfig, OverflowPolicy, WaitStrategy};
pub use tickline_metrics::EngineMetrics;
