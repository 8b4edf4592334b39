//! Generations: one line per registered record type
//!
//! A [`Generation`] holds a type-erased [`Lane`] per record type, in
//! registration order. The engine keeps two generations for its lifetime
//! and resolves a record type to its lane index once, through an immutable
//! `TypeId` table built at construction.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tickline_metrics::LineMetrics;

use crate::consumer::{Consumer, Record};
use crate::error::InvalidCapacity;
use crate::line::Line;
use crate::pool::panic_message;

/// Failed flush of one lane
#[derive(Debug, Clone)]
pub(crate) struct FlushFailure {
    pub(crate) pending: usize,
    pub(crate) reason: String,
}

/// Type-erased line plus the consumer that drains it
pub(crate) trait Lane: Send + Sync {
    fn record_type(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn len(&self) -> usize;

    /// Hand the line's records to its consumer and reset it
    ///
    /// On failure the line is left untouched.
    ///
    /// # Safety
    ///
    /// The caller must hold the drain barrier for the owning generation: no
    /// writer is inside it and none can enter until the flush returns.
    unsafe fn flush(&self) -> Result<usize, FlushFailure>;
}

/// Concrete lane for record type `T`
pub(crate) struct TypedLane<T: Record> {
    line: Line<T>,
    consumer: Arc<dyn Consumer<T>>,
    metrics: Arc<LineMetrics>,
}

impl<T: Record> TypedLane<T> {
    pub(crate) fn new(
        capacity: usize,
        consumer: Arc<dyn Consumer<T>>,
        metrics: Arc<LineMetrics>,
    ) -> Result<Self, InvalidCapacity> {
        Ok(Self {
            line: Line::new(capacity)?,
            consumer,
            metrics,
        })
    }

    #[inline]
    pub(crate) fn push(&self, record: T) -> Result<usize, T> {
        self.line.push(record)
    }

    #[inline]
    pub(crate) fn metrics(&self) -> &LineMetrics {
        &self.metrics
    }
}

impl<T: Record> Lane for TypedLane<T> {
    fn record_type(&self) -> &'static str {
        T::NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn len(&self) -> usize {
        self.line.len()
    }

    unsafe fn flush(&self) -> Result<usize, FlushFailure> {
        let consumer = &self.consumer;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            // SAFETY: forwarded from the caller's drain barrier
            unsafe {
                self.line.consume(|records| {
                    consumer.process(T::NAME, records);
                    records.len()
                })
            }
        }));

        match outcome {
            Ok(count) => {
                self.metrics.record_flushed(count);
                Ok(count)
            }
            Err(payload) => Err(FlushFailure {
                pending: self.line.len(),
                reason: panic_message(payload),
            }),
        }
    }
}

/// One buffering epoch: a lane per record type
pub(crate) struct Generation {
    lanes: Box<[Box<dyn Lane>]>,
}

impl Generation {
    pub(crate) fn new(lanes: Vec<Box<dyn Lane>>) -> Self {
        Self {
            lanes: lanes.into_boxed_slice(),
        }
    }

    #[inline]
    pub(crate) fn lane(&self, index: usize) -> &dyn Lane {
        self.lanes[index].as_ref()
    }

    /// Typed lane at `index`, if it holds `T`
    #[inline]
    pub(crate) fn typed<T: Record>(&self, index: usize) -> Option<&TypedLane<T>> {
        self.lanes.get(index)?.as_any().downcast_ref::<TypedLane<T>>()
    }

    pub(crate) fn lanes(&self) -> impl Iterator<Item = &dyn Lane> {
        self.lanes.iter().map(|lane| lane.as_ref())
    }

    pub(crate) fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Records currently buffered across all lanes
    pub(crate) fn pending(&self) -> usize {
        self.lanes.iter().map(|lane| lane.len()).sum()
    }
}
