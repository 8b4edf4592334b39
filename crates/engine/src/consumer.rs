//! Record types and their consumers
//!
//! The set of record types is fixed when the engine is built. Each type
//! names itself through [`Record::NAME`] and gets exactly one consumer.

/// A record type the engine can buffer
///
/// # Example
///
/// ```
/// use tickline_engine::Record;
///
/// struct Tick {
///     timestamp: u64,
///     price: f64,
/// }
///
/// impl Record for Tick {
///     const NAME: &'static str = "tick";
/// }
/// ```
pub trait Record: Send + Sync + 'static {
    /// Stable name used in config (`[engine.lines.<name>]`), logs and metrics
    const NAME: &'static str;
}

/// Receives each closed generation's records for one type
///
/// Called once per type per rotation, possibly with an empty slice. The
/// slice is only valid for the duration of the call; records are dropped
/// right after.
///
/// Any `Fn(&[T]) + Send + Sync` closure is a consumer.
pub trait Consumer<T>: Send + Sync {
    fn process(&self, record_type: &'static str, records: &[T]);
}

impl<T, F> Consumer<T> for F
where
    F: Fn(&[T]) + Send + Sync,
{
    #[inline]
    fn process(&self, _record_type: &'static str, records: &[T]) {
        self(records)
    }
}
