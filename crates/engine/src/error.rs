//! Engine error types
//!
//! Producer-side errors ([`AppendError`]) hand the rejected record back so
//! the caller can retry or discard it. Rotation-side errors
//! ([`RotationError`]) are fatal to the engine: a generation that was only
//! partially handed to consumers cannot be reset without losing data.

use std::fmt;
use std::io;

use thiserror::Error;

/// Line capacity that is zero or not a power of two
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("line capacity {0} is not a non-zero power of two")]
pub struct InvalidCapacity(pub usize);

/// Reasons an append did not store its record
///
/// Every variant carries the record back to the caller.
#[derive(Error)]
pub enum AppendError<T> {
    /// The line for this type is at capacity in the open generation
    #[error("line `{record_type}` is full")]
    Full { record_type: &'static str, record: T },

    /// The engine is shutting down or halted after a failed rotation
    #[error("engine is closed to new records")]
    Closed { record: T },

    /// The record type was not registered when the engine was built
    #[error("record type `{record_type}` is not registered with this engine")]
    Unregistered { record_type: &'static str, record: T },
}

impl<T> AppendError<T> {
    /// Take back the record that was not stored
    pub fn into_record(self) -> T {
        match self {
            Self::Full { record, .. } | Self::Closed { record } | Self::Unregistered { record, .. } => {
                record
            }
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full { .. })
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}

// Manual impl so `T: Debug` is not required
impl<T> fmt::Debug for AppendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full { record_type, .. } => f
                .debug_struct("Full")
                .field("record_type", record_type)
                .finish_non_exhaustive(),
            Self::Closed { .. } => f.debug_struct("Closed").finish_non_exhaustive(),
            Self::Unregistered { record_type, .. } => f
                .debug_struct("Unregistered")
                .field("record_type", record_type)
                .finish_non_exhaustive(),
        }
    }
}

/// A rotation could not hand its generation to every consumer
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RotationError {
    /// A consumer (or the pool task running it) failed; that line was not reset
    #[error("flush of `{record_type}` failed, {pending} records left undrained: {reason}")]
    Poisoned {
        record_type: &'static str,
        pending: usize,
        reason: String,
    },

    /// An earlier rotation failed and the engine no longer rotates
    #[error("engine halted after an earlier failed rotation")]
    Halted,
}

/// Worker pool task failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task was dropped before it ran (pool shut down)
    #[error("task was lost before completion")]
    Lost,
}

/// Errors building an engine
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no record types registered")]
    NoRecordTypes,

    #[error("record type `{0}` registered more than once")]
    Duplicate(&'static str),

    #[error("record type `{record_type}`: {source}")]
    Capacity {
        record_type: &'static str,
        #[source]
        source: InvalidCapacity,
    },

    /// `[engine.lines]` names a type that was never registered
    #[error("line settings given for unregistered record type `{0}`")]
    UnknownLine(String),

    #[error("failed to spawn flush workers: {0}")]
    Spawn(#[source] io::Error),
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("flush driver already running")]
    AlreadyStarted,

    #[error("engine has been stopped")]
    Stopped,

    #[error("failed to spawn flush driver: {0}")]
    Spawn(#[source] io::Error),

    #[error("flush driver panicked")]
    DriverPanicked,

    #[error(transparent)]
    Rotation(#[from] RotationError),
}

/// Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, EngineError>;
