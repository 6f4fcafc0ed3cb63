use core::time::Duration;

/// A result type defaulting to the crate [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `guid` can emit.
///
/// Only [`Error::ClockMovedBackward`] is expected at runtime under normal
/// operation. The remaining variants describe configuration defects or inputs
/// that cannot be represented in the ID layout.
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The clock reported a time earlier than the timestamp of the last issued
    /// ID.
    ///
    /// Nothing was issued and the generator state is unchanged. The generator
    /// can issue again once the clock reaches `last_timestamp`.
    #[error("clock moved backward: now {now} ms, refusing to issue until {last_timestamp} ms")]
    ClockMovedBackward {
        /// The clock reading that was rejected, in milliseconds since the
        /// Unix epoch.
        now: u64,
        /// The timestamp the clock must reach before issuance resumes.
        last_timestamp: u64,
    },

    /// The clock reported a time before the generator's epoch.
    #[error("clock reading {now} ms is before the epoch {epoch} ms")]
    ClockBeforeEpoch { now: u64, epoch: u64 },

    /// The time elapsed since the epoch no longer fits the timestamp field.
    #[error("timestamp {now} ms exceeds the last representable instant {max} ms")]
    TimestampOverflow { now: u64, max: u64 },

    #[error("datacenter id {value} is out of range (max = {max})")]
    InvalidDatacenterId { value: u64, max: u64 },

    #[error("worker id {value} is out of range (max = {max})")]
    InvalidWorkerId { value: u64, max: u64 },

    /// The epoch is later than the clock reading at construction, so no ID
    /// could be issued against it.
    #[error("epoch {epoch_millis} ms is after the current time {now} ms")]
    InvalidEpoch { epoch_millis: u128, now: u64 },

    /// The input is not a valid decimal ID.
    #[error("invalid id: {input:?}")]
    ParseGuid { input: String },

    /// The operation failed because the generator lock was poisoned.
    ///
    /// This occurs when a thread panics while holding the lock. When the
    /// `parking-lot` feature is enabled, mutexes do not poison, so this
    /// variant is not available.
    #[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
    #[cfg(not(feature = "parking-lot"))]
    #[error("generator lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// How long to wait before the clock is expected to catch up with the last
    /// issued timestamp.
    ///
    /// Returns `None` for errors that waiting will not resolve.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::ClockMovedBackward {
                now,
                last_timestamp,
            } => Some(Duration::from_millis(last_timestamp.saturating_sub(*now))),
            _ => None,
        }
    }
}

#[cfg(not(feature = "parking-lot"))]
use crate::generator::{MutexGuard, PoisonError};
#[cfg(not(feature = "parking-lot"))]
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}
