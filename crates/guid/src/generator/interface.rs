use crate::{Guid, Result};

/// A minimal interface for issuing IDs.
///
/// Implemented by [`IdGenerator`] for every clock, so consumers (and
/// benchmarks) can stay generic over how time is sourced.
///
/// [`IdGenerator`]: crate::IdGenerator
pub trait Generator {
    /// Issues the next ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClockMovedBackward`] if the clock is behind the last
    /// issued timestamp, and an out-of-range error if the clock cannot be
    /// encoded against the generator's epoch.
    ///
    /// [`Error::ClockMovedBackward`]: crate::Error::ClockMovedBackward
    fn next_id(&self) -> Result<Guid>;
}
