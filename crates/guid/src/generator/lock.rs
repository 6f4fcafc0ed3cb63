use core::{cmp::Ordering, fmt, time::Duration};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, Generator, Guid, MAX_DATACENTER_ID, MAX_SEQUENCE, MAX_TIMESTAMP, MAX_WORKER_ID, Result,
    SystemClock, TWITTER_EPOCH, TimeSource,
    generator::{Mutex, MutexGuard},
};

const TWITTER_EPOCH_MILLIS: u64 = TWITTER_EPOCH.as_millis() as u64;

/// Mutable issuance state. Only ever touched while the generator lock is held.
#[derive(Debug, Default)]
struct State {
    /// Unix millisecond timestamp of the last issued ID. `None` until the
    /// first issuance, so the first call can never see the clock behind it.
    last_timestamp: Option<u64>,
    sequence: u64,
}

/// A lock-based ID generator that is safe to share between threads.
///
/// Every call to [`IdGenerator::next_id`] runs under a single mutex covering
/// the whole read-check-update sequence, including the spin-wait when the
/// sequence for the current millisecond is exhausted. Share it with
/// [`Arc`](std::sync::Arc) or by reference.
///
/// Identity (`datacenter_id`, `worker_id`) is assigned externally. Two
/// generators with the same identity and epoch will issue colliding IDs.
///
/// ## Features
/// - `parking-lot`: use `parking_lot::Mutex`, which cannot be poisoned
/// - `cache-padded`: pad the lock to a cache line to avoid false sharing
/// - `tracing`: emit spans and events for issuance
///
/// # Example
/// ```
/// use guid::IdGenerator;
///
/// let generator = IdGenerator::new(1, 7).unwrap();
/// let a = generator.next_id().unwrap();
/// let b = generator.next_id().unwrap();
///
/// assert!(a < b);
/// assert_eq!(b.datacenter_id(), 1);
/// assert_eq!(b.worker_id(), 7);
/// ```
pub struct IdGenerator<T = SystemClock>
where
    T: TimeSource,
{
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<Mutex<State>>,
    #[cfg(not(feature = "cache-padded"))]
    state: Mutex<State>,
    datacenter_id: u64,
    worker_id: u64,
    epoch: u64,
    time: T,
}

impl IdGenerator<SystemClock> {
    /// Creates a generator on the system clock with the default
    /// [`TWITTER_EPOCH`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDatacenterId`] or [`Error::InvalidWorkerId`] if
    /// either ID does not fit in 5 bits (0 to 31).
    pub fn new(datacenter_id: u64, worker_id: u64) -> Result<Self> {
        Self::with_clock(datacenter_id, worker_id, SystemClock)
    }

    /// Creates a generator with datacenter and worker fixed to 0.
    ///
    /// # ⚠️ Note
    /// Uniqueness only holds within this one generator. Do not use this in
    /// any deployment where more than one process issues IDs into the same
    /// space.
    pub fn simple() -> Self {
        Self::build(0, 0, TWITTER_EPOCH_MILLIS, SystemClock)
    }
}

impl Default for IdGenerator<SystemClock> {
    fn default() -> Self {
        Self::simple()
    }
}

impl<T> IdGenerator<T>
where
    T: TimeSource,
{
    /// Creates a generator with the default [`TWITTER_EPOCH`] on the given
    /// clock.
    ///
    /// # Errors
    ///
    /// Returns an error if either ID does not fit in 5 bits, or
    /// [`Error::InvalidEpoch`] if the clock reads earlier than the epoch.
    pub fn with_clock(datacenter_id: u64, worker_id: u64, time: T) -> Result<Self> {
        Self::with_epoch(datacenter_id, worker_id, TWITTER_EPOCH, time)
    }

    /// Creates a generator with a custom epoch.
    ///
    /// The epoch is subtracted from every clock reading before encoding. It
    /// must be chosen once for an ID space and never changed: IDs issued
    /// against different epochs neither sort together nor stay unique.
    ///
    /// # Errors
    ///
    /// Returns an error if either ID does not fit in 5 bits, or
    /// [`Error::InvalidEpoch`] if `epoch` is later than the clock's current
    /// reading.
    ///
    /// # Example
    /// ```
    /// use guid::{IdGenerator, MonotonicClock, CUSTOM_EPOCH};
    ///
    /// let generator = IdGenerator::with_epoch(3, 4, CUSTOM_EPOCH, MonotonicClock::new()).unwrap();
    /// let id = generator.next_id().unwrap();
    /// assert!(id.unix_millis(CUSTOM_EPOCH).unwrap() >= CUSTOM_EPOCH.as_millis() as u64);
    /// ```
    pub fn with_epoch(datacenter_id: u64, worker_id: u64, epoch: Duration, time: T) -> Result<Self> {
        if datacenter_id > MAX_DATACENTER_ID {
            return Err(Error::InvalidDatacenterId {
                value: datacenter_id,
                max: MAX_DATACENTER_ID,
            });
        }
        if worker_id > MAX_WORKER_ID {
            return Err(Error::InvalidWorkerId {
                value: worker_id,
                max: MAX_WORKER_ID,
            });
        }
        let now = time.current_millis();
        let epoch = u64::try_from(epoch.as_millis())
            .ok()
            .filter(|&epoch| epoch <= now)
            .ok_or(Error::InvalidEpoch {
                epoch_millis: epoch.as_millis(),
                now,
            })?;
        Ok(Self::build(datacenter_id, worker_id, epoch, time))
    }

    fn build(datacenter_id: u64, worker_id: u64, epoch: u64, time: T) -> Self {
        let state = Mutex::new(State::default());
        Self {
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(state),
            #[cfg(not(feature = "cache-padded"))]
            state,
            datacenter_id,
            worker_id,
            epoch,
            time,
        }
    }

    pub fn datacenter_id(&self) -> u64 {
        self.datacenter_id
    }

    pub fn worker_id(&self) -> u64 {
        self.worker_id
    }

    /// The epoch IDs are encoded against.
    pub fn epoch(&self) -> Duration {
        Duration::from_millis(self.epoch)
    }

    /// Issues the next ID.
    ///
    /// When the 4096 sequence values of the current millisecond are used up,
    /// this spins on the clock until it advances. That only adds latency.
    ///
    /// # Errors
    ///
    /// - [`Error::ClockMovedBackward`] if the clock is behind the last issued
    ///   timestamp. Nothing is retried internally; the error carries the
    ///   timestamp the clock has to reach (see [`Error::retry_after`]).
    /// - [`Error::ClockBeforeEpoch`] or [`Error::TimestampOverflow`] if the
    ///   clock reading cannot be encoded against the epoch.
    /// - [`Error::LockPoisoned`] if another thread panicked inside the lock
    ///   (not with `parking-lot`).
    ///
    /// The generator state is untouched on every error path.
    ///
    /// # Example
    /// ```
    /// use guid::{Error, IdGenerator};
    ///
    /// let generator = IdGenerator::simple();
    ///
    /// let id = loop {
    ///     match generator.next_id() {
    ///         Ok(id) => break id,
    ///         Err(e @ Error::ClockMovedBackward { .. }) => {
    ///             std::thread::sleep(e.retry_after().unwrap_or_default());
    ///         }
    ///         Err(e) => panic!("generator error: {e}"),
    ///     }
    /// };
    /// assert_eq!(id.worker_id(), 0);
    /// ```
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "trace",
            skip(self),
            fields(datacenter_id = self.datacenter_id, worker_id = self.worker_id)
        )
    )]
    pub fn next_id(&self) -> Result<Guid> {
        let mut state = self.lock()?;
        let mut now = self.time.current_millis();
        let mut sequence = 0;

        if let Some(last_timestamp) = state.last_timestamp {
            match now.cmp(&last_timestamp) {
                Ordering::Equal => {
                    sequence = (state.sequence + 1) & MAX_SEQUENCE;
                    if sequence == 0 {
                        now = self.cold_wait_past(last_timestamp);
                    }
                }
                Ordering::Greater => {}
                Ordering::Less => return Err(Self::cold_clock_behind(now, last_timestamp)),
            }
        }

        let timestamp = self.encode_timestamp(now)?;
        state.last_timestamp = Some(now);
        state.sequence = sequence;

        Ok(Guid::from_components(
            timestamp,
            self.datacenter_id,
            self.worker_id,
            sequence,
        ))
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        #[cfg(feature = "parking-lot")]
        {
            Ok(self.state.lock())
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            Ok(self.state.lock()?)
        }
    }

    fn encode_timestamp(&self, now: u64) -> Result<u64> {
        let timestamp = now.checked_sub(self.epoch).ok_or(Error::ClockBeforeEpoch {
            now,
            epoch: self.epoch,
        })?;
        if timestamp > MAX_TIMESTAMP {
            return Err(Error::TimestampOverflow {
                now,
                max: self.epoch.saturating_add(MAX_TIMESTAMP),
            });
        }
        Ok(timestamp)
    }

    /// Spins until the clock reads past `last_timestamp` and returns that
    /// reading. The lock stays held so no other caller can issue meanwhile.
    #[cold]
    #[inline(never)]
    fn cold_wait_past(&self, last_timestamp: u64) -> u64 {
        #[cfg(feature = "tracing")]
        tracing::trace!(last_timestamp, "sequence exhausted, waiting for next millisecond");
        loop {
            core::hint::spin_loop();
            let now = self.time.current_millis();
            if now > last_timestamp {
                break now;
            }
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(now: u64, last_timestamp: u64) -> Error {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            now,
            last_timestamp,
            behind_ms = last_timestamp - now,
            "clock moved backward, refusing to issue"
        );
        Error::ClockMovedBackward {
            now,
            last_timestamp,
        }
    }
}

impl<T> Generator for IdGenerator<T>
where
    T: TimeSource,
{
    fn next_id(&self) -> Result<Guid> {
        self.next_id()
    }
}

impl<T> fmt::Debug for IdGenerator<T>
where
    T: TimeSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator")
            .field("datacenter_id", &self.datacenter_id)
            .field("worker_id", &self.worker_id)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}
