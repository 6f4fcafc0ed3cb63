use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

/// Twitter epoch: Thursday, November 4, 2010 1:42:54.657 UTC
///
/// The default epoch for every generator.
pub const TWITTER_EPOCH: Duration = Duration::from_millis(1_288_834_974_657);

/// Discord epoch: Thursday, January 1, 2015 00:00:00 UTC
pub const DISCORD_EPOCH: Duration = Duration::from_millis(1_420_070_400_000);

/// Custom epoch: Wednesday, January 1, 2025 00:00:00 UTC
pub const CUSTOM_EPOCH: Duration = Duration::from_millis(1_735_689_600_000);

/// A source of wall-clock time.
///
/// This abstraction allows you to plug in the system clock, a monotonic
/// clock, or a mocked time source in tests.
///
/// Implementations return **milliseconds since the Unix epoch**. The
/// generator subtracts its own epoch before encoding.
///
/// # Example
///
/// ```
/// use guid::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> u64 {
///         1_288_834_975_657
///     }
/// }
///
/// assert_eq!(FixedTime.current_millis(), 1_288_834_975_657);
/// ```
pub trait TimeSource {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn current_millis(&self) -> u64;
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn current_millis(&self) -> u64 {
        (**self).current_millis()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn current_millis(&self) -> u64 {
        (**self).current_millis()
    }
}

/// The operating system's wall clock.
///
/// Each reading is a `SystemTime::now()` call, so NTP corrections and VM
/// migrations are visible to the generator as backward clock movement.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64)
    }
}

/// A clock that is anchored to the wall clock once and then advanced with a
/// monotonic timer.
///
/// Readings never move backward, even if the system clock is adjusted
/// externally. The trade-off is that a process running for a long time drifts
/// away from wall-clock time by however much the system clock was corrected.
///
/// Cloning is cheap and every clone shares the same anchor.
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    inner: Arc<Anchor>,
}

#[derive(Debug)]
struct Anchor {
    start: Instant,
    unix_millis: u64,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Anchors a new clock at the current wall-clock time.
    pub fn new() -> Self {
        Self::anchored_at(SystemClock.current_millis())
    }

    /// Anchors a new clock at the given Unix millisecond timestamp.
    pub fn anchored_at(unix_millis: u64) -> Self {
        Self {
            inner: Arc::new(Anchor {
                start: Instant::now(),
                unix_millis,
            }),
        }
    }
}

impl TimeSource for MonotonicClock {
    fn current_millis(&self) -> u64 {
        self.inner.unix_millis + self.inner.start.elapsed().as_millis() as u64
    }
}
