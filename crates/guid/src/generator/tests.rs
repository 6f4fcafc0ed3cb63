use crate::{
    Error, Generator, Guid, IdGenerator, MAX_DATACENTER_ID, MAX_SEQUENCE, MAX_TIMESTAMP,
    MAX_WORKER_ID, MonotonicClock, SystemClock, TWITTER_EPOCH, TimeSource,
};
use core::time::Duration;
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::thread::scope;

const EPOCH: u64 = TWITTER_EPOCH.as_millis() as u64;

/// One second past the epoch.
const T0: u64 = EPOCH + 1000;

struct MockTime {
    millis: u64,
}

impl TimeSource for MockTime {
    fn current_millis(&self) -> u64 {
        self.millis
    }
}

#[derive(Clone)]
struct SharedMockTime {
    millis: Rc<Cell<u64>>,
}

impl SharedMockTime {
    fn at(millis: u64) -> Self {
        Self {
            millis: Rc::new(Cell::new(millis)),
        }
    }

    fn set(&self, millis: u64) {
        self.millis.set(millis);
    }
}

impl TimeSource for SharedMockTime {
    fn current_millis(&self) -> u64 {
        self.millis.get()
    }
}

/// Reports `base` for the first `hold_for` reads, then `base + 1`.
struct HeldTime {
    base: u64,
    hold_for: u64,
    reads: Cell<u64>,
}

impl TimeSource for HeldTime {
    fn current_millis(&self) -> u64 {
        let reads = self.reads.get() + 1;
        self.reads.set(reads);
        if reads <= self.hold_for {
            self.base
        } else {
            self.base + 1
        }
    }
}

fn run_id_sequence_increments_within_same_tick<G: Generator>(generator: &G) {
    let id1 = generator.next_id().unwrap();
    let id2 = generator.next_id().unwrap();
    let id3 = generator.next_id().unwrap();

    assert_eq!(id1.timestamp(), 1000);
    assert_eq!(id2.timestamp(), 1000);
    assert_eq!(id3.timestamp(), 1000);
    assert_eq!(id1.sequence(), 0);
    assert_eq!(id2.sequence(), 1);
    assert_eq!(id3.sequence(), 2);
    assert!(id1 < id2 && id2 < id3);
}

fn run_generator_monotonic<G: Generator>(generator: &G, datacenter_id: u64, worker_id: u64) {
    const TOTAL_IDS: usize = 4096 * 64;

    let mut last: Option<Guid> = None;
    for _ in 0..TOTAL_IDS {
        let id = generator.next_id().unwrap();
        assert_eq!(id.datacenter_id(), datacenter_id);
        assert_eq!(id.worker_id(), worker_id);

        if let Some(prev) = last {
            assert!(id > prev);
            assert!(id.timestamp() >= prev.timestamp());
            if id.timestamp() == prev.timestamp() {
                assert_eq!(id.sequence(), prev.sequence() + 1);
            } else {
                assert_eq!(id.sequence(), 0);
            }
        }
        last = Some(id);
    }
}

fn run_generator_threaded_unique<G>(generator: &G, threads: usize, ids_per_thread: usize)
where
    G: Generator + Sync,
{
    let total = threads * ids_per_thread;
    let seen_ids = Arc::new(Mutex::new(HashSet::with_capacity(total)));

    scope(|s| {
        for _ in 0..threads {
            let seen_ids = Arc::clone(&seen_ids);
            s.spawn(move || {
                let mut local = Vec::with_capacity(ids_per_thread);
                for _ in 0..ids_per_thread {
                    local.push(generator.next_id().unwrap());
                }
                // Each caller observes its own IDs in increasing order.
                assert!(local.windows(2).all(|w| w[0] < w[1]));

                let mut seen = seen_ids.lock().unwrap();
                for id in local {
                    assert!(seen.insert(id), "duplicate id {id:?}");
                }
            });
        }
    });

    let final_count = seen_ids.lock().unwrap().len();
    assert_eq!(final_count, total, "Expected {total} unique IDs");
}

#[test]
fn sequence_increments_within_same_tick() {
    let generator = IdGenerator::with_clock(0, 0, MockTime { millis: T0 }).unwrap();
    run_id_sequence_increments_within_same_tick(&generator);
}

#[test]
fn composes_reference_id() {
    let generator = IdGenerator::with_clock(1, 1, MockTime { millis: T0 }).unwrap();
    let id = generator.next_id().unwrap();
    assert_eq!(id.to_i64(), 4_194_439_168);
    assert_eq!(i64::from(id), (1000 << 22) | (1 << 17) | (1 << 12));
}

#[test]
fn first_call_accepts_the_epoch_itself() {
    let generator = IdGenerator::with_clock(0, 0, MockTime { millis: EPOCH }).unwrap();
    let id = generator.next_id().unwrap();
    assert_eq!(id.to_raw(), 0);
}

#[test]
fn sequence_resets_when_clock_advances() {
    let clock = SharedMockTime::at(T0);
    let generator = IdGenerator::with_clock(2, 3, clock.clone()).unwrap();

    assert_eq!(generator.next_id().unwrap().sequence(), 0);
    assert_eq!(generator.next_id().unwrap().sequence(), 1);

    clock.set(T0 + 5);
    let id = generator.next_id().unwrap();
    assert_eq!(id.timestamp(), 1005);
    assert_eq!(id.sequence(), 0);
}

#[test]
fn rollover_waits_for_next_millisecond() {
    const CALLS: u64 = 5000;
    let per_tick = MAX_SEQUENCE + 1;

    let clock = HeldTime {
        base: T0,
        hold_for: per_tick + 16,
        reads: Cell::new(0),
    };
    let generator = IdGenerator::with_clock(1, 2, &clock).unwrap();
    let ids: Vec<Guid> = (0..CALLS).map(|_| generator.next_id().unwrap()).collect();

    let first_tick: Vec<&Guid> = ids.iter().filter(|id| id.timestamp() == 1000).collect();
    assert_eq!(first_tick.len() as u64, per_tick);
    for (expected, id) in first_tick.iter().enumerate() {
        assert_eq!(id.sequence(), expected as u64);
    }

    // The call that exhausted the tick spun on the clock instead of failing.
    let rolled = ids[per_tick as usize];
    assert_eq!(rolled.timestamp(), 1001);
    assert_eq!(rolled.sequence(), 0);
    assert!(clock.reads.get() > CALLS);

    assert_eq!(ids.last().unwrap().sequence(), CALLS - per_tick - 1);
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(ids.iter().collect::<HashSet<_>>().len() as u64, CALLS);
}

#[test]
fn backward_clock_is_rejected_without_mutation() {
    let clock = SharedMockTime::at(T0);
    let generator = IdGenerator::with_clock(0, 0, clock.clone()).unwrap();

    let id = generator.next_id().unwrap();
    assert_eq!(id.sequence(), 0);

    clock.set(T0 - 3);
    let err = generator.next_id().unwrap_err();
    assert_eq!(
        err,
        Error::ClockMovedBackward {
            now: T0 - 3,
            last_timestamp: T0,
        }
    );
    assert_eq!(err.retry_after(), Some(Duration::from_millis(3)));

    // Still rejected on repeated attempts.
    assert!(generator.next_id().is_err());

    // Once the clock catches up the sequence continues where it left off.
    clock.set(T0);
    let id = generator.next_id().unwrap();
    assert_eq!(id.timestamp(), 1000);
    assert_eq!(id.sequence(), 1);
}

#[test]
fn rejects_out_of_range_identity() {
    assert_eq!(
        IdGenerator::new(MAX_DATACENTER_ID + 1, 0).unwrap_err(),
        Error::InvalidDatacenterId { value: 32, max: 31 }
    );
    assert_eq!(
        IdGenerator::new(0, MAX_WORKER_ID + 1).unwrap_err(),
        Error::InvalidWorkerId { value: 32, max: 31 }
    );
    assert!(IdGenerator::new(MAX_DATACENTER_ID, MAX_WORKER_ID).is_ok());
}

#[test]
fn every_identity_pair_round_trips() {
    for datacenter_id in 0..=MAX_DATACENTER_ID {
        for worker_id in 0..=MAX_WORKER_ID {
            let generator =
                IdGenerator::with_clock(datacenter_id, worker_id, MockTime { millis: T0 }).unwrap();
            assert_eq!(generator.datacenter_id(), datacenter_id);
            assert_eq!(generator.worker_id(), worker_id);

            let id = generator.next_id().unwrap();
            assert_eq!(id.datacenter_id(), datacenter_id);
            assert_eq!(id.worker_id(), worker_id);
            assert_eq!(id.timestamp(), 1000);
        }
    }
}

#[test]
fn rejects_clock_before_epoch() {
    let clock = SharedMockTime::at(EPOCH);
    let generator = IdGenerator::with_clock(0, 0, clock.clone()).unwrap();

    clock.set(EPOCH - 1);
    assert_eq!(
        generator.next_id().unwrap_err(),
        Error::ClockBeforeEpoch {
            now: EPOCH - 1,
            epoch: EPOCH,
        }
    );
}

#[test]
fn rejects_epoch_after_the_clock() {
    let err = IdGenerator::with_clock(0, 0, MockTime { millis: EPOCH - 1 }).unwrap_err();
    assert_eq!(
        err,
        Error::InvalidEpoch {
            epoch_millis: u128::from(EPOCH),
            now: EPOCH - 1,
        }
    );

    let far = Duration::from_millis(u64::MAX) + Duration::from_millis(1);
    let err = IdGenerator::with_epoch(0, 0, far, MockTime { millis: T0 }).unwrap_err();
    assert_eq!(
        err,
        Error::InvalidEpoch {
            epoch_millis: u128::from(u64::MAX) + 1,
            now: T0,
        }
    );
}

#[test]
fn timestamp_overflow_is_an_error_and_leaves_state_alone() {
    let last_valid = EPOCH + MAX_TIMESTAMP;
    let clock = SharedMockTime::at(last_valid);
    let generator = IdGenerator::with_clock(0, 0, clock.clone()).unwrap();

    let id = generator.next_id().unwrap();
    assert_eq!(id.timestamp(), MAX_TIMESTAMP);
    assert!(id.is_valid());

    clock.set(last_valid + 1);
    assert_eq!(
        generator.next_id().unwrap_err(),
        Error::TimestampOverflow {
            now: last_valid + 1,
            max: last_valid,
        }
    );

    clock.set(last_valid);
    assert_eq!(generator.next_id().unwrap().sequence(), 1);
}

#[test]
fn custom_epoch_shifts_timestamps() {
    let epoch = Duration::from_millis(T0);
    let generator = IdGenerator::with_epoch(0, 0, epoch, MockTime { millis: T0 + 7 }).unwrap();
    assert_eq!(generator.epoch(), epoch);

    let id = generator.next_id().unwrap();
    assert_eq!(id.timestamp(), 7);
    assert_eq!(id.unix_millis(epoch), Some(T0 + 7));
}

#[test]
fn simple_generator_uses_zero_identity() {
    let generator = IdGenerator::simple();
    let id = generator.next_id().unwrap();
    assert_eq!(id.datacenter_id(), 0);
    assert_eq!(id.worker_id(), 0);
    assert_eq!(generator.epoch(), TWITTER_EPOCH);

    let default = IdGenerator::default();
    assert_eq!(default.datacenter_id(), 0);
    assert_eq!(default.worker_id(), 0);
}

#[test]
fn system_clock_generator_is_monotonic() {
    let generator = IdGenerator::with_clock(5, 9, SystemClock).unwrap();
    run_generator_monotonic(&generator, 5, 9);
}

#[test]
fn monotonic_clock_generator_is_monotonic() {
    let generator = IdGenerator::with_clock(31, 31, MonotonicClock::new()).unwrap();
    run_generator_monotonic(&generator, 31, 31);
}

#[test]
fn concurrent_callers_never_share_an_id() {
    let generator = IdGenerator::new(1, 1).unwrap();
    run_generator_threaded_unique(&generator, 10, 1000);
}

#[test]
fn concurrent_callers_on_shared_monotonic_clock() {
    let generator = IdGenerator::with_clock(0, 4, MonotonicClock::new()).unwrap();
    run_generator_threaded_unique(&generator, 8, 4096 * 4);
}

#[test]
fn generator_is_usable_behind_arc() {
    let generator = Arc::new(IdGenerator::new(3, 3).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let generator = Arc::clone(&generator);
            std::thread::spawn(move || generator.next_id().unwrap())
        })
        .collect();

    let ids: HashSet<Guid> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(ids.len(), 4);
}

#[test]
fn debug_omits_mutable_state() {
    let generator = IdGenerator::with_clock(1, 2, MockTime { millis: T0 }).unwrap();
    let rendered = format!("{generator:?}");
    assert!(rendered.contains("datacenter_id: 1"));
    assert!(rendered.contains("worker_id: 2"));
    assert!(!rendered.contains("sequence"));
}

/// Panics on every read once `armed` is set.
#[cfg(not(feature = "parking-lot"))]
struct PanickingTime {
    armed: Cell<bool>,
}

#[cfg(not(feature = "parking-lot"))]
impl TimeSource for PanickingTime {
    fn current_millis(&self) -> u64 {
        assert!(!self.armed.get(), "clock failure");
        T0
    }
}

#[cfg(not(feature = "parking-lot"))]
#[test]
fn panic_inside_the_lock_poisons_the_generator() {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    let clock = PanickingTime {
        armed: Cell::new(false),
    };
    let generator = IdGenerator::with_clock(0, 0, &clock).unwrap();
    assert!(generator.next_id().is_ok());

    clock.armed.set(true);
    assert!(catch_unwind(AssertUnwindSafe(|| generator.next_id())).is_err());

    clock.armed.set(false);
    assert_eq!(generator.next_id().unwrap_err(), Error::LockPoisoned);
}
