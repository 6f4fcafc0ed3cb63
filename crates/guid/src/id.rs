use core::{fmt, str::FromStr, time::Duration};

use crate::{Error, Result};

/// Number of bits allocated to the per-millisecond sequence.
pub const SEQUENCE_BITS: u64 = 12;

/// Number of bits allocated to the worker ID.
pub const WORKER_ID_BITS: u64 = 5;

/// Number of bits allocated to the datacenter ID.
pub const DATACENTER_ID_BITS: u64 = 5;

/// Number of bits allocated to the timestamp. The most significant bit is
/// reserved so every ID is a non-negative `i64`.
pub const TIMESTAMP_BITS: u64 = 64 - 1 - SEQUENCE_BITS - WORKER_ID_BITS - DATACENTER_ID_BITS;

pub const WORKER_ID_SHIFT: u64 = SEQUENCE_BITS;
pub const DATACENTER_ID_SHIFT: u64 = SEQUENCE_BITS + WORKER_ID_BITS;
pub const TIMESTAMP_SHIFT: u64 = SEQUENCE_BITS + WORKER_ID_BITS + DATACENTER_ID_BITS;

pub const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;
pub const MAX_WORKER_ID: u64 = (1 << WORKER_ID_BITS) - 1;
pub const MAX_DATACENTER_ID: u64 = (1 << DATACENTER_ID_BITS) - 1;

/// Largest timestamp delta (milliseconds since the epoch) that fits the layout.
///
/// With [`TWITTER_EPOCH`] the ID space is exhausted at
/// 2080-07-10T17:30:30.208Z.
///
/// [`TWITTER_EPOCH`]: crate::TWITTER_EPOCH
pub const MAX_TIMESTAMP: u64 = (1 << TIMESTAMP_BITS) - 1;

/// A 64-bit time-sortable ID.
///
/// ```text
///  Bit Index:  63           63 62            22 21              17 16          12 11             0
///              +--------------+----------------+------------------+--------------+---------------+
///  Field:      | reserved (1) | timestamp (41) | datacenter ID (5)| worker ID (5)| sequence (12) |
///              +--------------+----------------+------------------+--------------+---------------+
///              |<----------------- MSB ------------- 64 bits ------------- LSB ----------------->|
/// ```
///
/// The timestamp is measured in milliseconds since the generator's epoch.
/// Ordering on the raw value is ordering by timestamp, then datacenter, then
/// worker, then sequence.
///
/// # Example
///
/// ```
/// use guid::Guid;
///
/// let id = Guid::from_components(1000, 1, 1, 0);
/// assert_eq!(id.to_i64(), 4_194_439_168);
/// assert_eq!(id.timestamp(), 1000);
/// assert_eq!(id.datacenter_id(), 1);
/// assert_eq!(id.worker_id(), 1);
/// assert_eq!(id.sequence(), 0);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Guid {
    id: u64,
}

impl Guid {
    /// Packs the four fields into an ID. Each field is masked to its width.
    pub const fn from_components(
        timestamp: u64,
        datacenter_id: u64,
        worker_id: u64,
        sequence: u64,
    ) -> Self {
        let timestamp = (timestamp & MAX_TIMESTAMP) << TIMESTAMP_SHIFT;
        let datacenter_id = (datacenter_id & MAX_DATACENTER_ID) << DATACENTER_ID_SHIFT;
        let worker_id = (worker_id & MAX_WORKER_ID) << WORKER_ID_SHIFT;
        let sequence = sequence & MAX_SEQUENCE;
        Self {
            id: timestamp | datacenter_id | worker_id | sequence,
        }
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self { id: raw }
    }

    pub const fn to_raw(&self) -> u64 {
        self.id
    }

    /// Returns the ID as a signed integer, the representation most databases
    /// store it in.
    pub const fn to_i64(&self) -> i64 {
        self.id as i64
    }

    /// Returns `true` if the reserved bit is clear.
    pub const fn is_valid(&self) -> bool {
        self.id >> 63 == 0
    }

    /// Milliseconds since the epoch the ID was generated against.
    pub const fn timestamp(&self) -> u64 {
        (self.id >> TIMESTAMP_SHIFT) & MAX_TIMESTAMP
    }

    /// Milliseconds since the Unix epoch, given the epoch the ID was generated
    /// against.
    ///
    /// Returns `None` if the sum does not fit in a `u64`.
    pub fn unix_millis(&self, epoch: Duration) -> Option<u64> {
        u64::try_from(epoch.as_millis())
            .ok()?
            .checked_add(self.timestamp())
    }

    pub const fn datacenter_id(&self) -> u64 {
        (self.id >> DATACENTER_ID_SHIFT) & MAX_DATACENTER_ID
    }

    pub const fn worker_id(&self) -> u64 {
        (self.id >> WORKER_ID_SHIFT) & MAX_WORKER_ID
    }

    pub const fn sequence(&self) -> u64 {
        self.id & MAX_SEQUENCE
    }

    /// Returns the ID as a zero-padded 19-digit string, which sorts
    /// lexicographically in the same order as the numeric value.
    pub fn to_padded_string(&self) -> String {
        format!("{:019}", self.id)
    }
}

impl From<Guid> for u64 {
    fn from(id: Guid) -> Self {
        id.to_raw()
    }
}

impl From<Guid> for i64 {
    fn from(id: Guid) -> Self {
        id.to_i64()
    }
}

impl TryFrom<i64> for Guid {
    type Error = Error;

    fn try_from(raw: i64) -> Result<Self> {
        u64::try_from(raw)
            .map(Self::from_raw)
            .map_err(|_| Error::ParseGuid {
                input: raw.to_string(),
            })
    }
}

impl FromStr for Guid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse_err = || Error::ParseGuid {
            input: s.to_owned(),
        };
        let raw: i64 = s.trim().parse().map_err(|_| parse_err())?;
        Self::try_from(raw).map_err(|_| parse_err())
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guid")
            .field("id", &format_args!("{} (0x{:016x})", self.id, self.id))
            .field("timestamp", &self.timestamp())
            .field("datacenter_id", &self.datacenter_id())
            .field("worker_id", &self.worker_id())
            .field("sequence", &self.sequence())
            .finish()
    }
}
