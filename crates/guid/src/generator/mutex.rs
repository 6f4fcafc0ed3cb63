//! Lock type used by [`IdGenerator`](super::IdGenerator), switched by the
//! `parking-lot` feature. Not part of the public API:
//!
//! ```compile_fail
//! use guid::MutexGuard;
//! ```

#[cfg(not(feature = "parking-lot"))]
pub(crate) use std::sync::{Mutex, MutexGuard, PoisonError};

#[cfg(feature = "parking-lot")]
pub(crate) use parking_lot::{Mutex, MutexGuard};
