//! Synchronization primitives.
//!
//! - Permit locks implementing [`Acquirable`](cadence_core::traits::Acquirable),
//!   with bounded waits and statistics
//! - One-way atomic flags and sequence counters

pub mod atomic;
pub mod lock;

pub use atomic::{AtomicFlag, AtomicSequence};
pub use lock::{LockStats, OwnedLock, Semaphore};
