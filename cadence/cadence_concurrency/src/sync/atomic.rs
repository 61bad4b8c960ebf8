//! Atomic flags and sequences.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A flag that starts unset and can only ever be set.
///
/// Used for one-way transitions such as task cancellation: once a reader
/// observes the flag set, every later read observes it set too.
#[derive(Debug, Default)]
pub struct AtomicFlag {
    flag: AtomicBool,
}

impl AtomicFlag {
    /// Create an unset flag.
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// Set the flag.
    ///
    /// Returns true if the flag was set by this call, false if it was already set.
    pub fn set(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    /// Get the current state of the flag.
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A sequence number that can be safely incremented across threads.
#[derive(Debug, Default)]
pub struct AtomicSequence {
    value: AtomicU64,
}

impl AtomicSequence {
    /// Create a new atomic sequence starting from the specified value.
    pub const fn new(start: u64) -> Self {
        Self {
            value: AtomicU64::new(start),
        }
    }

    /// Get the next sequence number.
    pub fn next(&self) -> u64 {
        self.value.fetch_add(1, Ordering::Relaxed)
    }

    /// Get the current sequence number without incrementing.
    pub fn current(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}
