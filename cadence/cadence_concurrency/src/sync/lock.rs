//! Permit locks with bounded waits and statistics.
//!
//! Two [`Acquirable`] implementations:
//!
//! - [`Semaphore`]: a counting lock with `N` permits. Ownership is not
//!   tracked, so any thread may release; a release when every permit is
//!   already free is a no-op.
//! - [`OwnedLock`]: a single permit bound to the thread that took it. Only
//!   that thread may release it. The executor guards its lifecycle with one.
//!
//! Both park waiting threads on a condition variable and keep acquisition
//! statistics in the same shape.

use cadence_core::error::{LockError, Result};
use cadence_core::traits::Acquirable;
use cadence_core::types::Timeout;
use log::{trace, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Statistics about lock usage
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LockStats {
    /// Number of successful permit acquisitions
    pub acquisition_count: usize,

    /// Number of acquisition attempts that gave up
    pub failed_count: usize,

    /// Number of releases
    pub release_count: usize,

    /// Total time spent waiting for permits (microseconds)
    pub total_wait_time_us: u64,

    /// Maximum time spent waiting for a single permit (microseconds)
    pub max_wait_time_us: u64,
}

/// Shared counters behind [`LockStats`]
#[derive(Debug, Default)]
struct LockCounters {
    acquisition_count: AtomicUsize,
    failed_count: AtomicUsize,
    release_count: AtomicUsize,
    total_wait_time_us: AtomicUsize,
    max_wait_time_us: AtomicUsize,
}

impl LockCounters {
    fn record_acquired(&self, name: &str, waited: Duration) {
        let wait_time_us = waited.as_micros() as usize;
        self.total_wait_time_us
            .fetch_add(wait_time_us, Ordering::Relaxed);
        self.acquisition_count.fetch_add(1, Ordering::Relaxed);

        let mut current_max = self.max_wait_time_us.load(Ordering::Relaxed);
        while wait_time_us > current_max {
            match self.max_wait_time_us.compare_exchange(
                current_max,
                wait_time_us,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_max = actual,
            }
        }

        trace!(
            "Permit acquired: {} (wait time: {:.2}ms)",
            name,
            waited.as_secs_f64() * 1000.0
        );
    }

    fn record_failed(&self, name: &str, timeout: Timeout, waited: Duration) {
        self.failed_count.fetch_add(1, Ordering::Relaxed);
        if !timeout.is_immediate() {
            warn!(
                "Permit timeout: {} (waited: {:.2}ms)",
                name,
                waited.as_secs_f64() * 1000.0
            );
        }
    }

    fn snapshot(&self) -> LockStats {
        LockStats {
            acquisition_count: self.acquisition_count.load(Ordering::Relaxed),
            failed_count: self.failed_count.load(Ordering::Relaxed),
            release_count: self.release_count.load(Ordering::Relaxed),
            total_wait_time_us: self.total_wait_time_us.load(Ordering::Relaxed) as u64,
            max_wait_time_us: self.max_wait_time_us.load(Ordering::Relaxed) as u64,
        }
    }
}

/// Park on `condvar` until `ready` holds or the timeout expires.
///
/// Returns `true` if `ready` held before the deadline.
fn wait_until_ready<T>(
    guard: &mut MutexGuard<'_, T>,
    condvar: &Condvar,
    timeout: Timeout,
    start: Instant,
    ready: impl Fn(&T) -> bool,
) -> bool {
    let deadline = timeout.deadline_from(start);
    while !ready(&**guard) {
        match deadline {
            None => condvar.wait(guard),
            Some(deadline) => {
                if Instant::now() >= deadline {
                    return false;
                }
                condvar.wait_until(guard, deadline);
            }
        }
    }
    true
}

/// A counting permit lock.
///
/// Release is always legal: the lock does not track which thread holds a
/// permit, and releasing while all permits are free leaves the count at
/// capacity.
pub struct Semaphore {
    permits: Mutex<usize>,
    capacity: usize,
    available: Condvar,
    stats: LockCounters,
    name: Option<String>,
}

impl Semaphore {
    /// Create a semaphore with `permits` free permits.
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            capacity: permits,
            available: Condvar::new(),
            stats: LockCounters::default(),
            name: None,
        }
    }

    /// Create a semaphore with a name used in log output.
    pub fn with_name(permits: usize, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(permits)
        }
    }

    /// Maximum number of permits.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the statistics for this lock
    pub fn stats(&self) -> LockStats {
        self.stats.snapshot()
    }

    /// Get the name of this lock
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }
}

impl Acquirable for Semaphore {
    fn available_permits(&self) -> usize {
        *self.permits.lock()
    }

    fn acquire(&self) {
        self.try_acquire_for(Timeout::Unbounded);
    }

    fn try_acquire_for(&self, timeout: Timeout) -> bool {
        let start = Instant::now();
        let mut permits = self.permits.lock();

        if !wait_until_ready(&mut permits, &self.available, timeout, start, |p| *p > 0) {
            self.stats.record_failed(self.label(), timeout, start.elapsed());
            return false;
        }

        *permits -= 1;
        drop(permits);
        self.stats.record_acquired(self.label(), start.elapsed());
        true
    }

    fn release(&self) -> Result<()> {
        let mut permits = self.permits.lock();
        if *permits < self.capacity {
            *permits += 1;
        }
        drop(permits);

        self.stats.release_count.fetch_add(1, Ordering::Relaxed);
        self.available.notify_one();
        trace!("Permit released: {}", self.label());
        Ok(())
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new(1)
    }
}

/// A single-permit lock owned by the thread that acquired it.
///
/// The lock is not reentrant: a thread that already holds the permit and
/// acquires again waits forever.
pub struct OwnedLock {
    owner: Mutex<Option<ThreadId>>,
    available: Condvar,
    stats: LockCounters,
    name: Option<String>,
}

impl OwnedLock {
    /// Create an unheld lock.
    pub fn new() -> Self {
        Self {
            owner: Mutex::new(None),
            available: Condvar::new(),
            stats: LockCounters::default(),
            name: None,
        }
    }

    /// Create an unheld lock with a name used in log output.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new()
        }
    }

    /// Thread currently holding the permit, if any.
    pub fn owner(&self) -> Option<ThreadId> {
        *self.owner.lock()
    }

    /// Whether the calling thread holds the permit.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.owner() == Some(thread::current().id())
    }

    /// Get the statistics for this lock
    pub fn stats(&self) -> LockStats {
        self.stats.snapshot()
    }

    /// Get the name of this lock
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }
}

impl Acquirable for OwnedLock {
    fn available_permits(&self) -> usize {
        usize::from(self.owner.lock().is_none())
    }

    fn acquire(&self) {
        self.try_acquire_for(Timeout::Unbounded);
    }

    fn try_acquire_for(&self, timeout: Timeout) -> bool {
        let start = Instant::now();
        let mut owner = self.owner.lock();

        if !wait_until_ready(&mut owner, &self.available, timeout, start, Option::is_none) {
            self.stats.record_failed(self.label(), timeout, start.elapsed());
            return false;
        }

        *owner = Some(thread::current().id());
        drop(owner);
        self.stats.record_acquired(self.label(), start.elapsed());
        true
    }

    fn release(&self) -> Result<()> {
        let caller = thread::current().id();
        let mut owner = self.owner.lock();

        match *owner {
            None => return Err(LockError::NotHeld(caller).into()),
            Some(holder) if holder != caller => {
                return Err(LockError::OwnershipViolation {
                    owner: holder,
                    caller,
                }
                .into())
            }
            Some(_) => *owner = None,
        }
        drop(owner);

        self.stats.release_count.fetch_add(1, Ordering::Relaxed);
        self.available.notify_one();
        trace!("Permit released: {}", self.label());
        Ok(())
    }

    fn enforces_ownership(&self) -> bool {
        true
    }
}

impl Default for OwnedLock {
    fn default() -> Self {
        Self::new()
    }
}
