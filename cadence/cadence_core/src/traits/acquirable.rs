//! Permit-based blocking acquisition.
//!
//! [`Acquirable`] is the contract shared by every permit lock in Cadence.
//! The executor guards its lifecycle state with one, and callers can use the
//! same implementations for their own critical sections.
//!
//! # Examples
//!
//! ```
//! use cadence_core::error::{Error, Result};
//! use cadence_core::traits::Acquirable;
//! use cadence_core::types::Timeout;
//! use std::sync::Mutex;
//!
//! struct SpinPermit(Mutex<usize>);
//!
//! impl Acquirable for SpinPermit {
//!     fn available_permits(&self) -> usize {
//!         *self.0.lock().unwrap()
//!     }
//!
//!     fn acquire(&self) {
//!         while !self.try_acquire_for(Timeout::Immediate) {
//!             std::thread::yield_now();
//!         }
//!     }
//!
//!     fn try_acquire_for(&self, _timeout: Timeout) -> bool {
//!         let mut permits = self.0.lock().unwrap();
//!         if *permits == 0 {
//!             return false;
//!         }
//!         *permits -= 1;
//!         true
//!     }
//!
//!     fn release(&self) -> Result<()> {
//!         *self.0.lock().unwrap() += 1;
//!         Ok(())
//!     }
//! }
//!
//! let lock = SpinPermit(Mutex::new(1));
//! let value: Result<u32> = lock.with_permit(|| Ok(7));
//! assert_eq!(value.unwrap(), 7);
//! assert_eq!(lock.available_permits(), 1);
//! assert!(matches!(lock.try_acquire(-2), Err(Error::InvalidArgument(_))));
//! ```

use crate::error::{Error, Result};
use crate::types::Timeout;

/// A holder of permits offering blocking and bounded acquisition.
pub trait Acquirable: Send + Sync {
    /// Number of permits that can currently be taken. Never blocks.
    fn available_permits(&self) -> usize;

    /// Block until a permit is available, then take it.
    fn acquire(&self);

    /// Take a permit, waiting no longer than `timeout`.
    ///
    /// Returns `false` if the deadline passed first.
    fn try_acquire_for(&self, timeout: Timeout) -> bool;

    /// Return a permit.
    ///
    /// Implementations that track ownership fail with
    /// [`LockError`](crate::error::LockError) when the caller does not hold
    /// the permit. Implementations that do not track ownership always succeed.
    fn release(&self) -> Result<()>;

    /// Whether [`release`](Self::release) is restricted to the holder.
    fn enforces_ownership(&self) -> bool {
        false
    }

    /// Millisecond form of [`try_acquire_for`](Self::try_acquire_for).
    ///
    /// `0` attempts without blocking, a positive value bounds the wait and
    /// `-1` waits indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when `timeout_ms < -1`.
    fn try_acquire(&self, timeout_ms: i64) -> Result<bool> {
        let timeout = Timeout::from_millis(timeout_ms)?;
        Ok(self.try_acquire_for(timeout))
    }

    /// Run `f` while holding a permit.
    ///
    /// The permit is released on every exit path, including a panic inside
    /// `f`, before an error from `f` is handed back.
    fn with_permit<R, E, F>(&self, f: F) -> std::result::Result<R, E>
    where
        Self: Sized,
        F: FnOnce() -> std::result::Result<R, E>,
        E: From<Error>,
    {
        let guard = self.guard();
        let outcome = f();
        guard.release().map_err(E::from)?;
        outcome
    }

    /// Acquire a permit and return a guard that releases it when dropped.
    fn guard(&self) -> PermitGuard<'_, Self>
    where
        Self: Sized,
    {
        self.acquire();
        PermitGuard {
            lock: self,
            armed: true,
        }
    }
}

/// RAII guard returned by [`Acquirable::guard`].
#[must_use = "the permit is released as soon as the guard is dropped"]
pub struct PermitGuard<'a, A: Acquirable> {
    lock: &'a A,
    armed: bool,
}

impl<A: Acquirable> PermitGuard<'_, A> {
    /// Release the permit now, reporting any release error.
    pub fn release(mut self) -> Result<()> {
        self.armed = false;
        self.lock.release()
    }
}

impl<A: Acquirable> Drop for PermitGuard<'_, A> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.lock.release() {
                log::error!("Failed to release permit on drop: {}", e);
            }
        }
    }
}
