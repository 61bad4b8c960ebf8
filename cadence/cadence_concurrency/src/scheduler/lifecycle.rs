//! Executor lifecycle state machine.
//!
//! State lives in an atomic but every read and write goes through the
//! executor's [`OwnedLock`], so a submission's "is it running?" check and
//! the registration that follows cannot interleave with `stop()`.

use cadence_core::error::Result;
use cadence_core::id::ExecutorId;
use cadence_core::traits::Acquirable;
use cadence_core::types::{ExecutorState, Timeout};
use log::{debug, info};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use crate::sync::OwnedLock;

pub(crate) struct Lifecycle {
    executor_id: ExecutorId,
    lock: OwnedLock,
    state: AtomicU8,
    stopped: Mutex<bool>,
    stopped_cv: Condvar,
}

impl Lifecycle {
    pub(crate) fn new(executor_id: ExecutorId) -> Self {
        Self {
            executor_id,
            lock: OwnedLock::with_name(format!("executor-{}", executor_id.short())),
            state: AtomicU8::new(ExecutorState::Running.as_u8()),
            stopped: Mutex::new(false),
            stopped_cv: Condvar::new(),
        }
    }

    /// Current state, read under the permit.
    pub(crate) fn state(&self) -> ExecutorState {
        let _permit = self.lock.guard();
        self.load()
    }

    /// Run `f` with the permit held and the state it observed.
    ///
    /// `f` must not call back into this lifecycle; the lock is not reentrant.
    pub(crate) fn guarded<R>(&self, f: impl FnOnce(ExecutorState) -> Result<R>) -> Result<R> {
        self.lock.with_permit(|| f(self.load()))
    }

    /// `RUNNING -> STOPPING`. Returns `false` if the executor was not running.
    pub(crate) fn begin_stop(&self) -> bool {
        let _permit = self.lock.guard();
        self.transition(ExecutorState::Running, ExecutorState::Stopping)
    }

    /// `STOPPING -> STOPPED`, waking anyone in [`await_stopped`](Self::await_stopped).
    ///
    /// Called by a strategy once nothing is in flight. Idempotent.
    pub(crate) fn finish_stop(&self) {
        let finished = {
            let _permit = self.lock.guard();
            self.transition(ExecutorState::Stopping, ExecutorState::Stopped)
        };

        if finished {
            *self.stopped.lock() = true;
            self.stopped_cv.notify_all();
            info!("Executor {} stopped", self.executor_id);
        }
    }

    /// Block until the state reaches `STOPPED`. Returns whether it did.
    pub(crate) fn await_stopped(&self, timeout: Timeout) -> bool {
        let deadline = timeout.deadline_from(Instant::now());
        let mut stopped = self.stopped.lock();
        while !*stopped {
            match deadline {
                None => self.stopped_cv.wait(&mut stopped),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return false;
                    }
                    self.stopped_cv.wait_until(&mut stopped, deadline);
                }
            }
        }
        true
    }

    fn load(&self) -> ExecutorState {
        ExecutorState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Caller must hold the permit.
    fn transition(&self, from: ExecutorState, to: ExecutorState) -> bool {
        debug_assert!(from.can_transition_to(to));
        if self.load() != from {
            return false;
        }
        self.state.store(to.as_u8(), Ordering::SeqCst);
        debug!("Executor {}: {} -> {}", self.executor_id, from, to);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::error::Error;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_transitions_are_monotonic() {
        let lifecycle = Lifecycle::new(ExecutorId::new());
        assert_eq!(lifecycle.state(), ExecutorState::Running);

        // Cannot finish before stopping
        lifecycle.finish_stop();
        assert_eq!(lifecycle.state(), ExecutorState::Running);

        assert!(lifecycle.begin_stop());
        assert!(!lifecycle.begin_stop());
        assert_eq!(lifecycle.state(), ExecutorState::Stopping);

        lifecycle.finish_stop();
        lifecycle.finish_stop();
        assert_eq!(lifecycle.state(), ExecutorState::Stopped);
        assert!(!lifecycle.begin_stop());
    }

    #[test]
    fn test_guarded_sees_state_and_releases() {
        let lifecycle = Lifecycle::new(ExecutorId::new());
        let seen = lifecycle.guarded(Ok).unwrap();
        assert_eq!(seen, ExecutorState::Running);

        let failed: Result<()> =
            lifecycle.guarded(|state| Err(Error::ExecutorStopped(state)));
        assert!(failed.is_err());

        // Permit was released on the error path
        assert!(lifecycle.begin_stop());
    }

    #[test]
    fn test_await_stopped() {
        let lifecycle = Arc::new(Lifecycle::new(ExecutorId::new()));
        assert!(!lifecycle.await_stopped(Timeout::Immediate));
        assert!(!lifecycle.await_stopped(Timeout::Bounded(Duration::from_millis(10))));

        lifecycle.begin_stop();
        let finisher = {
            let lifecycle = lifecycle.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                lifecycle.finish_stop();
            })
        };

        assert!(lifecycle.await_stopped(Timeout::Unbounded));
        finisher.join().unwrap();
    }
}
