//! Result publication and task handles.
//!
//! [`ResultCell`] is the single-slot container a running task writes into and
//! consumers read or block on. [`TaskFuture`] pairs a cell with the task's
//! schedule, its cancellation flag and a weak reference to the executor that
//! accepted it.

use cadence_core::error::Result;
use cadence_core::id::TaskId;
use cadence_core::types::{ExecutorState, FutureResult, ResultEvent, Schedule, Timeout};
use log::{debug, error, trace};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use crate::scheduler::executor::ExecutorShared;
use crate::scheduler::strategy::Job;
use crate::scheduler::task::{panic_message, Task};
use crate::sync::AtomicFlag;

/// Contents of a [`ResultCell`], always updated as a whole.
struct Slot<T> {
    result: FutureResult<T>,
    runs: u64,
    running: bool,
    closed: bool,
}

/// A thread-safe single-slot result container.
///
/// The slot starts at [`FutureResult::None`] and is overwritten on each
/// completion. Readers always see a whole outcome: the slot is replaced under
/// its own mutex, and waiters are woken only after the write is visible.
pub struct ResultCell<T> {
    slot: Mutex<Slot<T>>,
    changed: Condvar,
}

impl<T: Clone> ResultCell<T> {
    /// Create an empty cell.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                result: FutureResult::None,
                runs: 0,
                running: false,
                closed: false,
            }),
            changed: Condvar::new(),
        }
    }

    /// Snapshot of the current outcome. Never blocks on a running task.
    pub fn result(&self) -> FutureResult<T> {
        self.slot.lock().result.clone()
    }

    /// Number of completions published so far.
    pub fn runs(&self) -> u64 {
        self.slot.lock().runs
    }

    /// Record that a run has started. Cleared by the matching `complete`.
    pub(crate) fn begin(&self) {
        self.slot.lock().running = true;
    }

    /// Publish an outcome and wake every waiter. Returns the new run count.
    pub(crate) fn complete(&self, result: FutureResult<T>) -> u64 {
        let runs = {
            let mut slot = self.slot.lock();
            slot.result = result;
            slot.runs += 1;
            slot.running = false;
            slot.runs
        };
        self.changed.notify_all();
        runs
    }

    /// Mark that no further completions will arrive and wake every waiter.
    pub(crate) fn close(&self) {
        self.slot.lock().closed = true;
        self.changed.notify_all();
    }

    /// Close the cell unless a run is in progress. Returns whether it closed.
    ///
    /// A run that is already executing will still publish, so waiters keep
    /// waiting for it.
    pub(crate) fn close_if_idle(&self) -> bool {
        {
            let mut slot = self.slot.lock();
            if slot.running {
                return false;
            }
            slot.closed = true;
        }
        self.changed.notify_all();
        true
    }

    /// Block until `ready` holds, the cell is closed, or the timeout expires,
    /// then return the current outcome.
    ///
    /// The predicate is re-checked on every wake-up and at least once per
    /// `resolution`.
    fn wait_until(
        &self,
        timeout: Timeout,
        resolution: Duration,
        ready: impl Fn(&Slot<T>) -> bool,
    ) -> FutureResult<T> {
        let deadline = timeout.deadline_from(Instant::now());
        let mut slot = self.slot.lock();

        while !ready(&*slot) && !slot.closed {
            let tick = match deadline {
                None => resolution,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    resolution.min(deadline - now)
                }
            };
            self.changed.wait_for(&mut slot, tick);
        }

        slot.result.clone()
    }
}

impl<T: Clone> Default for ResultCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state behind a [`TaskFuture`]; also the [`Job`] strategies run.
pub(crate) struct TaskInner<T> {
    id: TaskId,
    schedule: Schedule,
    stopped: AtomicFlag,
    cell: ResultCell<T>,
    body: Mutex<Task<T>>,
    executor: Weak<ExecutorShared>,
    resolution: Duration,
    submitted_at: Instant,
}

impl<T> Job for TaskInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn id(&self) -> TaskId {
        self.id
    }

    fn schedule(&self) -> Schedule {
        self.schedule
    }

    fn is_stopped(&self) -> bool {
        self.stopped.is_set()
    }

    fn run(&self) -> u64 {
        trace!("Task {}: running", self.id);

        // The body mutex also keeps a handle from ever running concurrently
        // with itself.
        self.cell.begin();
        let outcome = self.body.lock().call();
        if let Err(e) = &outcome {
            error!("Task {}: {}", self.id, e);
        }

        // Mark the final run before publishing it, so a woken waiter already
        // sees the handle as stopped.
        if !self.schedule.wants_another_run(self.cell.runs() + 1) && self.stopped.set() {
            debug!("Task {}: finished", self.id);
        }

        let result = FutureResult::from_outcome(outcome);
        let observer = self.executor.upgrade().and_then(|shared| shared.observer());
        let event_result = observer.as_ref().map(|_| result.erase());

        let run = self.cell.complete(result);
        // Cancelled mid-run: the cell was left open for this outcome.
        if self.stopped.is_set() {
            self.cell.close();
        }

        if let (Some(observer), Some(result)) = (observer, event_result) {
            let event = ResultEvent {
                task_id: self.id,
                run,
                result,
            };
            let delivered = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                observer(&event)
            }));
            if let Err(payload) = delivered {
                error!(
                    "Task {}: result observer panicked: {}",
                    self.id,
                    panic_message(payload.as_ref())
                );
            }
        }

        run
    }

    fn retire(&self) {
        if self.stopped.set() {
            debug!("Task {}: retired", self.id);
        }
        self.cell.close();
    }
}

/// Handle to a submitted task.
///
/// Cloning is cheap; clones observe the same task. Dropping every handle
/// does not cancel the task.
pub struct TaskFuture<T> {
    inner: Arc<TaskInner<T>>,
}

impl<T> TaskFuture<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        task: Task<T>,
        schedule: Schedule,
        executor: Weak<ExecutorShared>,
        resolution: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id: TaskId::new(),
                schedule,
                stopped: AtomicFlag::new(),
                cell: ResultCell::new(),
                body: Mutex::new(task),
                executor,
                resolution,
                submitted_at: Instant::now(),
            }),
        }
    }

    /// The handle as a strategy job.
    pub(crate) fn job(&self) -> Arc<dyn Job> {
        self.inner.clone()
    }

    /// Unique id of this task.
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// The schedule the task was submitted with.
    pub fn schedule(&self) -> Schedule {
        self.inner.schedule
    }

    /// When the task was accepted, on the monotonic clock.
    pub fn submitted_at(&self) -> Instant {
        self.inner.submitted_at
    }

    /// Whether the task will not be scheduled again.
    ///
    /// Becomes `true` after a single-shot task's run, after a bounded
    /// schedule's last run, on [`cancel`](Self::cancel), or when the
    /// executor stops. Never reverts.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.is_set()
    }

    /// Suppress every future run. Idempotent.
    ///
    /// A run already in progress is not interrupted, and waiters still
    /// receive its outcome.
    pub fn cancel(&self) {
        if self.inner.stopped.set() {
            debug!("Task {}: cancelled", self.inner.id);
        }
        if !self.inner.cell.close_if_idle() {
            trace!("Task {}: cancelled while running", self.inner.id);
        }
    }

    /// Latest outcome. Never blocks on a running task.
    pub fn result(&self) -> FutureResult<T> {
        self.inner.cell.result()
    }

    /// Number of runs completed so far.
    pub fn runs(&self) -> u64 {
        self.inner.cell.runs()
    }

    /// Wait for an outcome, with a millisecond timeout.
    ///
    /// `0` checks once, a positive value bounds the wait and `-1` waits
    /// until an outcome exists. The wait also ends if the task stops without
    /// ever running. Running out of time is not an error: the current,
    /// possibly `None`, outcome is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](cadence_core::Error::InvalidArgument)
    /// when `timeout_ms < -1`.
    pub fn wait_and_get(&self, timeout_ms: i64) -> Result<FutureResult<T>> {
        let timeout = Timeout::from_millis(timeout_ms)?;
        Ok(self.wait_for(timeout))
    }

    /// Typed form of [`wait_and_get`](Self::wait_and_get).
    pub fn wait_for(&self, timeout: Timeout) -> FutureResult<T> {
        self.inner
            .cell
            .wait_until(timeout, self.inner.resolution, |slot| slot.runs > 0)
    }

    /// Wait for a run newer than `seen` completed runs.
    ///
    /// Lets callers follow a recurring task run by run:
    /// pass the value of [`runs`](Self::runs) observed last time.
    pub fn wait_for_next(&self, timeout: Timeout, seen: u64) -> FutureResult<T> {
        self.inner
            .cell
            .wait_until(timeout, self.inner.resolution, |slot| slot.runs > seen)
    }

    /// Whether the executor that accepted this task still exists.
    pub fn is_alive(&self) -> bool {
        self.inner.executor.strong_count() > 0
    }

    /// Lifecycle state of the owning executor, or `None` once it is gone.
    pub fn executor_state(&self) -> Option<ExecutorState> {
        self.inner
            .executor
            .upgrade()
            .map(|shared| shared.lifecycle().state())
    }
}

impl<T> Clone for TaskFuture<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for TaskFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFuture")
            .field("id", &self.inner.id)
            .field("schedule", &self.inner.schedule)
            .field("stopped", &self.inner.stopped.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn detached<T: Clone + Send + Sync + 'static>(task: Task<T>, schedule: Schedule) -> TaskFuture<T> {
        TaskFuture::new(task, schedule, Weak::new(), Duration::from_millis(5))
    }

    #[test]
    fn test_cell_starts_empty() {
        let cell: ResultCell<u32> = ResultCell::new();
        assert!(cell.result().is_none());
        assert_eq!(cell.runs(), 0);
    }

    #[test]
    fn test_cell_overwrites_with_latest() {
        let cell = ResultCell::new();
        cell.complete(FutureResult::from_outcome(Ok(1)));
        cell.complete(FutureResult::from_outcome(Ok(2)));
        assert_eq!(cell.result().value(), Some(&2));
        assert_eq!(cell.runs(), 2);
    }

    #[test]
    fn test_run_publishes_outcome() {
        let future = detached(Task::new(|| 42), Schedule::once());
        assert_eq!(future.job().run(), 1);
        assert_eq!(future.result().value(), Some(&42));
        assert!(!future.is_alive());
        assert_eq!(future.executor_state(), None);
    }

    #[test]
    fn test_wait_immediate_returns_none() {
        let future = detached(Task::new(|| 1), Schedule::once());
        let start = Instant::now();
        assert!(future.wait_and_get(0).unwrap().is_none());
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_wait_rejects_illegal_timeout() {
        let future = detached(Task::new(|| 1), Schedule::once());
        assert!(future.wait_and_get(-2).is_err());
    }

    #[test]
    fn test_wait_bounded_times_out_without_error() {
        let future = detached(Task::new(|| 1), Schedule::once());
        let start = Instant::now();
        let result = future.wait_and_get(30).unwrap();
        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_sees_completion_from_other_thread() {
        let future = detached(Task::new(|| "done"), Schedule::once());
        let job = future.job();
        let runner = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            job.run();
        });

        let result = future.wait_and_get(-1).unwrap();
        assert_eq!(result.value(), Some(&"done"));
        runner.join().unwrap();
    }

    #[test]
    fn test_cancel_is_idempotent_and_ends_waits() {
        let future = detached(Task::new(|| 1), Schedule::every(10));
        assert!(!future.is_stopped());
        future.cancel();
        future.cancel();
        assert!(future.is_stopped());

        // Nothing will ever run; the unbounded wait returns the empty slot.
        assert!(future.wait_and_get(-1).unwrap().is_none());
    }

    #[test]
    fn test_cancel_during_run_keeps_waiters_for_its_outcome() {
        let future = detached(
            Task::new(|| {
                thread::sleep(Duration::from_millis(100));
                7
            }),
            Schedule::once(),
        );
        let job = future.job();
        let runner = thread::spawn(move || job.run());

        thread::sleep(Duration::from_millis(30));
        future.cancel();
        assert!(future.is_stopped());

        let result = future.wait_and_get(-1).unwrap();
        assert_eq!(result.value(), Some(&7));
        assert_eq!(runner.join().unwrap(), 1);
    }

    #[test]
    fn test_wait_for_next() {
        let future = detached(Task::new(|| 7), Schedule::every(10));
        let job = future.job();
        job.run();
        let seen = future.runs();

        // Already has a result, but no newer run yet
        let start = Instant::now();
        let result = future.wait_for_next(Timeout::Bounded(Duration::from_millis(20)), seen);
        assert_eq!(result.value(), Some(&7));
        assert!(start.elapsed() >= Duration::from_millis(20));

        job.run();
        assert_eq!(future.runs(), seen + 1);
    }
}
