//! The executor: lifecycle, submission and result observation.
//!
//! An [`Executor`] owns one strategy for its whole life. Submission and
//! `stop()` are serialized by the lifecycle's permit lock, so a task is
//! either fully registered with the strategy or rejected; it is never
//! visible half-way.

use cadence_core::error::{Error, Result};
use cadence_core::id::ExecutorId;
use cadence_core::types::{ExecutorState, ResultEvent, Schedule, Timeout};
use log::{debug, info};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::pool::ThreadPoolStats;
use crate::scheduler::config::{ExecutorConfig, StrategyKind};
use crate::scheduler::cooperative::CooperativeStrategy;
use crate::scheduler::future::TaskFuture;
use crate::scheduler::lifecycle::Lifecycle;
use crate::scheduler::pool_strategy::ThreadPoolStrategy;
use crate::scheduler::strategy::Strategy;
use crate::scheduler::task::Task;

/// Callback receiving every published outcome.
pub type ResultObserver = Arc<dyn Fn(&ResultEvent) + Send + Sync + 'static>;

/// State shared between the executor and the handles it created.
pub(crate) struct ExecutorShared {
    id: ExecutorId,
    lifecycle: Arc<Lifecycle>,
    strategy: Box<dyn Strategy>,
    kind: StrategyKind,
    observer: RwLock<Option<ResultObserver>>,
    config: ExecutorConfig,
}

impl ExecutorShared {
    pub(crate) fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub(crate) fn observer(&self) -> Option<ResultObserver> {
        self.observer.read().clone()
    }

    fn stop(&self) {
        if !self.lifecycle.begin_stop() {
            return;
        }
        info!("Executor {} stopping", self.id);
        if self.strategy.shutdown() {
            self.lifecycle.finish_stop();
        }
    }
}

/// Point-in-time view of an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorStats {
    /// Name of the active strategy
    pub strategy: &'static str,

    /// Lifecycle state
    pub state: ExecutorState,

    /// Runs waiting for their due time
    pub pending: usize,

    /// Runs dispatched or executing
    pub in_flight: usize,

    /// Worker pool counters, for the thread-pool strategy
    pub pool: Option<ThreadPoolStats>,
}

/// Runs tasks on a schedule and publishes their outcomes.
///
/// Dropping the executor performs [`stop`](Self::stop). Runs already in
/// progress finish; nothing new starts.
///
/// # Example
///
/// ```
/// use cadence_concurrency::{Executor, Task};
/// use cadence_core::Schedule;
///
/// let executor = Executor::create(2).unwrap();
/// let future = executor.submit(Task::new(|| 42), Schedule::once()).unwrap();
/// let result = future.wait_and_get(-1).unwrap();
/// assert_eq!(result.value(), Some(&42));
/// executor.stop();
/// ```
pub struct Executor {
    shared: Arc<ExecutorShared>,
}

impl Executor {
    /// Create an executor with `max_concurrent` workers and default settings.
    ///
    /// `max_concurrent` is ignored by the cooperative strategy.
    pub fn create(max_concurrent: usize) -> Result<Self> {
        Self::with_config(ExecutorConfig::with_max_concurrent(max_concurrent))
    }

    /// Create an executor from a configuration.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration, or with [`Error::Io`] if a thread
    /// cannot be spawned.
    pub fn with_config(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;

        let id = ExecutorId::new();
        let lifecycle = Arc::new(Lifecycle::new(id));
        let kind = config.strategy.resolve();
        let resolution = config.resolution_for(kind);

        let strategy: Box<dyn Strategy> = match kind {
            StrategyKind::Cooperative if CooperativeStrategy::THREADS_AVAILABLE => {
                Box::new(CooperativeStrategy::spawn(
                    Arc::clone(&lifecycle),
                    resolution,
                    format!("{}-control", config.thread_name_prefix),
                )?)
            }
            StrategyKind::Cooperative => {
                Box::new(CooperativeStrategy::manual(Arc::clone(&lifecycle), resolution))
            }
            _ => Box::new(ThreadPoolStrategy::new(
                Arc::clone(&lifecycle),
                config.pool_config(),
                resolution,
            )?),
        };

        info!(
            "Executor {} created ({} strategy, max_concurrent={})",
            id,
            strategy.name(),
            config.max_concurrent
        );

        Ok(Self {
            shared: Arc::new(ExecutorShared {
                id,
                lifecycle,
                strategy,
                kind,
                observer: RwLock::new(None),
                config,
            }),
        })
    }

    /// Submit a task to run on `schedule`.
    ///
    /// # Errors
    ///
    /// - [`Error::ExecutorStopped`] if the executor is not running.
    /// - [`Error::Schedule`] if the schedule holds a negative field.
    pub fn submit<T>(&self, task: Task<T>, schedule: Schedule) -> Result<TaskFuture<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let shared = &self.shared;
        shared.lifecycle.guarded(|state| {
            if state != ExecutorState::Running {
                return Err(Error::ExecutorStopped(state));
            }
            let schedule = schedule.validate()?;

            let future = TaskFuture::new(
                task,
                schedule,
                Arc::downgrade(shared),
                shared.strategy.resolution(),
            );
            debug!(
                "Executor {}: accepted task {} ({:?})",
                shared.id,
                future.id(),
                schedule
            );
            shared.strategy.schedule(future.job());
            Ok(future)
        })
    }

    /// Run `f` once, as soon as possible.
    pub fn execute<T, F>(&self, f: F) -> Result<TaskFuture<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: FnMut() -> T + Send + 'static,
    {
        self.submit(Task::new(f), Schedule::once())
    }

    /// Stop accepting tasks and discard pending runs.
    ///
    /// Idempotent. Runs in progress finish; the state becomes
    /// [`ExecutorState::Stopped`] once the last one does.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ExecutorState {
        self.shared.lifecycle.state()
    }

    /// Register the result observer, replacing any previous one.
    ///
    /// The observer runs on the thread that executed the task, after the
    /// outcome is visible through the task's handle. A panicking observer
    /// is logged and otherwise ignored.
    pub fn set_on_result<F>(&self, observer: F)
    where
        F: Fn(&ResultEvent) + Send + Sync + 'static,
    {
        *self.shared.observer.write() = Some(Arc::new(observer));
        debug!("Executor {}: result observer replaced", self.shared.id);
    }

    /// Block until the executor reaches [`ExecutorState::Stopped`].
    ///
    /// Returns `false` if the timeout expired first.
    pub fn await_termination(&self, timeout: Timeout) -> bool {
        self.shared.lifecycle.await_stopped(timeout)
    }

    /// Run due work on the calling thread.
    ///
    /// Drives the cooperative strategy from a host loop; returns the number
    /// of runs executed. Always `0` for the thread-pool strategy.
    pub fn poll(&self) -> usize {
        self.shared.strategy.poll()
    }

    /// Unique id of this executor.
    pub fn id(&self) -> ExecutorId {
        self.shared.id
    }

    /// The configuration this executor was built from.
    pub fn config(&self) -> &ExecutorConfig {
        &self.shared.config
    }

    /// The strategy in use, with `Auto` resolved.
    pub fn strategy(&self) -> StrategyKind {
        self.shared.kind
    }

    /// Wait tick used by blocking waits on this executor's handles.
    pub fn resolution(&self) -> Duration {
        self.shared.strategy.resolution()
    }

    /// Snapshot of state and queue occupancy.
    pub fn stats(&self) -> ExecutorStats {
        let strategy = self.shared.strategy.stats();
        ExecutorStats {
            strategy: self.shared.strategy.name(),
            state: self.state(),
            pending: strategy.pending,
            in_flight: strategy.in_flight,
            pool: strategy.pool,
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("id", &self.shared.id)
            .field("strategy", &self.shared.kind)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_create_and_stop() {
        let executor = Executor::create(2).unwrap();
        assert_eq!(executor.state(), ExecutorState::Running);
        assert_eq!(executor.strategy(), StrategyKind::ThreadPool);

        executor.stop();
        assert!(executor.await_termination(Timeout::Bounded(Duration::from_secs(1))));
        assert_eq!(executor.state(), ExecutorState::Stopped);

        // Idempotent
        executor.stop();
        assert_eq!(executor.state(), ExecutorState::Stopped);
    }

    #[test]
    fn test_create_rejects_zero_workers() {
        assert!(matches!(Executor::create(0), Err(Error::Config(_))));
    }

    #[test]
    fn test_submit_validates_schedule() {
        let executor = Executor::create(1).unwrap();
        let result = executor.submit(Task::new(|| 1), Schedule::once_after(-5));
        assert!(matches!(result, Err(Error::Schedule(_))));

        // Nothing was registered
        assert_eq!(executor.stats().pending, 0);
    }

    #[test]
    fn test_observer_replacement() {
        let executor = Executor::create(1).unwrap();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        {
            let first = first.clone();
            executor.set_on_result(move |_| {
                first.fetch_add(1, Ordering::SeqCst);
            });
        }
        {
            let second = second.clone();
            executor.set_on_result(move |_| {
                second.fetch_add(1, Ordering::SeqCst);
            });
        }

        let future = executor.execute(|| 1).unwrap();
        future.wait_and_get(-1).unwrap();
        executor.stop();
        assert!(executor.await_termination(Timeout::Unbounded));

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_stops_and_detaches_handles() {
        let executor = Executor::create(1).unwrap();
        let future = executor
            .submit(Task::new(|| 1), Schedule::once_after(10_000))
            .unwrap();
        assert!(future.is_alive());
        assert_eq!(future.executor_state(), Some(ExecutorState::Running));

        drop(executor);
        assert!(future.is_stopped());
        assert!(!future.is_alive());
        assert_eq!(future.executor_state(), None);
    }

    #[test]
    fn test_stats() {
        let executor = Executor::create(1).unwrap();
        executor
            .submit(Task::new(|| ()), Schedule::once_after(10_000))
            .unwrap();
        let stats = executor.stats();
        assert_eq!(stats.strategy, "thread-pool");
        assert_eq!(stats.state, ExecutorState::Running);
        assert_eq!(stats.pending, 1);
        assert!(stats.pool.is_some());
    }
}
