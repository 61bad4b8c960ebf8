//! Thread-pool strategy.
//!
//! A timer thread keeps pending runs in a min-heap keyed by due time and
//! hands due runs to a bounded [`ThreadPool`]. A recurring job is re-armed
//! only after its previous run returns, so one handle never overlaps with
//! itself while unrelated handles run in parallel.

use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::BinaryHeap;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::pool::{ThreadPool, ThreadPoolConfig};
use crate::scheduler::lifecycle::Lifecycle;
use crate::scheduler::strategy::{rearm_delay, Job, Pending, Strategy, StrategyStats};
use crate::sync::AtomicSequence;

/// Default wait tick for handles scheduled on a pool.
pub const DEFAULT_POOL_RESOLUTION: Duration = Duration::from_millis(5);

#[derive(Default)]
struct DispatchState {
    pending: BinaryHeap<Pending>,
    in_flight: usize,
    stopping: bool,
}

/// State shared by the timer thread and the pool workers.
struct Dispatch {
    state: Mutex<DispatchState>,
    wake: Condvar,
    lifecycle: Arc<Lifecycle>,
    seq: AtomicSequence,
}

impl Dispatch {
    fn push(&self, state: &mut DispatchState, job: Arc<dyn Job>, due: Instant) {
        state.pending.push(Pending {
            due,
            seq: self.seq.next(),
            job,
        });
        self.wake.notify_one();
    }

    fn timer_loop(self: Arc<Self>, pool: Arc<ThreadPool>) {
        debug!("Timer thread started");
        let mut state = self.state.lock();

        while !state.stopping {
            let next_due = state.pending.peek().map(|entry| entry.due);
            match next_due {
                None => self.wake.wait(&mut state),
                Some(due) if due > Instant::now() => {
                    self.wake.wait_until(&mut state, due);
                }
                Some(_) => {
                    let Some(entry) = state.pending.pop() else {
                        continue;
                    };
                    if entry.job.is_stopped() {
                        entry.job.retire();
                        continue;
                    }
                    state.in_flight += 1;
                    self.dispatch(&mut state, &pool, entry.job);
                }
            }
        }

        debug!("Timer thread exiting");
    }

    /// Hand a job to the pool with the state lock released, since workers
    /// need it to report back and the queue may be full.
    fn dispatch(
        self: &Arc<Self>,
        state: &mut MutexGuard<'_, DispatchState>,
        pool: &ThreadPool,
        job: Arc<dyn Job>,
    ) {
        let dispatch = Arc::clone(self);
        let worker_job = Arc::clone(&job);
        let queued = MutexGuard::unlocked(state, || {
            pool.execute_blocking(move || dispatch.run_job(worker_job))
        });

        if let Err(e) = queued {
            warn!("Task {}: dropped by worker pool: {}", job.id(), e);
            job.retire();
            state.in_flight -= 1;
            if state.stopping && state.in_flight == 0 {
                MutexGuard::unlocked(state, || self.lifecycle.finish_stop());
            }
        }
    }

    /// Worker side: run once, then re-arm or retire.
    fn run_job(&self, job: Arc<dyn Job>) {
        let runs = if job.is_stopped() { None } else { Some(job.run()) };

        let drained = {
            let mut state = self.state.lock();
            state.in_flight -= 1;
            let next = runs.and_then(|runs| rearm_delay(job.as_ref(), runs));
            match next {
                Some(period) if !state.stopping => {
                    let due = Instant::now() + period;
                    self.push(&mut state, job, due);
                }
                _ => job.retire(),
            }
            state.stopping && state.in_flight == 0
        };

        if drained {
            self.lifecycle.finish_stop();
        }
    }
}

/// Runs due jobs on a bounded pool of worker threads.
pub struct ThreadPoolStrategy {
    dispatch: Arc<Dispatch>,
    pool: Arc<ThreadPool>,
    timer: Mutex<Option<JoinHandle<()>>>,
    resolution: Duration,
}

impl ThreadPoolStrategy {
    pub(crate) fn new(
        lifecycle: Arc<Lifecycle>,
        config: ThreadPoolConfig,
        resolution: Duration,
    ) -> io::Result<Self> {
        let timer_name = format!("{}-timer", config.thread_name_prefix);
        let pool = Arc::new(ThreadPool::with_config(config)?);
        let dispatch = Arc::new(Dispatch {
            state: Mutex::new(DispatchState::default()),
            wake: Condvar::new(),
            lifecycle,
            seq: AtomicSequence::new(0),
        });

        let timer = {
            let dispatch = Arc::clone(&dispatch);
            let pool = Arc::clone(&pool);
            thread::Builder::new()
                .name(timer_name)
                .spawn(move || dispatch.timer_loop(pool))?
        };

        info!(
            "Thread-pool strategy started with {} workers",
            pool.worker_count()
        );

        Ok(Self {
            dispatch,
            pool,
            timer: Mutex::new(Some(timer)),
            resolution,
        })
    }
}

impl Strategy for ThreadPoolStrategy {
    fn name(&self) -> &'static str {
        "thread-pool"
    }

    fn schedule(&self, job: Arc<dyn Job>) {
        let due = Instant::now() + job.schedule().initial_delay();
        debug!("Task {}: scheduled on thread pool", job.id());
        let mut state = self.dispatch.state.lock();
        self.dispatch.push(&mut state, job, due);
    }

    fn shutdown(&self) -> bool {
        let (discarded, idle) = {
            let mut state = self.dispatch.state.lock();
            state.stopping = true;
            let discarded: Vec<_> = state.pending.drain().collect();
            (discarded, state.in_flight == 0)
        };
        self.dispatch.wake.notify_all();

        debug!(
            "Thread-pool strategy shutting down, {} pending runs discarded",
            discarded.len()
        );
        for entry in discarded {
            entry.job.retire();
        }
        idle
    }

    fn resolution(&self) -> Duration {
        self.resolution
    }

    fn stats(&self) -> StrategyStats {
        let state = self.dispatch.state.lock();
        StrategyStats {
            pending: state.pending.len(),
            in_flight: state.in_flight,
            pool: Some(self.pool.stats()),
        }
    }
}

impl Drop for ThreadPoolStrategy {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(timer) = self.timer.lock().take() {
            if timer.join().is_err() {
                warn!("Timer thread panicked");
            }
        }
        // Queued runs still drain on the workers.
        self.pool.shutdown();
    }
}
