//! Cooperative timer strategy.
//!
//! Every run happens inline on a single thread of control: either a
//! dedicated control thread that ticks at a fixed resolution, or the host's
//! own loop calling [`Strategy::poll`] when threads are not available. A
//! long task body delays everything else that is due.

use log::{debug, info, trace, warn};
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::scheduler::lifecycle::Lifecycle;
use crate::scheduler::strategy::{rearm_delay, Job, Pending, Strategy, StrategyStats};
use crate::sync::AtomicSequence;

/// Default control-loop tick.
pub const DEFAULT_COOPERATIVE_RESOLUTION: Duration = Duration::from_millis(10);

#[derive(Default)]
struct TimerState {
    entries: Vec<Pending>,
    in_flight: usize,
    stopping: bool,
}

struct Timer {
    state: Mutex<TimerState>,
    wake: Condvar,
    lifecycle: Arc<Lifecycle>,
    seq: AtomicSequence,
    resolution: Duration,
}

impl Timer {
    /// Run everything that is due, in due order. Returns the number of runs.
    fn poll(&self) -> usize {
        let mut due = {
            let mut state = self.state.lock();
            if state.stopping {
                return 0;
            }
            let now = Instant::now();
            let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.entries)
                .into_iter()
                .partition(|entry| entry.due <= now);
            state.entries = waiting;
            state.in_flight += ready.len();
            ready
        };
        // `Pending` orders earliest-first as the greatest element.
        due.sort_by(|a, b| b.cmp(a));

        let mut executed = 0;
        for entry in due {
            let job = entry.job;
            let skip = job.is_stopped() || self.state.lock().stopping;
            let runs = if skip {
                None
            } else {
                trace!("Task {}: due, running inline", job.id());
                executed += 1;
                Some(job.run())
            };

            let drained = {
                let mut state = self.state.lock();
                state.in_flight -= 1;
                match runs.and_then(|runs| rearm_delay(job.as_ref(), runs)) {
                    Some(period) if !state.stopping => {
                        state.entries.push(Pending {
                            due: Instant::now() + period,
                            seq: self.seq.next(),
                            job,
                        });
                    }
                    _ => job.retire(),
                }
                state.stopping && state.in_flight == 0
            };

            if drained {
                self.lifecycle.finish_stop();
            }
        }
        executed
    }

    fn control_loop(self: Arc<Self>) {
        debug!("Control thread started");
        loop {
            self.poll();
            let mut state = self.state.lock();
            if state.stopping {
                break;
            }
            self.wake.wait_for(&mut state, self.resolution);
        }
        debug!("Control thread exiting");
    }
}

/// Runs due jobs inline on one thread of control.
pub struct CooperativeStrategy {
    timer: Arc<Timer>,
    control: Mutex<Option<JoinHandle<()>>>,
}

impl CooperativeStrategy {
    /// Whether the target can spawn a control thread.
    pub const THREADS_AVAILABLE: bool =
        !cfg!(all(target_family = "wasm", not(target_feature = "atomics")));

    /// Start a strategy with its own control thread.
    pub(crate) fn spawn(
        lifecycle: Arc<Lifecycle>,
        resolution: Duration,
        thread_name: String,
    ) -> io::Result<Self> {
        let strategy = Self::manual(lifecycle, resolution);
        let timer = Arc::clone(&strategy.timer);
        let handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || timer.control_loop())?;
        *strategy.control.lock() = Some(handle);
        info!(
            "Cooperative strategy started with a {}ms control loop",
            resolution.as_millis()
        );
        Ok(strategy)
    }

    /// A strategy driven solely by [`Strategy::poll`] from the host loop.
    pub(crate) fn manual(lifecycle: Arc<Lifecycle>, resolution: Duration) -> Self {
        Self {
            timer: Arc::new(Timer {
                state: Mutex::new(TimerState::default()),
                wake: Condvar::new(),
                lifecycle,
                seq: AtomicSequence::new(0),
                resolution,
            }),
            control: Mutex::new(None),
        }
    }

    /// Whether a control thread drives this strategy.
    pub fn has_control_thread(&self) -> bool {
        self.control.lock().is_some()
    }
}

impl Strategy for CooperativeStrategy {
    fn name(&self) -> &'static str {
        "cooperative"
    }

    fn schedule(&self, job: Arc<dyn Job>) {
        let due = Instant::now() + job.schedule().initial_delay();
        debug!("Task {}: scheduled on cooperative timer", job.id());
        self.timer.state.lock().entries.push(Pending {
            due,
            seq: self.timer.seq.next(),
            job,
        });
    }

    fn shutdown(&self) -> bool {
        let (discarded, idle) = {
            let mut state = self.timer.state.lock();
            state.stopping = true;
            let discarded = std::mem::take(&mut state.entries);
            (discarded, state.in_flight == 0)
        };
        self.timer.wake.notify_all();

        debug!(
            "Cooperative strategy shutting down, {} pending runs discarded",
            discarded.len()
        );
        for entry in discarded {
            entry.job.retire();
        }
        idle
    }

    fn poll(&self) -> usize {
        self.timer.poll()
    }

    fn resolution(&self) -> Duration {
        self.timer.resolution
    }

    fn stats(&self) -> StrategyStats {
        let state = self.timer.state.lock();
        StrategyStats {
            pending: state.entries.len(),
            in_flight: state.in_flight,
            pool: None,
        }
    }
}

impl Drop for CooperativeStrategy {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(control) = self.control.lock().take() {
            // The last handle to the executor may be released by a task body.
            if control.thread().id() == thread::current().id() {
                return;
            }
            if control.join().is_err() {
                warn!("Control thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::id::ExecutorId;
    use cadence_core::types::ExecutorState;
    use cadence_core::{Schedule, TaskId};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    struct CountingJob {
        id: TaskId,
        schedule: Schedule,
        runs: AtomicU64,
        stopped: AtomicBool,
        order: Option<Arc<Mutex<Vec<u32>>>>,
        tag: u32,
    }

    impl CountingJob {
        fn new(schedule: Schedule) -> Arc<Self> {
            Self::tagged(schedule, 0, None)
        }

        fn tagged(schedule: Schedule, tag: u32, order: Option<Arc<Mutex<Vec<u32>>>>) -> Arc<Self> {
            Arc::new(Self {
                id: TaskId::new(),
                schedule,
                runs: AtomicU64::new(0),
                stopped: AtomicBool::new(false),
                order,
                tag,
            })
        }
    }

    impl Job for CountingJob {
        fn id(&self) -> TaskId {
            self.id
        }
        fn schedule(&self) -> Schedule {
            self.schedule
        }
        fn is_stopped(&self) -> bool {
            self.stopped.load(Ordering::SeqCst)
        }
        fn run(&self) -> u64 {
            if let Some(order) = &self.order {
                order.lock().push(self.tag);
            }
            self.runs.fetch_add(1, Ordering::SeqCst) + 1
        }
        fn retire(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    fn manual() -> (Arc<Lifecycle>, CooperativeStrategy) {
        let lifecycle = Arc::new(Lifecycle::new(ExecutorId::new()));
        let strategy =
            CooperativeStrategy::manual(lifecycle.clone(), DEFAULT_COOPERATIVE_RESOLUTION);
        (lifecycle, strategy)
    }

    #[test]
    fn test_manual_poll_runs_due_jobs() {
        let (_, strategy) = manual();
        assert!(!strategy.has_control_thread());

        let now = CountingJob::new(Schedule::once());
        let later = CountingJob::new(Schedule::once_after(10_000));
        strategy.schedule(now.clone());
        strategy.schedule(later.clone());

        assert_eq!(strategy.poll(), 1);
        assert_eq!(now.runs.load(Ordering::SeqCst), 1);
        assert!(now.is_stopped());
        assert_eq!(later.runs.load(Ordering::SeqCst), 0);
        assert_eq!(strategy.stats().pending, 1);

        // Nothing new is due
        assert_eq!(strategy.poll(), 0);
    }

    #[test]
    fn test_runs_in_due_order() {
        let (_, strategy) = manual();
        let order = Arc::new(Mutex::new(Vec::new()));
        strategy.schedule(CountingJob::tagged(Schedule::once_after(20), 2, Some(order.clone())));
        strategy.schedule(CountingJob::tagged(Schedule::once_after(10), 1, Some(order.clone())));
        strategy.schedule(CountingJob::tagged(Schedule::once(), 0, Some(order.clone())));

        thread::sleep(Duration::from_millis(40));
        assert_eq!(strategy.poll(), 3);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_interval_rearms_after_period() {
        let (_, strategy) = manual();
        let job = CountingJob::new(Schedule::every(30));
        strategy.schedule(job.clone());

        assert_eq!(strategy.poll(), 1);
        // Re-armed, but not due yet
        assert_eq!(strategy.poll(), 0);
        thread::sleep(Duration::from_millis(40));
        assert_eq!(strategy.poll(), 1);
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);
        assert!(!job.is_stopped());
    }

    #[test]
    fn test_cancelled_job_is_skipped() {
        let (_, strategy) = manual();
        let job = CountingJob::new(Schedule::once());
        strategy.schedule(job.clone());
        job.retire();

        assert_eq!(strategy.poll(), 0);
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);
        assert_eq!(strategy.stats().pending, 0);
    }

    #[test]
    fn test_shutdown_when_idle() {
        let (lifecycle, strategy) = manual();
        let job = CountingJob::new(Schedule::every(5));
        strategy.schedule(job.clone());

        assert!(lifecycle.begin_stop());
        assert!(strategy.shutdown());
        assert!(job.is_stopped());
        assert_eq!(strategy.poll(), 0);
        assert_eq!(lifecycle.state(), ExecutorState::Stopping);
    }

    #[test]
    fn test_control_thread_drives_jobs() {
        let lifecycle = Arc::new(Lifecycle::new(ExecutorId::new()));
        let strategy = CooperativeStrategy::spawn(
            lifecycle,
            Duration::from_millis(5),
            "cadence-test-control".to_string(),
        )
        .unwrap();
        assert!(strategy.has_control_thread());

        let job = CountingJob::new(Schedule::times(5, 3));
        strategy.schedule(job.clone());
        thread::sleep(Duration::from_millis(150));
        assert_eq!(job.runs.load(Ordering::SeqCst), 3);
        assert!(job.is_stopped());
    }
}
