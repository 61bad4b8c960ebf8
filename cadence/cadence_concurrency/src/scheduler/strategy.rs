//! The seam between the executor and its scheduling mechanisms.
//!
//! An executor owns exactly one [`Strategy`], chosen when it is built and
//! never swapped. Strategies see submitted work only as [`Job`]s: type-erased
//! task handles that can be run, inspected and retired.

use cadence_core::id::TaskId;
use cadence_core::types::Schedule;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::pool::ThreadPoolStats;

/// A submitted task as seen by a strategy.
pub trait Job: Send + Sync {
    /// Id of the underlying task handle.
    fn id(&self) -> TaskId;

    /// The validated schedule the task was submitted with.
    fn schedule(&self) -> Schedule;

    /// Whether the handle has been cancelled or retired.
    fn is_stopped(&self) -> bool;

    /// Execute the task body once and publish the outcome.
    ///
    /// Never panics. Returns the number of runs completed so far.
    fn run(&self) -> u64;

    /// Mark the handle inert; it will not be scheduled again.
    fn retire(&self);
}

/// How long after a finished run the job should run again, if at all.
pub(crate) fn rearm_delay(job: &dyn Job, completed_runs: u64) -> Option<Duration> {
    if job.is_stopped() {
        return None;
    }
    let schedule = job.schedule();
    if !schedule.wants_another_run(completed_runs) {
        return None;
    }
    schedule.period()
}

/// A scheduling mechanism behind the executor.
pub trait Strategy: Send + Sync {
    /// Short name, used in logs and stats.
    fn name(&self) -> &'static str;

    /// Take ownership of a newly submitted job and arrange its first run
    /// after the schedule's initial delay.
    fn schedule(&self, job: Arc<dyn Job>);

    /// Stop arming runs and discard pending ones.
    ///
    /// Returns `true` if nothing is in flight at that instant. Otherwise the
    /// strategy reports completion itself once the last run finishes.
    fn shutdown(&self) -> bool;

    /// Drive due work from the caller's thread. Returns the number of runs
    /// executed. Strategies with their own threads do nothing here.
    fn poll(&self) -> usize {
        0
    }

    /// Tick used by blocking waits on handles scheduled by this strategy.
    fn resolution(&self) -> Duration;

    /// Snapshot of queue occupancy.
    fn stats(&self) -> StrategyStats;
}

/// Queue occupancy reported by a strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyStats {
    /// Runs waiting for their due time
    pub pending: usize,

    /// Runs dispatched or executing
    pub in_flight: usize,

    /// Worker pool counters, for strategies backed by a pool
    pub pool: Option<ThreadPoolStats>,
}

/// A job waiting for its due time.
///
/// Ordered so that the earliest due time is the greatest, which makes a
/// `BinaryHeap<Pending>` pop the next run first. Ties break by arrival.
pub(crate) struct Pending {
    pub(crate) due: Instant,
    pub(crate) seq: u64,
    pub(crate) job: Arc<dyn Job>,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
