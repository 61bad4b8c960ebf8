//! Execution cadences.
//!
//! A [`Schedule`] says when a task first runs and whether it runs again.
//! Numeric fields are signed so that malformed values coming from callers
//! or configuration can be represented and rejected by [`Schedule::validate`]
//! at submission time rather than surfacing later inside a strategy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ScheduleError;

/// When and how often a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Run a single time after `delay_ms`.
    Once {
        /// Delay before the run, in milliseconds
        delay_ms: i64,
    },

    /// Run after `delay_ms`, then again `period_ms` after each run finishes,
    /// until cancelled or the executor stops.
    Interval {
        /// Delay before the first run, in milliseconds
        delay_ms: i64,
        /// Spacing between the end of one run and the start of the next
        period_ms: i64,
    },

    /// Like [`Schedule::Interval`], but retires after `runs` executions.
    Limited {
        /// Delay before the first run, in milliseconds
        delay_ms: i64,
        /// Spacing between the end of one run and the start of the next
        period_ms: i64,
        /// Total number of executions
        runs: u32,
    },
}

impl Schedule {
    /// Run once, immediately.
    pub const fn once() -> Self {
        Self::Once { delay_ms: 0 }
    }

    /// Run once after `delay_ms`.
    pub const fn once_after(delay_ms: i64) -> Self {
        Self::Once { delay_ms }
    }

    /// Run immediately, then every `period_ms`.
    pub const fn every(period_ms: i64) -> Self {
        Self::Interval {
            delay_ms: 0,
            period_ms,
        }
    }

    /// Run after `delay_ms`, then every `period_ms`.
    pub const fn every_after(delay_ms: i64, period_ms: i64) -> Self {
        Self::Interval {
            delay_ms,
            period_ms,
        }
    }

    /// Run `runs` times, `period_ms` apart, starting immediately.
    pub const fn times(period_ms: i64, runs: u32) -> Self {
        Self::Limited {
            delay_ms: 0,
            period_ms,
            runs,
        }
    }

    /// Check that every numeric field is usable.
    ///
    /// Returns the schedule unchanged on success. Validation is pure; it is
    /// performed once, when a task is submitted.
    pub fn validate(self) -> Result<Self, ScheduleError> {
        let (delay_ms, period_ms) = match self {
            Self::Once { delay_ms } => (delay_ms, None),
            Self::Interval {
                delay_ms,
                period_ms,
            } => (delay_ms, Some(period_ms)),
            Self::Limited {
                delay_ms,
                period_ms,
                runs,
            } => {
                if runs == 0 {
                    return Err(ScheduleError::NoRuns);
                }
                (delay_ms, Some(period_ms))
            }
        };

        if delay_ms < 0 {
            return Err(ScheduleError::Negative {
                field: "delay_ms",
                value: delay_ms,
            });
        }
        if let Some(period_ms) = period_ms.filter(|p| *p < 0) {
            return Err(ScheduleError::Negative {
                field: "period_ms",
                value: period_ms,
            });
        }

        Ok(self)
    }

    /// Delay before the first run.
    pub fn initial_delay(&self) -> Duration {
        let delay_ms = match self {
            Self::Once { delay_ms }
            | Self::Interval { delay_ms, .. }
            | Self::Limited { delay_ms, .. } => *delay_ms,
        };
        clamp_millis(delay_ms)
    }

    /// Spacing between runs, or `None` for a single-shot schedule.
    pub fn period(&self) -> Option<Duration> {
        match self {
            Self::Once { .. } => None,
            Self::Interval { period_ms, .. } | Self::Limited { period_ms, .. } => {
                Some(clamp_millis(*period_ms))
            }
        }
    }

    /// Maximum number of runs, or `None` when unbounded.
    pub fn max_runs(&self) -> Option<u64> {
        match self {
            Self::Once { .. } => Some(1),
            Self::Interval { .. } => None,
            Self::Limited { runs, .. } => Some(u64::from(*runs)),
        }
    }

    /// Whether another run is due after `completed` runs have finished.
    pub fn wants_another_run(&self, completed: u64) -> bool {
        self.max_runs().map_or(true, |max| completed < max)
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::once()
    }
}

fn clamp_millis(ms: i64) -> Duration {
    Duration::from_millis(ms.max(0) as u64)
}
