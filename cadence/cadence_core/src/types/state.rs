//! Executor lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an executor.
///
/// Transitions are monotonic: `Running -> Stopping -> Stopped`. A state never
/// moves backwards, and `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutorState {
    /// Accepting submissions and scheduling runs
    Running,

    /// No longer accepting submissions; in-flight runs are draining
    Stopping,

    /// Drained; nothing will run again
    Stopped,
}

impl ExecutorState {
    /// Encode for storage in an atomic.
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Stopping => 1,
            Self::Stopped => 2,
        }
    }

    /// Decode a value produced by [`as_u8`](Self::as_u8).
    ///
    /// Out-of-range values decode as `Stopped`.
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    /// Whether moving from `self` to `next` is a legal lifecycle step.
    pub fn can_transition_to(self, next: ExecutorState) -> bool {
        matches!(
            (self, next),
            (Self::Running, Self::Stopping) | (Self::Stopping, Self::Stopped)
        )
    }

    /// Name of the state as shown in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
