//! Task outcomes.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::error::TaskError;
use crate::id::TaskId;

/// Type-erased task value, as delivered to executor-wide observers.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// Latest outcome of a task.
///
/// A result slot starts at `None` and is overwritten with a complete value
/// on every execution. Timestamps come from the monotonic clock and mark
/// when the run finished.
#[derive(Clone)]
pub enum FutureResult<T> {
    /// The task has not finished a run yet
    None,

    /// The last run produced a value
    Success {
        /// Value returned by the task
        value: T,
        /// When the run finished
        at: Instant,
    },

    /// The last run failed
    Failure {
        /// What went wrong
        error: TaskError,
        /// When the run finished
        at: Instant,
    },
}

impl<T> FutureResult<T> {
    /// Build an outcome stamped with the current monotonic time.
    pub fn from_outcome(outcome: Result<T, TaskError>) -> Self {
        let at = Instant::now();
        match outcome {
            Ok(value) => Self::Success { value, at },
            Err(error) => Self::Failure { error, at },
        }
    }

    /// Whether no run has finished yet.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Whether the last run succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Whether the last run failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// The value of a successful run.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success { value, .. } => Some(value),
            _ => None,
        }
    }

    /// The error of a failed run.
    pub fn error(&self) -> Option<&TaskError> {
        match self {
            Self::Failure { error, .. } => Some(error),
            _ => None,
        }
    }

    /// When the last run finished.
    pub fn timestamp(&self) -> Option<Instant> {
        match self {
            Self::None => None,
            Self::Success { at, .. } | Self::Failure { at, .. } => Some(*at),
        }
    }

    /// Convert into a standard `Result`, or `None` if nothing has run.
    pub fn into_result(self) -> Option<Result<T, TaskError>> {
        match self {
            Self::None => None,
            Self::Success { value, .. } => Some(Ok(value)),
            Self::Failure { error, .. } => Some(Err(error)),
        }
    }

    /// Map the success value, keeping the timestamp.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FutureResult<U> {
        match self {
            Self::None => FutureResult::None,
            Self::Success { value, at } => FutureResult::Success { value: f(value), at },
            Self::Failure { error, at } => FutureResult::Failure { error, at },
        }
    }
}

impl<T: Clone + Send + Sync + 'static> FutureResult<T> {
    /// Erase the value type for delivery to executor-wide observers.
    pub fn erase(&self) -> FutureResult<AnyValue> {
        self.clone().map(|value| Arc::new(value) as AnyValue)
    }
}

impl<T> Default for FutureResult<T> {
    fn default() -> Self {
        Self::None
    }
}

impl<T: fmt::Debug> fmt::Debug for FutureResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Success { value, at } => f
                .debug_struct("Success")
                .field("value", value)
                .field("at", at)
                .finish(),
            Self::Failure { error, at } => f
                .debug_struct("Failure")
                .field("error", error)
                .field("at", at)
                .finish(),
        }
    }
}

impl<T: PartialEq> PartialEq for FutureResult<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Success { value: a, at: ta }, Self::Success { value: b, at: tb }) => {
                a == b && ta == tb
            }
            (Self::Failure { error: a, at: ta }, Self::Failure { error: b, at: tb }) => {
                a == b && ta == tb
            }
            _ => false,
        }
    }
}

/// A published outcome, as seen by an executor's result observer.
#[derive(Clone)]
pub struct ResultEvent {
    /// Task that produced the outcome
    pub task_id: TaskId,

    /// Number of runs the task has completed, including this one
    pub run: u64,

    /// The outcome itself
    pub result: FutureResult<AnyValue>,
}

impl ResultEvent {
    /// Downcast the success value to a concrete type.
    pub fn value_as<T: 'static>(&self) -> Option<&T> {
        self.result.value().and_then(|v| v.downcast_ref::<T>())
    }
}

impl fmt::Debug for ResultEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match &self.result {
            FutureResult::None => "none".to_string(),
            FutureResult::Success { .. } => "success".to_string(),
            FutureResult::Failure { error, .. } => error.to_string(),
        };
        f.debug_struct("ResultEvent")
            .field("task_id", &self.task_id)
            .field("run", &self.run)
            .field("result", &outcome)
            .finish()
    }
}
