//! Error types for the Cadence executor.
//!
//! Errors are organized by subsystem: schedule validation, permit locks and
//! configuration each have their own enum, and the root [`Error`] wraps them
//! so callers can use a single `Result` type at the API boundary.
//!
//! Failures raised by task bodies are *not* part of this hierarchy. They are
//! captured as [`TaskError`] values and recorded in the task's result slot,
//! never propagated through the scheduler.

use std::thread::ThreadId;

use thiserror::Error;

use crate::types::ExecutorState;

/// Root error type for Cadence.
#[derive(Debug, Error)]
pub enum Error {
    /// A task was submitted while the executor was not running
    #[error("executor is not accepting tasks (state: {0})")]
    ExecutorStopped(ExecutorState),

    /// Schedule validation errors
    #[error("invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),

    /// Permit lock errors
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    /// An argument was outside its legal value space
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration loading and validation errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors, including failures to spawn worker threads
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced when validating a [`Schedule`](crate::types::Schedule).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// A numeric field holds a negative value
    #[error("field `{field}` must be non-negative, got {value}")]
    Negative {
        /// Name of the offending field
        field: &'static str,
        /// The rejected value
        value: i64,
    },

    /// A bounded schedule asks for zero runs
    #[error("field `runs` must be at least 1")]
    NoRuns,
}

/// Errors related to permit acquisition and release.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// `release()` was called by a thread other than the one holding the permit
    #[error("permit held by {owner:?} cannot be released by {caller:?}")]
    OwnershipViolation {
        /// Thread currently holding the permit
        owner: ThreadId,
        /// Thread that attempted the release
        caller: ThreadId,
    },

    /// `release()` was called on an ownership-enforcing lock that nobody holds
    #[error("permit released by {0:?} while not held")]
    NotHeld(ThreadId),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// The configuration parsed but holds an unusable value
    #[error("invalid configuration value: {0}")]
    Invalid(String),
}

/// Failure recorded when a task body returns an error or panics.
///
/// `TaskError` is a plain value: it is cloned into every reader of the
/// task's result and handed to result observers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("task {}: {message}", outcome_verb(.panicked))]
pub struct TaskError {
    message: String,
    panicked: bool,
}

impl TaskError {
    /// Create an error for a task that returned a failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            panicked: false,
        }
    }

    /// Create an error for a task whose body panicked.
    pub fn panicked(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            panicked: true,
        }
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the failure came from a panic rather than a returned error.
    pub fn is_panic(&self) -> bool {
        self.panicked
    }
}

fn outcome_verb(panicked: &bool) -> &'static str {
    if *panicked {
        "panicked"
    } else {
        "failed"
    }
}

/// Result type used throughout Cadence.
pub type Result<T> = std::result::Result<T, Error>;
