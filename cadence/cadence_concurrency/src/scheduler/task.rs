//! Units of work.
//!
//! A [`Task`] is a zero-argument body invoked once per scheduled run. The
//! scheduler never looks inside it: it calls the body, and whatever comes
//! back (a value, a returned error, or a panic) becomes the run's outcome.

use cadence_core::error::TaskError;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

type Body<T> = Box<dyn FnMut() -> Result<T, TaskError> + Send + 'static>;

/// A zero-argument unit of work producing `T`.
///
/// Side-effecting work uses `T = ()` via [`Task::effect`]. Bodies are
/// `FnMut` because recurring schedules call them repeatedly.
pub struct Task<T> {
    body: Body<T>,
}

impl<T> Task<T> {
    /// A task whose body produces a value.
    pub fn new<F>(mut f: F) -> Self
    where
        F: FnMut() -> T + Send + 'static,
    {
        Self {
            body: Box::new(move || Ok(f())),
        }
    }

    /// A task whose body may fail; the error's `Display` becomes the
    /// recorded failure message.
    pub fn fallible<F, E>(mut f: F) -> Self
    where
        F: FnMut() -> Result<T, E> + Send + 'static,
        E: fmt::Display,
    {
        Self {
            body: Box::new(move || f().map_err(|e| TaskError::new(e.to_string()))),
        }
    }

    /// Invoke the body once, converting a panic into a failure.
    pub(crate) fn call(&mut self) -> Result<T, TaskError> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.body)())) {
            Ok(outcome) => outcome,
            Err(payload) => Err(TaskError::panicked(panic_message(payload.as_ref()))),
        }
    }
}

impl Task<()> {
    /// A side-effecting task.
    pub fn effect<F>(f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::new(f)
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<unknown panic>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_task() {
        let mut n = 0;
        let mut task = Task::new(move || {
            n += 1;
            n
        });
        assert_eq!(task.call(), Ok(1));
        assert_eq!(task.call(), Ok(2));
    }

    #[test]
    fn test_fallible_task() {
        let mut task: Task<u8> = Task::fallible(|| Err::<u8, _>("disk full"));
        let err = task.call().unwrap_err();
        assert_eq!(err.message(), "disk full");
        assert!(!err.is_panic());
    }

    #[test]
    fn test_panic_becomes_failure() {
        let mut task: Task<()> = Task::effect(|| panic!("kaboom"));
        let err = task.call().unwrap_err();
        assert!(err.is_panic());
        assert_eq!(err.message(), "kaboom");

        let mut task: Task<()> = Task::effect(|| panic!("code {}", 7));
        assert_eq!(task.call().unwrap_err().message(), "code 7");
    }
}
