#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Cadence Concurrency
//!
//! Scheduling machinery for the Cadence executor.
//!
//! This crate provides:
//!
//! - The [`Executor`] and its RUNNING → STOPPING → STOPPED lifecycle
//! - Task handles with blocking, timeout-aware result waits
//! - A thread-pool strategy and a cooperative single-thread strategy
//! - Permit locks and atomic primitives shared by both
//!
//! Data types (schedules, results, errors) live in `cadence_core`.

/// Worker pools backing the thread-pool strategy
pub mod pool;

/// Executor, task handles and scheduling strategies
pub mod scheduler;

/// Permit locks and atomic primitives
pub mod sync;

pub use pool::thread::ThreadPool;
pub use scheduler::config::{ExecutorConfig, StrategyKind};
pub use scheduler::executor::{Executor, ExecutorStats};
pub use scheduler::future::TaskFuture;
pub use scheduler::task::Task;
pub use sync::{OwnedLock, Semaphore};
