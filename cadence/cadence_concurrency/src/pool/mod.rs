//! Worker pools backing the thread-pool strategy.

pub mod thread;

pub use thread::{ThreadPool, ThreadPoolConfig, ThreadPoolError, ThreadPoolStats};
