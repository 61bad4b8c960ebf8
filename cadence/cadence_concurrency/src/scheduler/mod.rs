//! Task scheduling and execution.
//!
//! - [`Executor`](executor::Executor): lifecycle, submission and the result observer
//! - [`TaskFuture`](future::TaskFuture): handle to a submitted task
//! - [`Strategy`](strategy::Strategy) with two implementations: a worker
//!   pool and a cooperative timer

pub mod config;
pub mod cooperative;
pub mod executor;
pub mod future;
pub(crate) mod lifecycle;
pub mod pool_strategy;
pub mod strategy;
pub mod task;

pub use config::{ExecutorConfig, StrategyKind};
pub use cooperative::CooperativeStrategy;
pub use executor::{Executor, ExecutorStats, ResultObserver};
pub use future::{ResultCell, TaskFuture};
pub use pool_strategy::ThreadPoolStrategy;
pub use strategy::{Job, Strategy, StrategyStats};
pub use task::Task;
