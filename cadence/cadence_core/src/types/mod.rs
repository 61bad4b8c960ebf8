//! Data model shared by every Cadence component.

pub mod result;
pub mod schedule;
pub mod state;
pub mod timeout;

pub use result::{AnyValue, FutureResult, ResultEvent};
pub use schedule::Schedule;
pub use state::ExecutorState;
pub use timeout::Timeout;
