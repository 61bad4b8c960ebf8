#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Cadence Core
//!
//! Building blocks shared by the Cadence executor crates: the error
//! taxonomy, strongly-typed ids, the data model (schedules, results,
//! lifecycle states, timeouts) and the [`Acquirable`](traits::Acquirable)
//! permit contract.
//!
//! Nothing in this crate spawns threads or blocks on its own; the
//! scheduling machinery lives in `cadence_concurrency`.

pub mod error;
pub mod id;
pub mod traits;
pub mod types;
pub mod utils;

pub use error::{Error, Result};
pub use id::{ExecutorId, TaskId};
pub use traits::Acquirable;
pub use types::{AnyValue, ExecutorState, FutureResult, ResultEvent, Schedule, Timeout};
