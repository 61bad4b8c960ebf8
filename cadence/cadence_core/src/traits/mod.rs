//! Core traits.

pub mod acquirable;

pub use acquirable::{Acquirable, PermitGuard};
