//! Strongly-typed identifiers.
//!
//! Every submitted task and every executor instance carries a UUID-backed id.
//! The phantom marker keeps a [`TaskId`] from being confused with an
//! [`ExecutorId`] even though both wrap the same representation.
//!
//! ```
//! use cadence_core::id::{ExecutorId, TaskId};
//! use std::str::FromStr;
//!
//! let task = TaskId::new();
//! let executor = ExecutorId::new();
//! assert_ne!(task.uuid(), executor.uuid());
//!
//! let parsed = TaskId::from_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
//! assert_eq!(parsed.to_string(), "550e8400-e29b-41d4-a716-446655440000");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use uuid::Uuid;

/// A type-safe identifier based on UUID.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Id<T> {
    uuid: Uuid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    /// Create a new random identifier.
    pub fn new() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            uuid,
            _marker: PhantomData,
        }
    }

    /// Get the underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The first eight hex digits, handy for log lines and worker names.
    pub fn short(&self) -> String {
        let mut s = self.uuid.simple().to_string();
        s.truncate(8);
        s
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.uuid)
    }
}

impl<T> FromStr for Id<T> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_uuid(Uuid::parse_str(s)?))
    }
}

/// Marker type for submitted tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskMarker;
/// Identifier for a submitted task.
pub type TaskId = Id<TaskMarker>;

/// Marker type for executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExecutorMarker;
/// Identifier for an executor instance.
pub type ExecutorId = Id<ExecutorMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_new() {
        let id1 = TaskId::new();
        let id2 = TaskId::new();
        assert_ne!(id1, id2, "Generated IDs should be unique");
    }

    #[test]
    fn test_id_display() {
        let id = TaskId::new();
        assert_eq!(id.to_string().len(), 36);
        assert_eq!(id.short().len(), 8);
        assert!(id.to_string().replace('-', "").starts_with(&id.short()));
    }

    #[test]
    fn test_id_from_str() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id = ExecutorId::from_str(uuid_str).unwrap();
        assert_eq!(id.to_string(), uuid_str);
        assert!(TaskId::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn test_type_safety() {
        let same_uuid = Uuid::new_v4();
        let task_id = TaskId::from_uuid(same_uuid);
        let executor_id = ExecutorId::from_uuid(same_uuid);

        // Same representation, distinct types.
        assert_eq!(task_id.uuid(), executor_id.uuid());
    }
}
