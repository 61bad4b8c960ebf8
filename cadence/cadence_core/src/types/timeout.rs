//! Millisecond timeout arguments.
//!
//! Blocking operations take a signed millisecond count with a fixed
//! encoding: `0` checks once without blocking, a positive value bounds the
//! wait, `-1` waits forever, and anything below `-1` is rejected.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// How long a blocking operation may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Check once and return immediately
    Immediate,

    /// Wait at most this long
    Bounded(Duration),

    /// Wait until the condition holds
    Unbounded,
}

impl Timeout {
    /// Sentinel millisecond value meaning "wait forever".
    pub const UNBOUNDED_MS: i64 = -1;

    /// Parse a millisecond timeout argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for values below `-1`.
    pub fn from_millis(timeout_ms: i64) -> Result<Self> {
        match timeout_ms {
            0 => Ok(Self::Immediate),
            Self::UNBOUNDED_MS => Ok(Self::Unbounded),
            ms if ms > 0 => Ok(Self::Bounded(Duration::from_millis(ms as u64))),
            ms => Err(Error::InvalidArgument(format!(
                "timeout must be >= -1 milliseconds, got {}",
                ms
            ))),
        }
    }

    /// Monotonic deadline for this timeout, starting at `start`.
    ///
    /// `None` means no deadline.
    pub fn deadline_from(&self, start: Instant) -> Option<Instant> {
        match self {
            Self::Immediate => Some(start),
            Self::Bounded(d) => Some(start + *d),
            Self::Unbounded => None,
        }
    }

    /// Whether this timeout never blocks.
    pub fn is_immediate(&self) -> bool {
        matches!(self, Self::Immediate)
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            Self::Immediate
        } else {
            Self::Bounded(d)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_millis() {
        assert_eq!(Timeout::from_millis(0).unwrap(), Timeout::Immediate);
        assert_eq!(Timeout::from_millis(-1).unwrap(), Timeout::Unbounded);
        assert_eq!(
            Timeout::from_millis(250).unwrap(),
            Timeout::Bounded(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_rejects_below_unbounded() {
        for ms in [-2, -100, i64::MIN] {
            match Timeout::from_millis(ms) {
                Err(Error::InvalidArgument(msg)) => assert!(msg.contains(&ms.to_string())),
                other => panic!("expected InvalidArgument, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_deadline() {
        let now = Instant::now();
        assert_eq!(Timeout::Immediate.deadline_from(now), Some(now));
        assert_eq!(Timeout::Unbounded.deadline_from(now), None);
        assert_eq!(
            Timeout::Bounded(Duration::from_millis(5)).deadline_from(now),
            Some(now + Duration::from_millis(5))
        );
        assert_eq!(Timeout::from(Duration::ZERO), Timeout::Immediate);
    }
}
