//! Oplog timestamp ordering.

use serde::{Deserialize, Serialize};

/// The timestamp of an oplog entry: seconds since the epoch plus an
/// intra-second counter.
///
/// Ordering is lexicographic on `(time, counter)`, which the derive
/// provides through field order. Every destructive recovery decision in the
/// reconciler reduces to comparing these stamps, so the ordering here is
/// load-bearing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct OplogStamp {
    /// Seconds since the Unix epoch.
    pub time: u32,
    /// Ordinal of the operation within that second.
    pub counter: u32,
}

impl OplogStamp {
    /// Creates a stamp from its parts.
    #[must_use]
    pub fn new(time: u32, counter: u32) -> Self {
        Self { time, counter }
    }
}

impl std::fmt::Display for OplogStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.time, self.counter)
    }
}
