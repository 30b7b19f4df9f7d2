//! Logical clock timestamps for last-writer-wins ordering.
//!
//! A timestamp pairs a per-replica counter with the replica's id, giving a
//! total order across all replicas:
//! - counters compare first,
//! - replica ids break ties lexicographically.
//!
//! Two timestamps are equal iff both components are equal, which the clock's
//! uniqueness guarantee should make impossible for independent writes.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A logical timestamp: `(counter, replica_id)`.
///
/// Serializes as the two-element JSON array `[counter, "replica"]`, the wire
/// form stored inside every triple's register.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64, String);

impl Timestamp {
    /// Creates a timestamp from components.
    #[must_use]
    pub fn new(counter: u64, replica: impl Into<String>) -> Self {
        Self(counter, replica.into())
    }

    /// Returns the counter component.
    #[must_use]
    pub const fn counter(&self) -> u64 {
        self.0
    }

    /// Returns the replica id component.
    #[must_use]
    pub fn replica(&self) -> &str {
        &self.1
    }

    /// Returns the successor timestamp on the same replica.
    #[must_use]
    pub fn next(&self) -> Self {
        Self(self.0 + 1, self.1.clone())
    }

    /// Returns true if this timestamp orders strictly before the other.
    #[must_use]
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }

    /// Returns true if this timestamp orders strictly after the other.
    #[must_use]
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.0.cmp(&other.0) {
            Ordering::Equal => self.1.cmp(&other.1),
            ordering => ordering,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.0, self.1)
    }
}
