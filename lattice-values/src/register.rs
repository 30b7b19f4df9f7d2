//! The last-writer-wins register cell.
//!
//! A register pairs one attribute value with the timestamp of its last
//! write. Concurrent writes to the same entity + attribute path resolve by
//! timestamp total order; replica ids inside the timestamp make the order
//! deterministic across replicas.

use crate::{Error, Result};
use lattice_types::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// A timestamped value cell.
///
/// The value is stored in its JSON storage form; `null` is only legal when
/// the attribute's type declares `nullable` (enforced by triple validation,
/// not by the cell).
///
/// The merge operation is:
/// - Commutative: merge(a, b) == merge(b, a)
/// - Associative: merge(merge(a, b), c) == merge(a, merge(b, c))
/// - Idempotent: merge(a, a) == a
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Register {
    value: Value,
    timestamp: Timestamp,
}

impl Register {
    #[must_use]
    pub fn new(value: Value, timestamp: Timestamp) -> Self {
        Self { value, timestamp }
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn timestamp(&self) -> &Timestamp {
        &self.timestamp
    }

    #[must_use]
    pub fn into_parts(self) -> (Value, Timestamp) {
        (self.value, self.timestamp)
    }

    /// Merges another register for the same attribute into this one.
    ///
    /// The strictly greater timestamp wins outright. Equal timestamps with
    /// equal values are the idempotent case; equal timestamps with
    /// different values violate the clock's uniqueness guarantee and fail
    /// with [`Error::MergeConflict`] rather than resolving silently.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        match other.timestamp.cmp(&self.timestamp) {
            Ordering::Greater => {
                self.value = other.value.clone();
                self.timestamp = other.timestamp.clone();
                Ok(())
            }
            Ordering::Less => Ok(()),
            Ordering::Equal => {
                if self.value == other.value {
                    Ok(())
                } else {
                    Err(Error::MergeConflict {
                        timestamp: self.timestamp.clone(),
                        left: self.value.clone(),
                        right: other.value.clone(),
                    })
                }
            }
        }
    }

    /// Returns the merge of this register and another.
    pub fn merged(&self, other: &Self) -> Result<Self> {
        let mut result = self.clone();
        result.merge(other)?;
        Ok(result)
    }
}
