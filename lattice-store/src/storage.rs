//! The key-sorted tuple storage contract.
//!
//! On-disk backends live outside this core; they implement [`TupleStorage`]
//! and plug into [`crate::TripleStore`]. Keys sort lexicographically
//! segment by segment, so all of an entity's tuples are contiguous under
//! its id prefix.

use crate::StoreResult;
use serde_json::Value;
use std::collections::BTreeMap;

/// A storage key: ordered string segments, compared segment-wise.
pub type TupleKey = Vec<String>;

/// A sorted key-value tuple store supporting prefix range scans.
///
/// Each call is expected to be atomic: a failed write leaves no partial
/// state behind. Retries and backoff are the backend's own concern.
pub trait TupleStorage: Send {
    /// Returns all tuples whose key starts with `prefix`, in key order.
    /// An empty prefix scans everything.
    fn scan_prefix(&self, prefix: &[String]) -> StoreResult<Vec<(TupleKey, Value)>>;

    /// Inserts or replaces the tuple at `key`.
    fn insert(&mut self, key: TupleKey, value: Value) -> StoreResult<()>;

    /// Removes the tuple at `key`, if present.
    fn remove(&mut self, key: &[String]) -> StoreResult<()>;
}

/// In-memory reference backend over a `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemoryTupleStorage {
    tuples: BTreeMap<TupleKey, Value>,
}

impl MemoryTupleStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }
}

impl TupleStorage for MemoryTupleStorage {
    fn scan_prefix(&self, prefix: &[String]) -> StoreResult<Vec<(TupleKey, Value)>> {
        // Keys sharing a prefix are contiguous in segment-wise order.
        Ok(self
            .tuples
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn insert(&mut self, key: TupleKey, value: Value) -> StoreResult<()> {
        self.tuples.insert(key, value);
        Ok(())
    }

    fn remove(&mut self, key: &[String]) -> StoreResult<()> {
        self.tuples.remove(key);
        Ok(())
    }
}
