//! The durable clock: counters survive restarts.

use crate::{StoreResult, TripleStore, TupleStorage};
use lattice_types::{Clock, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};

/// A clock seeded from persisted triples.
///
/// Initialization scans the store for the highest counter ever persisted,
/// across all replicas, and resumes one past it. A restarted replica can
/// therefore never issue a timestamp that loses to a write it has already
/// received. If the scan fails, initialization fails; there is no fallback
/// to a colliding counter.
#[derive(Debug)]
pub struct DurableClock {
    replica: String,
    counter: AtomicU64,
}

impl DurableClock {
    /// Seeds a clock from the store's persisted triples.
    pub fn initialize<S: TupleStorage>(
        store: &TripleStore<S>,
        replica: impl Into<String>,
    ) -> StoreResult<Self> {
        let last_issued = store.max_counter()?;
        Ok(Self {
            replica: replica.into(),
            counter: AtomicU64::new(last_issued),
        })
    }
}

impl Clock for DurableClock {
    fn next_timestamp(&self) -> lattice_types::Result<Timestamp> {
        let counter = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Timestamp::new(counter, self.replica.clone()))
    }

    fn replica_id(&self) -> &str {
        &self.replica
    }
}
