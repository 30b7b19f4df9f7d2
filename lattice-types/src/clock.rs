//! Logical clocks: per-replica monotonic timestamp generators.
//!
//! Every value mutation is stamped with a timestamp from a clock. Within one
//! process the counter strictly increases on each call, including under
//! concurrent callers; uniqueness across replicas comes from the replica id
//! being part of the timestamp's identity.

use crate::{Result, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// A source of monotonically increasing timestamps for one replica.
///
/// Clocks are injected into the store and the database façade rather than
/// read from an ambient global, so tests can substitute a fixed clock.
pub trait Clock: Send + Sync {
    /// Issues the next timestamp. Strictly greater than every timestamp
    /// previously issued by this clock instance.
    fn next_timestamp(&self) -> Result<Timestamp>;

    /// The replica id stamped into every issued timestamp.
    fn replica_id(&self) -> &str;
}

/// An in-memory clock whose counter resets each process.
///
/// Suitable for ephemeral stores and tests. For a counter that survives
/// restarts, use the durable clock in `lattice-store`, which seeds itself
/// from persisted triples.
#[derive(Debug)]
pub struct MemoryClock {
    replica: String,
    counter: AtomicU64,
}

impl MemoryClock {
    /// Creates a clock with a freshly generated replica id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_replica(Uuid::new_v4().to_string())
    }

    /// Creates a clock for an explicit replica id.
    #[must_use]
    pub fn with_replica(replica: impl Into<String>) -> Self {
        Self {
            replica: replica.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Creates a clock whose first issued counter is `last_issued + 1`.
    #[must_use]
    pub fn starting_after(last_issued: u64, replica: impl Into<String>) -> Self {
        Self {
            replica: replica.into(),
            counter: AtomicU64::new(last_issued),
        }
    }
}

impl Default for MemoryClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MemoryClock {
    fn next_timestamp(&self) -> Result<Timestamp> {
        let counter = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Timestamp::new(counter, self.replica.clone()))
    }

    fn replica_id(&self) -> &str {
        &self.replica
    }
}
