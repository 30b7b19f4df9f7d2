//! Triple store for Lattice.
//!
//! The append-only set of `(entity, attribute-path, register)` facts,
//! persisted through a generic key-sorted tuple storage contract:
//!
//! - [`TupleStorage`] — the backend trait (range scans by key prefix);
//!   [`MemoryTupleStorage`] is the in-memory reference implementation
//! - [`TripleStore`] — read/write/delete plus schema persistence and
//!   per-triple schema validation
//! - [`DurableClock`] — a clock seeded from persisted triples so its
//!   counter never regresses across restarts
//! - [`construct_entity`] — rebuilds one entity by merging registers per
//!   attribute path
//!
//! Deletion marks triples expired rather than removing them; readers
//! filter on the flag.

mod clock;
mod entity;
mod error;
mod storage;
mod store;

pub use clock::DurableClock;
pub use entity::construct_entity;
pub use error::{StoreError, StoreResult};
pub use storage::{MemoryTupleStorage, TupleKey, TupleStorage};
pub use store::{validate_triple, TripleRow, TripleStore};
