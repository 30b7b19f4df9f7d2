//! Core type definitions for Lattice.
//!
//! This crate defines the fundamental types shared by every layer of the
//! triple store:
//! - Logical clock timestamps and the [`Clock`] trait
//! - Entity id helpers (external ids, internal `collection#id` ids)
//!
//! Domain-specific value and schema types belong in `lattice-values` and
//! `lattice-model`, not here.

mod clock;
mod ids;
mod timestamp;

pub use clock::{Clock, MemoryClock};
pub use ids::{
    append_collection_to_id, split_id_parts, strip_collection_from_id, validate_external_id,
    ID_SEPARATOR,
};
pub use timestamp::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A user-supplied entity id violates the reserved-separator rule.
    /// Recoverable: reject the write and re-prompt.
    #[error("invalid entity id {id:?}: {reason}")]
    InvalidEntityId { id: String, reason: String },

    /// An internal `collection#id` string is malformed. This indicates an
    /// internal invariant violation, not bad user input.
    #[error("malformed internal entity id {0:?}: expected exactly one {ID_SEPARATOR:?} separator")]
    InvalidInternalEntityId(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
