//! Schema model for Lattice collections.
//!
//! A [`StoreSchema`] names the typed models of a store: each [`Model`]
//! declares a collection's attributes (possibly nested records and
//! sub-query relationships) and its read/write rules (predicate-based row
//! security). This crate also provides path resolution into a model and
//! the codec that persists a schema as triples under `_metadata#_schema`.

mod model;
mod triples;

pub use model::{schema_from_path, CollectionRules, Model, Rule, StoreSchema};
pub use triples::{
    json_to_tuples, schema_entity_id, schema_to_triples, triples_to_schema, tuples_to_json,
    EMPTY_CONTAINER_MARKER, METADATA_COLLECTION, SCHEMA_ENTITY_KEY,
};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by schema resolution and persistence.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An attribute path does not resolve inside the model's type tree.
    #[error("invalid schema path {path:?}: {reason}")]
    InvalidSchemaPath { path: Vec<String>, reason: String },

    /// Stored schema triples do not reconstruct to a valid schema.
    #[error("malformed schema triples: {0}")]
    MalformedSchemaTriples(String),

    #[error(transparent)]
    Value(#[from] lattice_values::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
