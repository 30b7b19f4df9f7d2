//! Error types for the store layer.

use serde_json::Value;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
///
/// The triple-validation variants (`NoSchemaRegistered`, `ModelNotFound`,
/// `InvalidSchemaPath`, `ValueSchemaMismatch`) all reject the individual
/// write and leave the store unchanged.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error surfaced by the tuple storage backend.
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Triple validation was requested but no schema is loaded.
    #[error("no schema registered: cannot validate triples without a stored schema")]
    NoSchemaRegistered,

    /// The attribute path's collection segment has no matching model.
    #[error("model {collection:?} not found; known collections: {known:?}")]
    ModelNotFound {
        collection: String,
        known: Vec<String>,
    },

    /// The attribute path does not resolve to a writable leaf type.
    #[error("invalid schema path {path:?}: {reason}")]
    InvalidSchemaPath { path: Vec<String>, reason: String },

    /// The stored value shape does not satisfy the leaf type.
    #[error("value {value} does not match the schema type at {collection}.{path}")]
    ValueSchemaMismatch {
        collection: String,
        path: String,
        value: Value,
    },

    #[error(transparent)]
    Types(#[from] lattice_types::Error),

    #[error(transparent)]
    Values(#[from] lattice_values::Error),

    #[error(transparent)]
    Schema(#[from] lattice_model::Error),
}
