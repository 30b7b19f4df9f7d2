//! Error types for the database facade.

use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors surfaced by the database facade.
#[derive(Debug, Error)]
pub enum DbError {
    /// A query references a `$`-variable with no binding in scope. Rejects
    /// query preparation entirely; there is no partial execution.
    #[error("session variable {0:?} is not bound")]
    SessionVariableNotFound(String),

    /// An update or delete targeted an entity that does not exist.
    #[error("entity {collection}#{id} not found")]
    EntityNotFound { collection: String, id: String },

    /// An entity was supplied (or materialized) as something other than a
    /// JSON object.
    #[error("entity in {0} is not a JSON object")]
    MalformedEntity(String),

    #[error(transparent)]
    Store(#[from] lattice_store::StoreError),

    #[error(transparent)]
    Types(#[from] lattice_types::Error),

    #[error(transparent)]
    Values(#[from] lattice_values::Error),

    #[error(transparent)]
    Model(#[from] lattice_model::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
