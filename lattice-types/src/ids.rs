//! Entity id helpers.
//!
//! External ids are opaque user strings. Internally an entity is addressed
//! as `collection#externalId`; splitting an internal id must yield exactly
//! two parts, so the separator is reserved and rejected in external ids.

use crate::{Error, Result};

/// Separator between the collection name and the external id.
pub const ID_SEPARATOR: char = '#';

/// Validates a user-supplied external id.
///
/// Rejects empty ids and ids containing the reserved separator.
pub fn validate_external_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidEntityId {
            id: id.to_string(),
            reason: "id cannot be empty".to_string(),
        });
    }
    if id.contains(ID_SEPARATOR) {
        return Err(Error::InvalidEntityId {
            id: id.to_string(),
            reason: format!("id cannot include {ID_SEPARATOR:?}"),
        });
    }
    Ok(())
}

/// Builds the internal id `collection#id`.
#[must_use]
pub fn append_collection_to_id(collection: &str, id: &str) -> String {
    format!("{collection}{ID_SEPARATOR}{id}")
}

/// Splits an internal id into `(collection, external_id)`.
///
/// A malformed internal id is a programming error, not bad user input; the
/// caller should treat it as non-recoverable.
pub fn split_id_parts(id: &str) -> Result<(&str, &str)> {
    let mut parts = id.split(ID_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(collection), Some(external), None) => Ok((collection, external)),
        _ => Err(Error::InvalidInternalEntityId(id.to_string())),
    }
}

/// Strips the collection prefix from an internal id.
pub fn strip_collection_from_id(id: &str) -> Result<&str> {
    split_id_parts(id).map(|(_, external)| external)
}
