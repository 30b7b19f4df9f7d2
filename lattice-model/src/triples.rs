//! Schema persistence: JSON flattening and the schema ⇄ triples codec.
//!
//! The schema's JSON form is flattened into (attribute-path, value) tuples
//! so each leaf is individually addressable and timestamped, then stored
//! under the reserved entity `_metadata#_schema`. Empty objects flatten to
//! the `"{}"` container marker so an empty record survives the round trip.

use crate::{Error, Result, StoreSchema};
use lattice_types::append_collection_to_id;
use serde_json::Value;

/// Reserved pseudo-collection for store metadata.
pub const METADATA_COLLECTION: &str = "_metadata";

/// External id of the schema entity within `_metadata`.
pub const SCHEMA_ENTITY_KEY: &str = "_schema";

/// Leaf value marking an empty record or set container.
pub const EMPTY_CONTAINER_MARKER: &str = "{}";

/// Internal id of the schema entity: `_metadata#_schema`.
#[must_use]
pub fn schema_entity_id() -> String {
    append_collection_to_id(METADATA_COLLECTION, SCHEMA_ENTITY_KEY)
}

/// Flattens a JSON value into `(path, leaf)` tuples.
///
/// Objects flatten per key; everything else (including arrays, which are
/// stored whole) is a leaf. An empty object becomes a single
/// [`EMPTY_CONTAINER_MARKER`] leaf.
#[must_use]
pub fn json_to_tuples(value: &Value) -> Vec<(Vec<String>, Value)> {
    let mut out = Vec::new();
    flatten(value, &mut Vec::new(), &mut out);
    out
}

fn flatten(value: &Value, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, Value)>) {
    match value {
        Value::Object(map) if map.is_empty() => {
            out.push((path.clone(), Value::String(EMPTY_CONTAINER_MARKER.to_string())));
        }
        Value::Object(map) => {
            for (key, nested) in map {
                path.push(key.clone());
                flatten(nested, path, out);
                path.pop();
            }
        }
        leaf => out.push((path.clone(), leaf.clone())),
    }
}

/// Rebuilds a JSON value from `(path, leaf)` tuples. Inverse of
/// [`json_to_tuples`].
pub fn tuples_to_json(tuples: &[(Vec<String>, Value)]) -> Result<Value> {
    let mut root = Value::Object(serde_json::Map::new());
    for (path, leaf) in tuples {
        let leaf = match leaf {
            Value::String(s) if s == EMPTY_CONTAINER_MARKER => {
                Value::Object(serde_json::Map::new())
            }
            other => other.clone(),
        };
        if path.is_empty() {
            return Ok(leaf);
        }
        let mut cursor = &mut root;
        for segment in &path[..path.len() - 1] {
            let map = cursor.as_object_mut().ok_or_else(|| {
                Error::MalformedSchemaTriples(format!(
                    "path {path:?} descends through a non-object leaf"
                ))
            })?;
            cursor = map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
        }
        let map = cursor.as_object_mut().ok_or_else(|| {
            Error::MalformedSchemaTriples(format!(
                "path {path:?} descends through a non-object leaf"
            ))
        })?;
        map.insert(path[path.len() - 1].clone(), leaf);
    }
    Ok(root)
}

/// Serializes a schema to `(entity, attribute, value)` triples rooted at
/// `_metadata#_schema`. The caller stamps them with one fresh timestamp
/// and persists; replacement is always wholesale.
pub fn schema_to_triples(schema: &StoreSchema) -> Result<Vec<(String, Vec<String>, Value)>> {
    let json = serde_json::to_value(schema)?;
    let entity = schema_entity_id();
    Ok(json_to_tuples(&json)
        .into_iter()
        .map(|(path, value)| {
            let mut attribute =
                Vec::with_capacity(path.len() + 2);
            attribute.push(METADATA_COLLECTION.to_string());
            attribute.push(SCHEMA_ENTITY_KEY.to_string());
            attribute.extend(path);
            (entity.clone(), attribute, value)
        })
        .collect())
}

/// Reconstructs a schema from its stored `(attribute, value)` pairs.
/// Inverse of [`schema_to_triples`]; expired triples must be filtered out
/// by the caller.
pub fn triples_to_schema<I>(triples: I) -> Result<StoreSchema>
where
    I: IntoIterator<Item = (Vec<String>, Value)>,
{
    let tuples = triples
        .into_iter()
        .map(|(attribute, value)| {
            if attribute.len() < 2
                || attribute[0] != METADATA_COLLECTION
                || attribute[1] != SCHEMA_ENTITY_KEY
            {
                return Err(Error::MalformedSchemaTriples(format!(
                    "attribute {attribute:?} is not rooted at {METADATA_COLLECTION}.{SCHEMA_ENTITY_KEY}"
                )));
            }
            Ok((attribute[2..].to_vec(), value))
        })
        .collect::<Result<Vec<_>>>()?;

    if tuples.is_empty() {
        return Err(Error::MalformedSchemaTriples(
            "no schema triples to reconstruct".to_string(),
        ));
    }

    let json = tuples_to_json(&tuples)?;
    Ok(serde_json::from_value(json)?)
}
