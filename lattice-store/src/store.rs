//! The triple store: `(entity, attribute-path, register)` facts.

use crate::{StoreError, StoreResult, TupleKey, TupleStorage};
use lattice_model::{
    schema_from_path, schema_to_triples, triples_to_schema, schema_entity_id, StoreSchema,
    EMPTY_CONTAINER_MARKER, METADATA_COLLECTION,
};
use lattice_types::{Clock, Timestamp};
use lattice_values::VALUE_TYPE_KINDS;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// Reserved pseudo-collection marking entity existence.
pub(crate) const COLLECTION_MARKER: &str = "_collection";

/// One stored fact: an entity's attribute register plus the expiry flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripleRow {
    /// Internal entity id (`collection#externalId`).
    pub id: String,
    /// Dotted path rooted at the collection name.
    pub attribute: Vec<String>,
    pub value: Value,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub expired: bool,
}

impl TripleRow {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        attribute: Vec<String>,
        value: Value,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            attribute,
            value,
            timestamp,
            expired: false,
        }
    }

    fn key(&self) -> TupleKey {
        let mut key = Vec::with_capacity(self.attribute.len() + 1);
        key.push(self.id.clone());
        key.extend(self.attribute.iter().cloned());
        key
    }
}

/// The stored register payload under a tuple key.
#[derive(Debug, Serialize, Deserialize)]
struct StoredCell {
    value: Value,
    timestamp: Timestamp,
    #[serde(default)]
    expired: bool,
}

/// The triple store over a pluggable tuple storage backend.
///
/// Holds the active schema (if any); every user-collection write is
/// validated against it before anything is persisted. Clocks are passed
/// into the operations that stamp writes rather than owned here.
pub struct TripleStore<S: TupleStorage> {
    storage: S,
    schema: Option<StoreSchema>,
}

impl<S: TupleStorage> TripleStore<S> {
    /// Creates a store with no schema loaded (schemaless mode).
    #[must_use]
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            schema: None,
        }
    }

    /// Opens a store, loading any schema previously persisted to it.
    pub fn open(storage: S) -> StoreResult<Self> {
        let mut store = Self::new(storage);
        store.schema = store.read_schema()?;
        Ok(store)
    }

    #[must_use]
    pub fn schema(&self) -> Option<&StoreSchema> {
        self.schema.as_ref()
    }

    pub fn set_schema(&mut self, schema: Option<StoreSchema>) {
        self.schema = schema;
    }

    // ── Reads ────────────────────────────────────────────────────

    /// All triples (live and expired) for one entity.
    pub fn find_by_entity(&self, id: &str) -> StoreResult<Vec<TripleRow>> {
        let prefix = vec![id.to_string()];
        self.storage
            .scan_prefix(&prefix)?
            .into_iter()
            .map(|(key, payload)| decode_row(&key, payload))
            .collect()
    }

    /// Internal ids of all live entities in a collection, in key order.
    pub fn entity_ids(&self, collection: &str) -> StoreResult<Vec<String>> {
        let mut ids = Vec::new();
        for (key, payload) in self.storage.scan_prefix(&[])? {
            if key.len() == 2 && key[1] == COLLECTION_MARKER {
                let cell: StoredCell = serde_json::from_value(payload)?;
                if !cell.expired && cell.value.as_str() == Some(collection) {
                    ids.push(key[0].clone());
                }
            }
        }
        Ok(ids)
    }

    /// The highest timestamp counter ever persisted, across all replicas.
    /// Expired rows count; their timestamps were issued too.
    pub fn max_counter(&self) -> StoreResult<u64> {
        let mut max = 0;
        for (_, payload) in self.storage.scan_prefix(&[])? {
            let cell: StoredCell = serde_json::from_value(payload)?;
            max = max.max(cell.timestamp.counter());
        }
        Ok(max)
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Persists a batch of triples, all-or-nothing.
    ///
    /// When a schema is loaded, every row is validated first; a single
    /// failure rejects the batch with nothing written.
    pub fn insert_triples(&mut self, rows: Vec<TripleRow>) -> StoreResult<()> {
        if let Some(schema) = &self.schema {
            for row in &rows {
                validate_triple(Some(schema), &row.attribute, &row.value)?;
            }
        }
        debug!(count = rows.len(), "inserting triples");
        for row in rows {
            let key = row.key();
            let cell = StoredCell {
                value: row.value,
                timestamp: row.timestamp,
                expired: row.expired,
            };
            self.storage.insert(key, serde_json::to_value(&cell)?)?;
        }
        Ok(())
    }

    /// Marks the given triples expired. Never physically removes them.
    pub fn delete_triples(&mut self, rows: &[TripleRow]) -> StoreResult<()> {
        for row in rows {
            let cell = StoredCell {
                value: row.value.clone(),
                timestamp: row.timestamp.clone(),
                expired: true,
            };
            self.storage.insert(row.key(), serde_json::to_value(&cell)?)?;
        }
        Ok(())
    }

    // ── Schema persistence ───────────────────────────────────────

    /// All triples under the reserved schema entity.
    pub fn get_schema_triples(&self) -> StoreResult<Vec<TripleRow>> {
        self.find_by_entity(&schema_entity_id())
    }

    /// Reconstructs the stored schema, or `None` when none is persisted.
    pub fn read_schema(&self) -> StoreResult<Option<StoreSchema>> {
        let live: Vec<(Vec<String>, Value)> = self
            .get_schema_triples()?
            .into_iter()
            .filter(|row| !row.expired)
            .map(|row| (row.attribute, row.value))
            .collect();
        if live.is_empty() {
            return Ok(None);
        }
        Ok(Some(triples_to_schema(live)?))
    }

    /// Replaces the stored schema wholesale: every existing schema triple
    /// is expired and the new set is inserted under one fresh timestamp,
    /// so a reader never observes a half-old/half-new schema.
    pub fn override_stored_schema(
        &mut self,
        schema: &StoreSchema,
        clock: &dyn Clock,
    ) -> StoreResult<()> {
        let existing = self.get_schema_triples()?;
        self.delete_triples(&existing)?;

        let timestamp = clock.next_timestamp()?;
        let rows: Vec<TripleRow> = schema_to_triples(schema)?
            .into_iter()
            .map(|(id, attribute, value)| {
                TripleRow::new(id, attribute, value, timestamp.clone())
            })
            .collect();
        self.insert_triples(rows)?;
        self.schema = Some(schema.clone());
        info!(version = schema.version, "stored schema replaced");
        Ok(())
    }
}

/// Validates one triple against the active schema before persistence.
///
/// Reserved collections (`_metadata`, `_collection`) bypass validation.
/// The `"{}"` empty-container marker is allowed at record and set paths to
/// initialize an empty container; all other writes must target a leaf
/// value type whose stored shape accepts the value.
pub fn validate_triple(
    schema: Option<&StoreSchema>,
    attribute: &[String],
    value: &Value,
) -> StoreResult<()> {
    let schema = schema.ok_or(StoreError::NoSchemaRegistered)?;

    let (collection, path) = match attribute.split_first() {
        Some(parts) => parts,
        None => {
            return Err(StoreError::InvalidSchemaPath {
                path: Vec::new(),
                reason: "empty attribute path".to_string(),
            })
        }
    };

    if collection == COLLECTION_MARKER || collection == METADATA_COLLECTION {
        return Ok(());
    }

    let model = schema
        .model(collection)
        .ok_or_else(|| StoreError::ModelNotFound {
            collection: collection.clone(),
            known: schema.collections.keys().cloned().collect(),
        })?;

    let value_type =
        schema_from_path(&model.schema, path).map_err(|err| StoreError::InvalidSchemaPath {
            path: path.to_vec(),
            reason: err.to_string(),
        })?;

    // Empty-container marker initializes a record or set.
    if value.as_str() == Some(EMPTY_CONTAINER_MARKER)
        && matches!(value_type.kind(), "record" | "set")
    {
        return Ok(());
    }

    if !VALUE_TYPE_KINDS.contains(&value_type.kind()) {
        return Err(StoreError::InvalidSchemaPath {
            path: path.to_vec(),
            reason: format!(
                "cannot write a value to a {} type; set values at its leaves",
                value_type.kind()
            ),
        });
    }

    if !value_type.validate_triple_value(value) {
        return Err(StoreError::ValueSchemaMismatch {
            collection: collection.clone(),
            path: path.join("."),
            value: value.clone(),
        });
    }
    Ok(())
}

fn decode_row(key: &[String], payload: Value) -> StoreResult<TripleRow> {
    let cell: StoredCell = serde_json::from_value(payload)?;
    let (id, attribute) = key.split_first().ok_or_else(|| {
        StoreError::Backend("storage returned an empty tuple key".to_string())
    })?;
    Ok(TripleRow {
        id: id.clone(),
        attribute: attribute.to_vec(),
        value: cell.value,
        timestamp: cell.timestamp,
        expired: cell.expired,
    })
}
