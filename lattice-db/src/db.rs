//! The embeddable database facade.

use crate::eval::{member_segment, order_compare, where_matches};
use crate::{prepare_query, DbError, DbResult, QueryOptions};
use lattice_model::{json_to_tuples, Model, StoreSchema};
use lattice_query::{CollectionQuery, Direction};
use lattice_store::{
    construct_entity, MemoryTupleStorage, TripleRow, TripleStore, TupleStorage,
};
use lattice_types::{
    append_collection_to_id, split_id_parts, validate_external_id, Clock, MemoryClock,
};
use lattice_values::DataType;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// Query results: an ordered mapping external id → materialized entity.
pub type QueryResults = Vec<(String, Value)>;

/// Delivery metadata passed alongside each subscription result set.
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionInfo {
    /// Whether the result set reflects all known writes. Always true for a
    /// local store; remote-backed stores report their sync state here.
    pub has_remote_fulfilled: bool,
}

struct SubscriptionEntry {
    id: u64,
    query: CollectionQuery,
    options: QueryOptions,
    on_results: Box<dyn FnMut(QueryResults, SubscriptionInfo) + Send>,
    on_error: Box<dyn FnMut(DbError) + Send>,
}

/// Registered entries plus cancellations recorded while a notification
/// had the entries checked out of the lock.
#[derive(Default)]
struct SubscriptionRegistry {
    entries: Vec<SubscriptionEntry>,
    cancelled: Vec<u64>,
}

type SubscriptionList = Arc<Mutex<SubscriptionRegistry>>;

/// A live subscription handle. Unsubscribes when dropped.
pub struct Subscription {
    id: u64,
    registry: SubscriptionList,
}

impl Subscription {
    /// Stops delivery. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut registry = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = registry.entries.len();
        registry.entries.retain(|entry| entry.id != self.id);
        if registry.entries.len() == before {
            // An in-flight notification has the entry checked out; leave
            // the cancellation for it to apply when it merges back.
            registry.cancelled.push(self.id);
        }
    }
}

/// An embeddable triple database over a pluggable storage backend.
///
/// Writes are validated against the active schema, stamped by the injected
/// clock, and committed all-or-nothing. Reads run the preparation pipeline
/// and evaluate the canonical filter tree entity by entity.
pub struct Db<S: TupleStorage> {
    store: TripleStore<S>,
    clock: Arc<dyn Clock>,
    variables: BTreeMap<String, Value>,
    subscriptions: SubscriptionList,
    next_subscription_id: u64,
}

impl Db<MemoryTupleStorage> {
    /// An ephemeral in-memory database with a process-local clock.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryTupleStorage::new(), Arc::new(MemoryClock::new()))
    }
}

impl<S: TupleStorage> Db<S> {
    /// Creates a database over fresh storage.
    #[must_use]
    pub fn new(storage: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: TripleStore::new(storage),
            clock,
            variables: BTreeMap::new(),
            subscriptions: Arc::new(Mutex::new(SubscriptionRegistry::default())),
            next_subscription_id: 0,
        }
    }

    /// Opens a database over existing storage, loading any stored schema.
    pub fn open(storage: S, clock: Arc<dyn Clock>) -> DbResult<Self> {
        Ok(Self {
            store: TripleStore::open(storage)?,
            clock,
            variables: BTreeMap::new(),
            subscriptions: Arc::new(Mutex::new(SubscriptionRegistry::default())),
            next_subscription_id: 0,
        })
    }

    #[must_use]
    pub fn schema(&self) -> Option<&StoreSchema> {
        self.store.schema()
    }

    /// Persists and activates a schema, replacing any stored one wholesale.
    pub fn define_schema(&mut self, schema: &StoreSchema) -> DbResult<()> {
        self.store
            .override_stored_schema(schema, self.clock.as_ref())?;
        Ok(())
    }

    /// Binds a session variable, referenced from queries as `$name`.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Inserts an entity, returning its external id.
    ///
    /// A string `"id"` attribute names the entity (validated against the
    /// reserved separator); when absent a random id is generated. Schema
    /// defaults fill missing attributes, values are canonicalized to their
    /// storage form, and all triples commit under one fresh timestamp.
    pub fn insert(&mut self, collection: &str, entity: Value) -> DbResult<String> {
        let Value::Object(mut map) = entity else {
            return Err(DbError::MalformedEntity(collection.to_string()));
        };

        let external = match map.remove("id") {
            Some(Value::String(id)) => {
                validate_external_id(&id)?;
                id
            }
            Some(other) => {
                return Err(lattice_types::Error::InvalidEntityId {
                    id: other.to_string(),
                    reason: "id must be a string".to_string(),
                }
                .into())
            }
            None => Uuid::new_v4().to_string(),
        };

        let storage_map = match self.model(collection) {
            Some(model) => convert_record(&model.schema, map, true)?,
            None => map,
        };

        let internal = append_collection_to_id(collection, &external);
        let timestamp = self.clock.next_timestamp()?;
        let mut rows = vec![TripleRow::new(
            internal.clone(),
            vec!["_collection".to_string()],
            Value::String(collection.to_string()),
            timestamp.clone(),
        )];
        if !storage_map.is_empty() {
            for (path, value) in json_to_tuples(&Value::Object(storage_map)) {
                let mut attribute = Vec::with_capacity(path.len() + 1);
                attribute.push(collection.to_string());
                attribute.extend(path);
                rows.push(TripleRow::new(
                    internal.clone(),
                    attribute,
                    value,
                    timestamp.clone(),
                ));
            }
        }

        debug!(collection, id = %external, "inserting entity");
        self.store.insert_triples(rows)?;
        self.notify(collection);
        Ok(external)
    }

    /// Applies an in-place edit to an entity's JSON form and commits the
    /// changed leaves with fresh timestamps; removed leaves are expired.
    pub fn update(
        &mut self,
        collection: &str,
        id: &str,
        updater: impl FnOnce(&mut Map<String, Value>),
    ) -> DbResult<()> {
        let internal = append_collection_to_id(collection, id);
        let rows = self.store.find_by_entity(&internal)?;
        let entity =
            construct_entity(&rows, &internal)?.ok_or_else(|| DbError::EntityNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        let Value::Object(mut map) = entity else {
            return Err(DbError::MalformedEntity(collection.to_string()));
        };

        let mut before = map.clone();
        before.remove("id");

        updater(&mut map);
        map.remove("id");

        let model = self.model(collection).cloned();
        let after = match &model {
            Some(model) => convert_record(&model.schema, map, false)?,
            None => map,
        };

        let before_tuples: BTreeMap<Vec<String>, Value> =
            json_to_tuples(&Value::Object(before)).into_iter().collect();
        let after_tuples: BTreeMap<Vec<String>, Value> =
            json_to_tuples(&Value::Object(after)).into_iter().collect();

        let timestamp = self.clock.next_timestamp()?;
        let mut writes = Vec::new();
        for (path, value) in &after_tuples {
            if before_tuples.get(path) != Some(value) {
                let mut attribute = Vec::with_capacity(path.len() + 1);
                attribute.push(collection.to_string());
                attribute.extend(path.iter().cloned());
                writes.push(TripleRow::new(
                    internal.clone(),
                    attribute,
                    value.clone(),
                    timestamp.clone(),
                ));
            }
        }

        let removed: Vec<TripleRow> = rows
            .into_iter()
            .filter(|row| {
                !row.expired
                    && row.attribute.first().map(String::as_str) == Some(collection)
                    && !after_tuples.contains_key(&row.attribute[1..])
            })
            .collect();

        if writes.is_empty() && removed.is_empty() {
            return Ok(());
        }
        debug!(
            collection,
            id,
            written = writes.len(),
            removed = removed.len(),
            "updating entity"
        );
        if !writes.is_empty() {
            self.store.insert_triples(writes)?;
        }
        if !removed.is_empty() {
            self.store.delete_triples(&removed)?;
        }
        self.notify(collection);
        Ok(())
    }

    /// Expires all of an entity's triples, including its existence marker.
    pub fn delete(&mut self, collection: &str, id: &str) -> DbResult<()> {
        let internal = append_collection_to_id(collection, id);
        let live: Vec<TripleRow> = self
            .store
            .find_by_entity(&internal)?
            .into_iter()
            .filter(|row| !row.expired)
            .collect();
        if live.is_empty() {
            return Err(DbError::EntityNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        debug!(collection, id, "deleting entity");
        self.store.delete_triples(&live)?;
        self.notify(collection);
        Ok(())
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Runs a query, returning an ordered mapping id → entity.
    pub fn fetch(&self, query: &CollectionQuery) -> DbResult<QueryResults> {
        self.fetch_with_options(query, QueryOptions::default())
    }

    pub fn fetch_with_options(
        &self,
        query: &CollectionQuery,
        options: QueryOptions,
    ) -> DbResult<QueryResults> {
        let prepared = prepare_query(
            query,
            self.model(&query.collection_name),
            &self.variables,
            options,
        )?;

        let internal_ids = match &prepared.entity_id {
            Some(external) => vec![append_collection_to_id(
                &prepared.collection_name,
                external,
            )],
            None => self.store.entity_ids(&prepared.collection_name)?,
        };

        let mut results: QueryResults = Vec::new();
        for internal in internal_ids {
            let rows = self.store.find_by_entity(&internal)?;
            let Some(entity) = construct_entity(&rows, &internal)? else {
                continue;
            };
            let (_, external) = split_id_parts(&internal)?;
            let external = external.to_string();

            let mut exists = |sub: &CollectionQuery| -> DbResult<bool> {
                // The outer entity's id is in scope inside the sub-query.
                let mut sub = sub.clone();
                sub.vars
                    .get_or_insert_with(BTreeMap::new)
                    .insert("id".to_string(), Value::String(external.clone()));
                Ok(!self.fetch_with_options(&sub, options)?.is_empty())
            };
            if where_matches(&entity, &prepared.where_, &mut exists)? {
                results.push((external, entity));
            }
        }

        if let Some(order) = &prepared.order {
            results.sort_by(|(_, a), (_, b)| {
                for (attribute, direction) in order {
                    let ordering = match direction {
                        Direction::Asc => order_compare(a, b, attribute),
                        Direction::Desc => order_compare(a, b, attribute).reverse(),
                    };
                    if ordering != std::cmp::Ordering::Equal {
                        return ordering;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }
        if let Some(limit) = prepared.limit {
            results.truncate(limit);
        }
        if let Some(select) = &prepared.select {
            for (_, entity) in &mut results {
                *entity = apply_select(entity, select);
            }
        }
        Ok(results)
    }

    /// Fetches one entity by external id, or `None` when absent.
    pub fn fetch_by_id(&self, collection: &str, id: &str) -> DbResult<Option<Value>> {
        let query = CollectionQuery::new(collection).entity_id(id);
        let mut results = self.fetch(&query)?;
        Ok(results.pop().map(|(_, entity)| entity))
    }

    // ── Subscriptions ────────────────────────────────────────────

    /// Subscribes to a query: the current results are delivered
    /// immediately, then again after every committed write touching the
    /// collection. Re-evaluation errors go to `on_error`.
    pub fn subscribe(
        &mut self,
        query: CollectionQuery,
        on_results: impl FnMut(QueryResults, SubscriptionInfo) + Send + 'static,
        on_error: impl FnMut(DbError) + Send + 'static,
        options: QueryOptions,
    ) -> Subscription {
        let mut on_results: Box<dyn FnMut(QueryResults, SubscriptionInfo) + Send> =
            Box::new(on_results);
        let mut on_error: Box<dyn FnMut(DbError) + Send> = Box::new(on_error);

        match self.fetch_with_options(&query, options) {
            Ok(results) => on_results(results, SubscriptionInfo {
                has_remote_fulfilled: true,
            }),
            Err(err) => on_error(err),
        }

        self.next_subscription_id += 1;
        let id = self.next_subscription_id;
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .push(SubscriptionEntry {
                id,
                query,
                options,
                on_results,
                on_error,
            });
        Subscription {
            id,
            registry: Arc::clone(&self.subscriptions),
        }
    }

    /// Re-evaluates subscriptions touching `collection`. The entries are
    /// checked out of the lock first, so a callback may drop its own
    /// subscription handle without deadlocking.
    fn notify(&self, collection: &str) {
        let mut taken = {
            let mut registry = self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut registry.entries)
        };
        for entry in taken
            .iter_mut()
            .filter(|entry| entry.query.collection_name == collection)
        {
            match self.fetch_with_options(&entry.query, entry.options) {
                Ok(results) => (entry.on_results)(results, SubscriptionInfo {
                    has_remote_fulfilled: true,
                }),
                Err(err) => (entry.on_error)(err),
            }
        }

        let mut registry = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let cancelled = std::mem::take(&mut registry.cancelled);
        taken.retain(|entry| !cancelled.contains(&entry.id));
        registry.entries.append(&mut taken);
    }

    fn model(&self, collection: &str) -> Option<&Model> {
        self.store
            .schema()
            .and_then(|schema| schema.model(collection))
    }
}

// ── Result projection ────────────────────────────────────────────

/// Projects an entity down to the selected attribute paths. Dotted paths
/// select individual leaves inside records; `"id"` is always retained.
fn apply_select(entity: &Value, select: &[String]) -> Value {
    let Some(source) = entity.as_object() else {
        return entity.clone();
    };
    let mut out = Map::new();
    if let Some(id) = source.get("id") {
        out.insert("id".to_string(), id.clone());
    }
    for path in select {
        let segments: Vec<&str> = path.split('.').collect();
        copy_selected_path(source, &segments, &mut out);
    }
    Value::Object(out)
}

fn copy_selected_path(source: &Map<String, Value>, segments: &[&str], out: &mut Map<String, Value>) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = source.get(*first) else {
        return;
    };
    if rest.is_empty() {
        out.insert((*first).to_string(), value.clone());
        return;
    }
    // A dotted path into a non-record selects nothing.
    if let Value::Object(inner) = value {
        let slot = out
            .entry((*first).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(target) = slot {
            copy_selected_path(inner, rest, target);
        }
    }
}

// ── Input canonicalization ───────────────────────────────────────

/// Converts an entity's attributes to their storage form against the
/// declared properties: leaves round-trip through the type's native
/// representation, sets become presence maps, records recurse. Undeclared
/// keys pass through for triple validation to reject.
fn convert_record(
    properties: &BTreeMap<String, DataType>,
    map: Map<String, Value>,
    with_defaults: bool,
) -> DbResult<Map<String, Value>> {
    let mut out = Map::new();
    for (key, value) in map {
        match properties.get(&key) {
            Some(property) => {
                out.insert(key, convert_value(property, value, with_defaults)?);
            }
            None => {
                out.insert(key, value);
            }
        }
    }
    if with_defaults {
        for (key, property) in properties {
            if !out.contains_key(key) {
                if let Some(default) = property.default_value() {
                    out.insert(key.clone(), default);
                }
            }
        }
    }
    Ok(out)
}

fn convert_value(property: &DataType, value: Value, with_defaults: bool) -> DbResult<Value> {
    match property {
        DataType::Record { properties } => match value {
            Value::Object(map) => Ok(Value::Object(convert_record(
                properties,
                map,
                with_defaults,
            )?)),
            other => Err(serializing(property, other).into()),
        },
        DataType::Set { items } => match value {
            Value::Array(members) => {
                let mut out = Map::new();
                for member in members {
                    let native = items.convert_json_value_to_native(&member)?;
                    let canonical = items.convert_input_to_json(&native)?;
                    out.insert(member_segment(&canonical), Value::Bool(true));
                }
                Ok(Value::Object(out))
            }
            // Already in presence-map form.
            Value::Object(members) => Ok(Value::Object(members)),
            other => Err(serializing(property, other).into()),
        },
        DataType::Query { .. } => Err(serializing(property, value).into()),
        leaf => {
            let native = leaf.convert_json_value_to_native(&value)?;
            Ok(leaf.convert_input_to_json(&native)?)
        }
    }
}

fn serializing(property: &DataType, value: Value) -> lattice_values::Error {
    lattice_values::Error::Serializing {
        kind: property.kind(),
        value,
    }
}
