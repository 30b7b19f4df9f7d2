//! Entity reconstruction from stored triples.

use crate::{StoreResult, TripleRow};
use crate::store::COLLECTION_MARKER;
use lattice_model::tuples_to_json;
use lattice_types::split_id_parts;
use lattice_values::Register;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Rebuilds one entity from its triples.
///
/// Rows are folded per attribute path with last-writer-wins merge, so the
/// input may carry duplicates from multiple sync sources. An expired
/// winner tombstones its attribute; when a live and an expired row carry
/// the very same register, the expiry dominates. The surviving leaves are
/// unflattened into a nested JSON object with the external id injected
/// under `"id"`.
///
/// Returns `Ok(None)` when no live attribute survives — the entity is
/// deleted or unknown.
pub fn construct_entity(rows: &[TripleRow], internal_id: &str) -> StoreResult<Option<Value>> {
    let (_, external_id) = split_id_parts(internal_id)?;

    let mut winners: BTreeMap<&[String], (Register, bool)> = BTreeMap::new();
    for row in rows {
        if row.id != internal_id {
            continue;
        }
        if row.attribute.first().map(String::as_str) == Some(COLLECTION_MARKER) {
            continue;
        }
        let incoming = Register::new(row.value.clone(), row.timestamp.clone());
        match winners.entry(row.attribute.as_slice()) {
            Entry::Vacant(slot) => {
                slot.insert((incoming, row.expired));
            }
            Entry::Occupied(mut slot) => {
                let (register, expired) = slot.get_mut();
                match incoming.timestamp().cmp(register.timestamp()) {
                    Ordering::Greater => {
                        *register = incoming;
                        *expired = row.expired;
                    }
                    Ordering::Less => {}
                    Ordering::Equal => {
                        // Divergent values at one timestamp fail the merge.
                        register.merge(&incoming)?;
                        *expired = *expired || row.expired;
                    }
                }
            }
        }
    }

    let live: Vec<(Vec<String>, Value)> = winners
        .into_iter()
        .filter(|(_, (_, expired))| !expired)
        .map(|(path, (register, _))| {
            // Drop the collection segment; attribute paths are stored
            // rooted at the collection name.
            let (value, _) = register.into_parts();
            (path[1..].to_vec(), value)
        })
        .collect();

    if live.is_empty() {
        return Ok(None);
    }

    let mut entity = tuples_to_json(&live)?;
    if let Some(map) = entity.as_object_mut() {
        map.insert("id".to_string(), Value::String(external_id.to_string()));
    }
    Ok(Some(entity))
}
