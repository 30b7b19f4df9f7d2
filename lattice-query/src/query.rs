//! Declarative collection queries.

use crate::{Filter, Where};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Sort direction for an `order` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Asc,
    Desc,
}

/// A declarative query over one collection.
///
/// The raw form a caller builds; the preparation pipeline in `lattice-db`
/// rewrites it (variables, security rules, sub-query expansion) into the
/// canonical form an executor consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionQuery {
    pub collection_name: String,

    #[serde(default, rename = "where", skip_serializing_if = "Vec::is_empty")]
    pub where_: Where,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<(String, Direction)>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Query-level variable bindings; override session variables of the
    /// same name during preparation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vars: Option<BTreeMap<String, Value>>,

    /// Shortcut for fetching a single entity by external id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl CollectionQuery {
    /// Creates an empty query over a collection.
    #[must_use]
    pub fn new(collection_name: impl Into<String>) -> Self {
        Self {
            collection_name: collection_name.into(),
            where_: Vec::new(),
            select: None,
            order: None,
            limit: None,
            vars: None,
            entity_id: None,
        }
    }

    /// Appends a filter to the `where` clause.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.where_.push(filter);
        self
    }

    #[must_use]
    pub fn select(mut self, attributes: Vec<String>) -> Self {
        self.select = Some(attributes);
        self
    }

    #[must_use]
    pub fn order_by(mut self, attribute: impl Into<String>, direction: Direction) -> Self {
        self.order
            .get_or_insert_with(Vec::new)
            .push((attribute.into(), direction));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }
}
