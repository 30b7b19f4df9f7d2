//! Collection models and schema-path resolution.

use crate::{Error, Result};
use lattice_query::Where;
use lattice_values::{DataType, TypeOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named security predicate. Read rules narrow query results; write
/// rules gate mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub filter: Where,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Ordered, named rule sets for one collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionRules {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub read: BTreeMap<String, Rule>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub write: BTreeMap<String, Rule>,
}

impl CollectionRules {
    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.write.is_empty()
    }
}

/// One collection's declared shape: top-level attributes plus rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub schema: BTreeMap<String, DataType>,

    #[serde(default, skip_serializing_if = "CollectionRules::is_empty")]
    pub rules: CollectionRules,
}

impl Model {
    #[must_use]
    pub fn new(schema: BTreeMap<String, DataType>) -> Self {
        Self {
            schema,
            rules: CollectionRules::default(),
        }
    }

    #[must_use]
    pub fn with_rules(mut self, rules: CollectionRules) -> Self {
        self.rules = rules;
        self
    }

    #[must_use]
    pub fn read_rule(mut self, name: impl Into<String>, filter: Where) -> Self {
        self.rules.read.insert(
            name.into(),
            Rule {
                filter,
                description: None,
            },
        );
        self
    }

    #[must_use]
    pub fn write_rule(mut self, name: impl Into<String>, filter: Where) -> Self {
        self.rules.write.insert(
            name.into(),
            Rule {
                filter,
                description: None,
            },
        );
        self
    }
}

/// A versioned set of collection models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSchema {
    pub version: u32,
    pub collections: BTreeMap<String, Model>,
}

impl StoreSchema {
    #[must_use]
    pub fn new(version: u32) -> Self {
        Self {
            version,
            collections: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn collection(mut self, name: impl Into<String>, model: Model) -> Self {
        self.collections.insert(name.into(), model);
        self
    }

    #[must_use]
    pub fn model(&self, collection: &str) -> Option<&Model> {
        self.collections.get(collection)
    }
}

/// Resolves an attribute path against a model's type tree.
///
/// Record properties are walked segment by segment. One trailing segment
/// under a set addresses a member's presence flag (stored as a boolean).
/// Reaching a sub-query type stops resolution and returns it — the
/// remaining suffix belongs to the sub-query's own collection.
pub fn schema_from_path(schema: &BTreeMap<String, DataType>, path: &[String]) -> Result<DataType> {
    let invalid = |reason: &str| Error::InvalidSchemaPath {
        path: path.to_vec(),
        reason: reason.to_string(),
    };

    let (first, rest) = path
        .split_first()
        .ok_or_else(|| invalid("path is empty"))?;
    let mut current = schema
        .get(first)
        .cloned()
        .ok_or_else(|| invalid("no such attribute"))?;

    let mut remaining = rest;
    while let Some((segment, rest)) = remaining.split_first() {
        current = match current {
            DataType::Record { ref properties } => properties
                .get(segment)
                .cloned()
                .ok_or_else(|| invalid("no such record property"))?,
            DataType::Set { .. } => {
                if !rest.is_empty() {
                    return Err(invalid("set members have no nested attributes"));
                }
                DataType::Boolean(TypeOptions::none())
            }
            DataType::Query { .. } => return Ok(current),
            _ => return Err(invalid("cannot descend into a leaf value type")),
        };
        remaining = rest;
    }
    Ok(current)
}
