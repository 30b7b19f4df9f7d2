//! The serialized JSON form of an attribute type.
//!
//! Shape: `{"type": kind, "options": {...}, items?|properties?|query?}`
//! depending on the kind — the grammar a schema persists to triples and
//! reconstructs types from.

use crate::{DataType, Error, Result, TypeOptions};
use lattice_query::CollectionQuery;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The kinds a triple may store directly (leaf value types).
pub const VALUE_TYPE_KINDS: [&str; 4] = ["string", "number", "boolean", "date"];

/// A serialized attribute type definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "TypeOptions::is_default")]
    pub options: TypeOptions,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<AttributeDefinition>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, AttributeDefinition>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Box<CollectionQuery>>,
}

impl AttributeDefinition {
    fn scalar(kind: &str, options: TypeOptions) -> Self {
        Self {
            kind: kind.to_string(),
            options,
            items: None,
            properties: None,
            query: None,
        }
    }
}

impl DataType {
    /// Serializes this type to its definition form.
    #[must_use]
    pub fn to_definition(&self) -> AttributeDefinition {
        match self {
            Self::String(o) | Self::Number(o) | Self::Boolean(o) | Self::Date(o) => {
                AttributeDefinition::scalar(self.kind(), o.clone())
            }
            Self::Set { items } => AttributeDefinition {
                items: Some(Box::new(items.to_definition())),
                ..AttributeDefinition::scalar("set", TypeOptions::none())
            },
            Self::Record { properties } => AttributeDefinition {
                properties: Some(
                    properties
                        .iter()
                        .map(|(key, property)| (key.clone(), property.to_definition()))
                        .collect(),
                ),
                ..AttributeDefinition::scalar("record", TypeOptions::none())
            },
            Self::Query { query } => AttributeDefinition {
                query: Some(query.clone()),
                ..AttributeDefinition::scalar("query", TypeOptions::none())
            },
        }
    }

    /// Reconstructs a type from its serialized definition.
    ///
    /// Fails with [`Error::MissingAttributeDefinition`] when the definition
    /// (or a required sub-definition) is absent, and
    /// [`Error::UnrecognizedAttributeType`] for unknown kinds — both
    /// indicate corrupted or incompatible schema data.
    pub fn from_definition(definition: Option<&AttributeDefinition>) -> Result<Self> {
        let definition = definition.ok_or(Error::MissingAttributeDefinition)?;
        match definition.kind.as_str() {
            "string" => Self::string(definition.options.clone()),
            "number" => Self::number(definition.options.clone()),
            "boolean" => Self::boolean(definition.options.clone()),
            "date" => Self::date(definition.options.clone()),
            "set" => {
                let items = Self::from_definition(definition.items.as_deref())?;
                Self::set(items)
            }
            "record" => {
                let properties = definition
                    .properties
                    .as_ref()
                    .ok_or(Error::MissingAttributeDefinition)?;
                properties
                    .iter()
                    .map(|(key, def)| {
                        Self::from_definition(Some(def)).map(|dt| (key.clone(), dt))
                    })
                    .collect::<Result<BTreeMap<_, _>>>()
                    .map(Self::record)
            }
            "query" => definition
                .query
                .as_deref()
                .cloned()
                .map(Self::query)
                .ok_or(Error::MissingAttributeDefinition),
            other => Err(Error::UnrecognizedAttributeType(other.to_string())),
        }
    }
}

impl TryFrom<AttributeDefinition> for DataType {
    type Error = Error;

    fn try_from(definition: AttributeDefinition) -> Result<Self> {
        Self::from_definition(Some(&definition))
    }
}

impl From<DataType> for AttributeDefinition {
    fn from(data_type: DataType) -> Self {
        data_type.to_definition()
    }
}
