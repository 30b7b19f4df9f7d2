//! The closed sum of recognized attribute types.

use crate::definition::AttributeDefinition;
use crate::options::resolve_default;
use crate::{Error, LatticeValue, Result, TypeOptions};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use lattice_query::CollectionQuery;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An attribute's declared type.
///
/// Scalar arms (string, number, boolean, date) are the leaf value types a
/// triple can store. `Set` and `Record` are containers addressed through
/// their leaves; `Query` is a schema-declared relationship resolved at
/// query-preparation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AttributeDefinition", into = "AttributeDefinition")]
pub enum DataType {
    String(TypeOptions),
    Number(TypeOptions),
    Boolean(TypeOptions),
    Date(TypeOptions),
    /// Homogeneous set of one scalar element type. Members are stored as
    /// presence booleans under the member's serialized form.
    Set { items: Box<DataType> },
    /// Nested record; properties are full type definitions themselves,
    /// which is what lets defaults and validation recurse structurally.
    Record {
        properties: BTreeMap<String, DataType>,
    },
    /// Sub-query-valued attribute: reading it runs the declared query.
    Query { query: Box<CollectionQuery> },
}

impl DataType {
    // ── Constructors (fail-fast on malformed options) ────────────

    pub fn string(options: TypeOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::String(options))
    }

    pub fn number(options: TypeOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::Number(options))
    }

    pub fn boolean(options: TypeOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::Boolean(options))
    }

    pub fn date(options: TypeOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::Date(options))
    }

    /// A set of the given element type; elements must be scalar.
    pub fn set(items: DataType) -> Result<Self> {
        if !items.is_leaf() {
            return Err(Error::InvalidTypeOptions(format!(
                "set elements must be a scalar value type, got {}",
                items.kind()
            )));
        }
        Ok(Self::Set {
            items: Box::new(items),
        })
    }

    #[must_use]
    pub fn record(properties: BTreeMap<String, DataType>) -> Self {
        Self::Record { properties }
    }

    #[must_use]
    pub fn query(query: CollectionQuery) -> Self {
        Self::Query {
            query: Box::new(query),
        }
    }

    // ── Introspection ────────────────────────────────────────────

    /// The serialized kind tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Boolean(_) => "boolean",
            Self::Date(_) => "date",
            Self::Set { .. } => "set",
            Self::Record { .. } => "record",
            Self::Query { .. } => "query",
        }
    }

    /// True for scalar value types — the only types a triple may store
    /// directly.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        matches!(
            self,
            Self::String(_) | Self::Number(_) | Self::Boolean(_) | Self::Date(_)
        )
    }

    #[must_use]
    pub const fn options(&self) -> Option<&TypeOptions> {
        match self {
            Self::String(o) | Self::Number(o) | Self::Boolean(o) | Self::Date(o) => Some(o),
            _ => None,
        }
    }

    fn nullable(&self) -> bool {
        self.options().is_some_and(|o| o.nullable)
    }

    // ── Validation ───────────────────────────────────────────────

    /// True iff the native value satisfies this type's shape (or is null
    /// and the type is nullable).
    #[must_use]
    pub fn validate_input(&self, value: &LatticeValue) -> bool {
        if value.is_null() {
            return self.nullable();
        }
        match self {
            Self::String(_) => matches!(value, LatticeValue::String(_)),
            Self::Number(_) => matches!(value, LatticeValue::Number(n) if n.is_finite()),
            Self::Boolean(_) => matches!(value, LatticeValue::Boolean(_)),
            Self::Date(_) => matches!(value, LatticeValue::Date(_)),
            Self::Set { items } => match value {
                LatticeValue::Set(members) => {
                    members.iter().all(|member| {
                        !member.is_null() && items.validate_input(member)
                    })
                }
                _ => false,
            },
            Self::Record { properties } => match value {
                LatticeValue::Record(map) => {
                    // Every present key must be declared and valid; absent
                    // properties are only acceptable when nullable.
                    map.keys().all(|key| properties.contains_key(key))
                        && properties.iter().all(|(key, property)| match map.get(key) {
                            Some(v) => property.validate_input(v),
                            None => property.nullable(),
                        })
                }
                _ => false,
            },
            Self::Query { .. } => false,
        }
    }

    /// Validates the *stored* triple shape, which for nullable types is the
    /// union `(native-shape | null)` — distinct from [`Self::validate_input`],
    /// which governs the pre-storage native shape.
    #[must_use]
    pub fn validate_triple_value(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.nullable();
        }
        match self {
            Self::String(_) => value.is_string(),
            Self::Number(_) => value.is_number(),
            Self::Boolean(_) => value.is_boolean(),
            Self::Date(_) => value.as_str().is_some_and(|s| parse_date(s).is_ok()),
            // Containers and sub-queries are never stored directly.
            Self::Set { .. } | Self::Record { .. } | Self::Query { .. } => false,
        }
    }

    // ── Conversion ───────────────────────────────────────────────

    /// Converts a native value to its JSON storage form.
    ///
    /// Fails with [`Error::Serializing`] when [`Self::validate_input`] is
    /// false. Dates render to ISO-8601 strings; set members are deduplicated.
    pub fn convert_input_to_json(&self, value: &LatticeValue) -> Result<Value> {
        if !self.validate_input(value) {
            return Err(Error::Serializing {
                kind: self.kind(),
                value: debug_json(value),
            });
        }
        Ok(self.input_to_json_unchecked(value))
    }

    fn input_to_json_unchecked(&self, value: &LatticeValue) -> Value {
        match (self, value) {
            (_, LatticeValue::Null) => Value::Null,
            (_, LatticeValue::String(s)) => Value::String(s.clone()),
            (_, LatticeValue::Boolean(b)) => Value::Bool(*b),
            (_, LatticeValue::Number(n)) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            (_, LatticeValue::Date(d)) => Value::String(render_date(d)),
            (Self::Set { items }, LatticeValue::Set(members)) => {
                let mut out: Vec<Value> = Vec::with_capacity(members.len());
                for member in members {
                    let json = items.input_to_json_unchecked(member);
                    if !out.contains(&json) {
                        out.push(json);
                    }
                }
                Value::Array(out)
            }
            (Self::Record { properties }, LatticeValue::Record(map)) => {
                let mut out = serde_json::Map::new();
                for (key, property) in properties {
                    if let Some(v) = map.get(key) {
                        out.insert(key.clone(), property.input_to_json_unchecked(v));
                    }
                }
                Value::Object(out)
            }
            // validate_input already rejected everything else
            _ => Value::Null,
        }
    }

    /// Inverse of [`Self::convert_input_to_json`]: maps the JSON storage
    /// form back to the native representation (e.g. ISO string → date).
    pub fn convert_json_value_to_native(&self, value: &Value) -> Result<LatticeValue> {
        if value.is_null() {
            if self.nullable() {
                return Ok(LatticeValue::Null);
            }
            return Err(self.serializing_error(value));
        }
        match self {
            Self::String(_) => value
                .as_str()
                .map(|s| LatticeValue::String(s.to_string()))
                .ok_or_else(|| self.serializing_error(value)),
            Self::Number(_) => value
                .as_f64()
                .map(LatticeValue::Number)
                .ok_or_else(|| self.serializing_error(value)),
            Self::Boolean(_) => value
                .as_bool()
                .map(LatticeValue::Boolean)
                .ok_or_else(|| self.serializing_error(value)),
            Self::Date(_) => {
                let text = value.as_str().ok_or_else(|| self.serializing_error(value))?;
                parse_date(text).map(LatticeValue::Date)
            }
            Self::Set { items } => {
                let members = value
                    .as_array()
                    .ok_or_else(|| self.serializing_error(value))?;
                members
                    .iter()
                    .map(|member| items.convert_json_value_to_native(member))
                    .collect::<Result<Vec<_>>>()
                    .map(LatticeValue::Set)
            }
            Self::Record { properties } => {
                let map = value
                    .as_object()
                    .ok_or_else(|| self.serializing_error(value))?;
                let mut out = BTreeMap::new();
                for (key, v) in map {
                    let property = properties
                        .get(key)
                        .ok_or_else(|| self.serializing_error(value))?;
                    out.insert(key.clone(), property.convert_json_value_to_native(v)?);
                }
                Ok(LatticeValue::Record(out))
            }
            Self::Query { .. } => Err(self.serializing_error(value)),
        }
    }

    fn serializing_error(&self, value: &Value) -> Error {
        Error::Serializing {
            kind: self.kind(),
            value: value.clone(),
        }
    }

    // ── Parsing ──────────────────────────────────────────────────

    /// Parses a user-supplied string form of this type.
    pub fn from_string(&self, text: &str) -> Result<LatticeValue> {
        match self {
            Self::String(_) => Ok(LatticeValue::String(text.to_string())),
            Self::Number(_) => text
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(LatticeValue::Number)
                .ok_or_else(|| Error::InvalidNumber(text.to_string())),
            Self::Boolean(_) => match text {
                "true" => Ok(LatticeValue::Boolean(true)),
                "false" => Ok(LatticeValue::Boolean(false)),
                _ => Err(Error::InvalidBoolean(text.to_string())),
            },
            Self::Date(_) => parse_date(text).map(LatticeValue::Date),
            Self::Set { .. } | Self::Record { .. } | Self::Query { .. } => {
                Err(Error::UnparsableType(self.kind()))
            }
        }
    }

    // ── Defaults ─────────────────────────────────────────────────

    /// Resolves this type's default, if any, to its JSON storage form.
    ///
    /// Scalars resolve literals directly and functions through the
    /// registry. A record resolves to the object of its properties'
    /// defaults — fully defaulted or, when every property default is
    /// absent, absent as a whole.
    #[must_use]
    pub fn default_value(&self) -> Option<Value> {
        match self {
            Self::String(o) | Self::Number(o) | Self::Boolean(o) | Self::Date(o) => {
                resolve_default(o)
            }
            Self::Record { properties } => {
                let mut out = serde_json::Map::new();
                for (key, property) in properties {
                    if let Some(default) = property.default_value() {
                        out.insert(key.clone(), default);
                    }
                }
                if out.is_empty() {
                    None
                } else {
                    Some(Value::Object(out))
                }
            }
            Self::Set { .. } | Self::Query { .. } => None,
        }
    }
}

// ── Date helpers ─────────────────────────────────────────────────

/// Canonical serialized form: ISO-8601 with millisecond precision, UTC.
pub(crate) fn render_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses RFC 3339, falling back to a bare `YYYY-MM-DD` date at UTC
/// midnight.
pub(crate) fn parse_date(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(date) = text.parse::<NaiveDate>() {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(DateTime::from_naive_utc_and_offset(midnight, Utc));
        }
    }
    Err(Error::InvalidDate(text.to_string()))
}

fn debug_json(value: &LatticeValue) -> Value {
    match value {
        LatticeValue::Null => Value::Null,
        LatticeValue::String(s) => Value::String(s.clone()),
        LatticeValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        LatticeValue::Boolean(b) => Value::Bool(*b),
        LatticeValue::Date(d) => Value::String(render_date(d)),
        LatticeValue::Set(items) => Value::Array(items.iter().map(debug_json).collect()),
        LatticeValue::Record(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), debug_json(v)))
                .collect(),
        ),
    }
}
