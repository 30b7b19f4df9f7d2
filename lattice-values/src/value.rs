//! The native (in-host) representation of attribute values.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// A native attribute value, as seen by callers of the database.
///
/// Distinct from the JSON storage form: dates are real date values here and
/// ISO-8601 strings in storage. [`crate::DataType`] converts between the
/// two shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum LatticeValue {
    Null,
    String(String),
    Number(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Set(Vec<LatticeValue>),
    Record(BTreeMap<String, LatticeValue>),
}

impl LatticeValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for LatticeValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for LatticeValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for LatticeValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for LatticeValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<DateTime<Utc>> for LatticeValue {
    fn from(d: DateTime<Utc>) -> Self {
        Self::Date(d)
    }
}

/// Lossy structural view of a JSON value as a native value, with no schema
/// to guide it: strings stay strings (never dates), arrays become sets,
/// objects become records. Schema-directed conversion lives on `DataType`.
impl From<&Value> for LatticeValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(*b),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Set(items.iter().map(Self::from).collect()),
            Value::Object(map) => Self::Record(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}
