//! Per-type options: nullability and default values.

use crate::{Error, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Options carried by every scalar attribute type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeOptions {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
}

impl TypeOptions {
    /// Options with no nullability and no default.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Nullable, no default.
    #[must_use]
    pub fn nullable() -> Self {
        Self {
            nullable: true,
            default: None,
        }
    }

    /// A static literal default.
    #[must_use]
    pub fn with_default(value: impl Into<Value>) -> Self {
        Self {
            nullable: false,
            default: Some(DefaultValue::Literal(value.into())),
        }
    }

    /// A function default (`"now"`, `"uuid"`).
    #[must_use]
    pub fn with_default_fn(func: impl Into<String>, args: Option<Vec<Value>>) -> Self {
        Self {
            nullable: false,
            default: Some(DefaultValue::Function {
                func: func.into(),
                args,
            }),
        }
    }

    /// Rejects self-contradictory combinations, fail-fast at definition
    /// time rather than at first use.
    pub fn validate(&self) -> Result<()> {
        if !self.nullable && matches!(self.default, Some(DefaultValue::Literal(Value::Null))) {
            return Err(Error::InvalidTypeOptions(
                "non-nullable type cannot default to null".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn is_default(&self) -> bool {
        !self.nullable && self.default.is_none()
    }
}

/// A declared default: a literal, or a named function dispatched through
/// the default registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Function {
        func: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<Vec<Value>>,
    },
    Literal(Value),
}

type DefaultResolver = fn(&[Value]) -> Value;

/// The default-function registry. Adding a function is additive here;
/// unrecognized names resolve to absent rather than erroring, because
/// authoring-time validation is expected to have rejected them already.
fn resolver_for(func: &str) -> Option<DefaultResolver> {
    match func {
        "uuid" => Some(uuid_default),
        "now" => Some(now_default),
        _ => None,
    }
}

/// Resolves an options' declared default to a storable JSON value.
///
/// Returns `None` when no default is declared, or when a function default
/// names an unrecognized function.
#[must_use]
pub(crate) fn resolve_default(options: &TypeOptions) -> Option<Value> {
    match options.default.as_ref()? {
        DefaultValue::Literal(value) => Some(value.clone()),
        DefaultValue::Function { func, args } => {
            let resolver = resolver_for(func)?;
            Some(resolver(args.as_deref().unwrap_or(&[])))
        }
    }
}

/// Random identifier; a numeric first argument requests an exact length.
fn uuid_default(args: &[Value]) -> Value {
    let mut id = Uuid::new_v4().simple().to_string();
    if let Some(len) = args.first().and_then(Value::as_u64) {
        let len = len as usize;
        while id.len() < len {
            id.push_str(&Uuid::new_v4().simple().to_string());
        }
        id.truncate(len);
    }
    Value::String(id)
}

/// Current time rendered as an ISO-8601 string.
fn now_default(_args: &[Value]) -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}
