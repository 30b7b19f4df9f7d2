//! The recursive filter tree.

use crate::CollectionQuery;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// An ordered sequence of filters, combined by implicit AND at the top level.
pub type Where = Vec<Filter>;

/// Comparison operators supported by filter statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "nlike")]
    NLike,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "nin")]
    NIn,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Lte => "<=",
            Self::Gte => ">=",
            Self::Like => "like",
            Self::NLike => "nlike",
            Self::In => "in",
            Self::NIn => "nin",
        };
        f.write_str(symbol)
    }
}

/// A leaf filter: `[attribute, operator, value]`.
///
/// The attribute is a dotted path relative to the queried collection
/// (e.g. `"profile.age"`). Serializes as a three-element JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, Operator, Value)", into = "(String, Operator, Value)")]
pub struct FilterStatement {
    pub attribute: String,
    pub op: Operator,
    pub value: Value,
}

impl FilterStatement {
    #[must_use]
    pub fn new(attribute: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            attribute: attribute.into(),
            op,
            value: value.into(),
        }
    }
}

impl From<(String, Operator, Value)> for FilterStatement {
    fn from((attribute, op, value): (String, Operator, Value)) -> Self {
        Self {
            attribute,
            op,
            value,
        }
    }
}

impl From<FilterStatement> for (String, Operator, Value) {
    fn from(statement: FilterStatement) -> Self {
        (statement.attribute, statement.op, statement.value)
    }
}

/// How a group's filters combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    And,
    Or,
}

/// A nested group of filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub combinator: Combinator,
    pub filters: Where,
}

/// An existential sub-query node: matches when the wrapped query yields at
/// least one result. Its interior carries its own variable scope and is
/// opaque to outer traversals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQueryFilter {
    pub exists: Box<CollectionQuery>,
}

/// One node of a `where` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Filter {
    Statement(FilterStatement),
    Group(FilterGroup),
    Exists(SubQueryFilter),
}

impl Filter {
    /// Shorthand for a statement leaf.
    #[must_use]
    pub fn statement(
        attribute: impl Into<String>,
        op: Operator,
        value: impl Into<Value>,
    ) -> Self {
        Self::Statement(FilterStatement::new(attribute, op, value))
    }

    /// Shorthand for an existential sub-query node.
    #[must_use]
    pub fn exists(query: CollectionQuery) -> Self {
        Self::Exists(SubQueryFilter {
            exists: Box::new(query),
        })
    }
}

/// Groups filters under AND.
#[must_use]
pub fn and(filters: Where) -> Filter {
    Filter::Group(FilterGroup {
        combinator: Combinator::And,
        filters,
    })
}

/// Groups filters under OR.
#[must_use]
pub fn or(filters: Where) -> Filter {
    Filter::Group(FilterGroup {
        combinator: Combinator::Or,
        filters,
    })
}
