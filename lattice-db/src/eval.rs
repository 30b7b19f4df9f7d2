//! Filter evaluation over materialized entities.
//!
//! Straightforward predicate evaluation of a prepared filter tree against
//! one reconstructed entity. `Exists` nodes are resolved through a caller
//! supplied callback so the evaluator stays independent of how sub-queries
//! are fetched.

use crate::DbResult;
use lattice_query::{CollectionQuery, Combinator, Filter, FilterStatement, Operator, Where};
use serde_json::Value;
use std::cmp::Ordering;

/// Does the entity satisfy every filter in the sequence (implicit AND)?
pub(crate) fn where_matches(
    entity: &Value,
    where_: &Where,
    exists: &mut dyn FnMut(&CollectionQuery) -> DbResult<bool>,
) -> DbResult<bool> {
    for filter in where_ {
        if !filter_matches(entity, filter, exists)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn filter_matches(
    entity: &Value,
    filter: &Filter,
    exists: &mut dyn FnMut(&CollectionQuery) -> DbResult<bool>,
) -> DbResult<bool> {
    match filter {
        Filter::Statement(statement) => Ok(statement_matches(entity, statement)),
        Filter::Group(group) => match group.combinator {
            Combinator::And => where_matches(entity, &group.filters, exists),
            Combinator::Or => {
                for nested in &group.filters {
                    if filter_matches(entity, nested, exists)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        },
        Filter::Exists(sub) => exists(&sub.exists),
    }
}

/// Evaluates one leaf statement.
///
/// A missing attribute only satisfies the negative operators: an absent
/// value is not equal to, not in, and not like anything.
pub(crate) fn statement_matches(entity: &Value, statement: &FilterStatement) -> bool {
    match attribute_value(entity, &statement.attribute) {
        Some(actual) => operator_matches(actual, statement.op, &statement.value),
        None => matches!(
            statement.op,
            Operator::Neq | Operator::NIn | Operator::NLike
        ),
    }
}

/// Resolves a dotted attribute path inside an entity.
pub(crate) fn attribute_value<'a>(entity: &'a Value, attribute: &str) -> Option<&'a Value> {
    let mut current = entity;
    for segment in attribute.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn operator_matches(actual: &Value, op: Operator, expected: &Value) -> bool {
    match op {
        Operator::Eq => value_eq(actual, expected),
        Operator::Neq => !value_eq(actual, expected),
        Operator::Lt => compare(actual, expected) == Some(Ordering::Less),
        Operator::Gt => compare(actual, expected) == Some(Ordering::Greater),
        Operator::Lte => matches!(
            compare(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Gte => matches!(
            compare(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Like => like_matches(actual, expected),
        Operator::NLike => !like_matches(actual, expected),
        Operator::In => expected
            .as_array()
            .is_some_and(|items| items.iter().any(|item| value_eq(actual, item))),
        Operator::NIn => !expected
            .as_array()
            .is_some_and(|items| items.iter().any(|item| value_eq(actual, item))),
    }
}

/// Equality, extended over set attributes: a set materializes as a
/// presence map, so comparing it against a scalar means membership.
fn value_eq(actual: &Value, expected: &Value) -> bool {
    if let Value::Object(members) = actual {
        if !expected.is_object() {
            return members.get(&member_segment(expected)).and_then(Value::as_bool)
                == Some(true);
        }
    }
    actual == expected
}

/// The path segment a set member is stored under.
pub(crate) fn member_segment(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ordering between two comparable JSON values; mixed types are unordered.
fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Compares two entities on one attribute for `order` clauses. Missing
/// values sort first; incomparable values are treated as equal.
pub(crate) fn order_compare(a: &Value, b: &Value, attribute: &str) -> Ordering {
    match (
        attribute_value(a, attribute),
        attribute_value(b, attribute),
    ) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

/// `like` pattern match: `%` matches any run of characters, `_` exactly
/// one. Non-string operands never match.
fn like_matches(actual: &Value, pattern: &Value) -> bool {
    match (actual.as_str(), pattern.as_str()) {
        (Some(text), Some(pattern)) => {
            let text: Vec<char> = text.chars().collect();
            let pattern: Vec<char> = pattern.chars().collect();
            like(&text, &pattern)
        }
        _ => false,
    }
}

fn like(text: &[char], pattern: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((&'%', rest)) => (0..=text.len()).any(|skip| like(&text[skip..], rest)),
        Some((&'_', rest)) => text
            .split_first()
            .is_some_and(|(_, remaining)| like(remaining, rest)),
        Some((expected, rest)) => text
            .split_first()
            .is_some_and(|(actual, remaining)| actual == expected && like(remaining, rest)),
    }
}
