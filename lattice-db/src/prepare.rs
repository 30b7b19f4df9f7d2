//! The query preparation pipeline.
//!
//! Turns a raw [`CollectionQuery`] into its canonical, security-enforced
//! form. Stages, applied in order:
//!
//! 1. read-rule injection (rules append to the top-level `where`, implicit
//!    AND, so they can only narrow results),
//! 2. variable substitution (`$name` values resolve through the merged
//!    session + query scope; rules run first so their filters resolve
//!    against the same scope),
//! 3. date-literal normalization to the canonical ISO-8601 form,
//! 4. sub-query rewriting (statements over `query`-typed attributes become
//!    existential sub-filters).
//!
//! Every stage produces a new filter tree; nothing is rewritten in place.

use crate::{DbError, DbResult};
use lattice_model::Model;
use lattice_query::{CollectionQuery, Filter, FilterGroup, FilterStatement, Where};
use lattice_values::{DataType, TypeOptions};
use serde_json::Value;
use std::collections::BTreeMap;

/// Per-call preparation options.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    /// Skip read-rule injection. For internal reads that must see every
    /// row, never for caller-supplied queries.
    pub skip_rules: bool,
}

/// Prepares a query against a collection's model and the variable scope.
///
/// `model` is `None` in schemaless mode, which disables the schema-driven
/// stages (rules, date normalization, sub-query rewriting) but still
/// resolves variables.
pub fn prepare_query(
    query: &CollectionQuery,
    model: Option<&Model>,
    variables: &BTreeMap<String, Value>,
    options: QueryOptions,
) -> DbResult<CollectionQuery> {
    // Query-level vars override session variables of the same name.
    let mut scope = variables.clone();
    if let Some(vars) = &query.vars {
        scope.extend(vars.clone());
    }

    let mut prepared = query.clone();
    if let Some(model) = model {
        if !options.skip_rules {
            for rule in model.rules.read.values() {
                prepared.where_.extend(rule.filter.iter().cloned());
            }
        }
    }

    prepared.where_ = substitute_variables(&prepared.where_, &scope)?;
    if let Some(entity_id) = &prepared.entity_id {
        if let Some(name) = entity_id.strip_prefix('$') {
            let bound = lookup(&scope, name)?;
            prepared.entity_id = Some(match bound.as_str() {
                Some(s) => s.to_string(),
                None => bound.to_string(),
            });
        }
    }

    if let Some(model) = model {
        prepared.where_ = rewrite_statements(&prepared.where_, model)?;
    }

    Ok(prepared)
}

fn lookup<'a>(scope: &'a BTreeMap<String, Value>, name: &str) -> DbResult<&'a Value> {
    scope
        .get(name)
        .ok_or_else(|| DbError::SessionVariableNotFound(name.to_string()))
}

/// Resolves `$`-prefixed string values through the scope.
///
/// Recurses into groups but not into `Exists` sub-filters, which carry
/// their own variable scope at execution time.
fn substitute_variables(where_: &Where, scope: &BTreeMap<String, Value>) -> DbResult<Where> {
    where_
        .iter()
        .map(|filter| match filter {
            Filter::Statement(statement) => {
                let value = match statement.value.as_str().and_then(|s| s.strip_prefix('$')) {
                    Some(name) => lookup(scope, name)?.clone(),
                    None => statement.value.clone(),
                };
                Ok(Filter::Statement(FilterStatement {
                    attribute: statement.attribute.clone(),
                    op: statement.op,
                    value,
                }))
            }
            Filter::Group(group) => Ok(Filter::Group(FilterGroup {
                combinator: group.combinator,
                filters: substitute_variables(&group.filters, scope)?,
            })),
            Filter::Exists(exists) => Ok(Filter::Exists(exists.clone())),
        })
        .collect()
}

/// Schema-driven statement rewrites: date normalization and sub-query
/// expansion, in one structure-preserving pass.
fn rewrite_statements(where_: &Where, model: &Model) -> DbResult<Where> {
    where_
        .iter()
        .map(|filter| match filter {
            Filter::Statement(statement) => rewrite_statement(statement, model),
            Filter::Group(group) => Ok(Filter::Group(FilterGroup {
                combinator: group.combinator,
                filters: rewrite_statements(&group.filters, model)?,
            })),
            Filter::Exists(exists) => Ok(Filter::Exists(exists.clone())),
        })
        .collect()
}

fn rewrite_statement(statement: &FilterStatement, model: &Model) -> DbResult<Filter> {
    let segments: Vec<String> = statement
        .attribute
        .split('.')
        .map(str::to_string)
        .collect();
    match resolve_attribute(&model.schema, &segments) {
        Some((DataType::Query { query }, suffix)) if !suffix.is_empty() => {
            // The dotted path traverses a declared relationship: wrap the
            // template and bind the remaining suffix inside its own where.
            let mut sub = *query;
            sub.where_.push(Filter::Statement(FilterStatement {
                attribute: suffix.join("."),
                op: statement.op,
                value: statement.value.clone(),
            }));
            Ok(Filter::exists(sub))
        }
        Some((DataType::Date(_), _)) => Ok(Filter::Statement(FilterStatement {
            attribute: statement.attribute.clone(),
            op: statement.op,
            value: canonical_date_literal(&statement.value)?,
        })),
        _ => Ok(Filter::Statement(statement.clone())),
    }
}

/// Walks an attribute path through the type tree, stopping at the first
/// `query`-typed attribute and returning the unconsumed suffix.
fn resolve_attribute(
    schema: &BTreeMap<String, DataType>,
    segments: &[String],
) -> Option<(DataType, Vec<String>)> {
    let (first, rest) = segments.split_first()?;
    let mut current = schema.get(first)?.clone();
    let mut remaining = rest;

    loop {
        if matches!(current, DataType::Query { .. }) {
            break;
        }
        let Some((segment, rest)) = remaining.split_first() else {
            break;
        };
        current = match current {
            DataType::Record { ref properties } => properties.get(segment)?.clone(),
            DataType::Set { .. } => {
                if !rest.is_empty() {
                    return None;
                }
                DataType::Boolean(TypeOptions::none())
            }
            _ => return None,
        };
        remaining = rest;
    }
    Some((current, remaining.to_vec()))
}

/// Renders a date literal to the canonical ISO-8601 form so comparisons
/// against stored triples are well-typed. Non-string literals (e.g. null)
/// pass through.
fn canonical_date_literal(value: &Value) -> DbResult<Value> {
    match value.as_str() {
        Some(text) => {
            let date_type = DataType::date(TypeOptions::none())?;
            let native = date_type.from_string(text)?;
            Ok(date_type.convert_input_to_json(&native)?)
        }
        None => Ok(value.clone()),
    }
}
