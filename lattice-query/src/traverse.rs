//! Traversals over filter trees.
//!
//! All traversals descend into groups and treat `Exists` nodes as opaque
//! leaves: sub-query interiors carry their own variable scope and are only
//! inspected when the sub-query is itself prepared.

use crate::{Filter, FilterGroup, FilterStatement, Where};

/// Lazy depth-first iterator over the leaves of a filter tree.
///
/// Yields [`Filter::Statement`] and [`Filter::Exists`] nodes; groups are
/// descended into, never yielded.
pub struct Statements<'a> {
    stack: Vec<std::slice::Iter<'a, Filter>>,
}

impl<'a> Iterator for Statements<'a> {
    type Item = &'a Filter;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let iter = self.stack.last_mut()?;
            match iter.next() {
                Some(Filter::Group(group)) => self.stack.push(group.filters.iter()),
                Some(leaf) => return Some(leaf),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Returns a lazy iterator over a tree's statement and exists leaves.
pub fn statements(where_: &Where) -> Statements<'_> {
    Statements {
        stack: vec![where_.iter()],
    }
}

/// Short-circuiting: does any leaf satisfy the predicate?
pub fn some_statement(where_: &Where, predicate: impl Fn(&Filter) -> bool) -> bool {
    statements(where_).any(|leaf| predicate(leaf))
}

/// Do all statement leaves satisfy the predicate?
///
/// `Exists` nodes are vacuously satisfying: their internal shape is opaque
/// to the caller and is checked when the sub-query is prepared.
pub fn every_statement(where_: &Where, predicate: impl Fn(&FilterStatement) -> bool) -> bool {
    statements(where_).all(|leaf| match leaf {
        Filter::Statement(statement) => predicate(statement),
        _ => true,
    })
}

/// Structure-preserving rewrite of statement leaves.
///
/// Groups are rebuilt around their rewritten children; `Exists` nodes pass
/// through untouched. The mapping may replace a statement with any filter
/// node, which is how sub-query expansion turns statements into `Exists`.
pub fn map_statements(where_: &Where, map: &impl Fn(&FilterStatement) -> Filter) -> Where {
    where_
        .iter()
        .map(|filter| match filter {
            Filter::Statement(statement) => map(statement),
            Filter::Group(group) => Filter::Group(FilterGroup {
                combinator: group.combinator,
                filters: map_statements(&group.filters, map),
            }),
            Filter::Exists(exists) => Filter::Exists(exists.clone()),
        })
        .collect()
}
