//! Query and filter tree data structures for Lattice.
//!
//! A query's `where` clause is a recursive tree of filters:
//! - [`FilterStatement`] — a `[attribute, operator, value]` leaf,
//! - [`FilterGroup`] — a nested AND/OR group,
//! - [`SubQueryFilter`] — an existential sub-query node.
//!
//! Trees are immutable: every rewrite (variable substitution, rule
//! injection, sub-query expansion) produces a new tree instead of mutating
//! shared nodes in place. The preparation pipeline itself lives in
//! `lattice-db`; this crate only defines the shapes and their traversals.

mod filter;
mod query;
mod traverse;

pub use filter::{
    and, or, Combinator, Filter, FilterGroup, FilterStatement, Operator, SubQueryFilter, Where,
};
pub use query::{CollectionQuery, Direction};
pub use traverse::{every_statement, map_statements, some_statement, statements, Statements};
