//! Embeddable database facade for Lattice.
//!
//! [`Db`] ties the lower crates together: writes are validated against the
//! active schema, stamped by an injected [`lattice_types::Clock`], and
//! committed as triples; reads run the query preparation pipeline
//! ([`prepare_query`]) and evaluate the canonical filter tree against
//! entities reconstructed from their registers.
//!
//! ```
//! use lattice_db::Db;
//! use lattice_query::{CollectionQuery, Filter, Operator};
//! use serde_json::json;
//!
//! let mut db = Db::in_memory();
//! db.insert("users", json!({"id": "alice", "name": "Alice"})).unwrap();
//!
//! let query = CollectionQuery::new("users")
//!     .filter(Filter::statement("name", Operator::Eq, "Alice"));
//! let results = db.fetch(&query).unwrap();
//! assert_eq!(results.len(), 1);
//! ```

mod db;
mod error;
mod eval;
mod prepare;

pub use db::{Db, QueryResults, Subscription, SubscriptionInfo};
pub use error::{DbError, DbResult};
pub use prepare::{prepare_query, QueryOptions};
