//! Attribute type system and LWW register cell for Lattice.
//!
//! This crate provides:
//! - [`DataType`] — the closed sum of recognized attribute types
//!   (string, number, boolean, date, set, record, sub-query), each exposing
//!   validate / serialize / default / parse operations,
//! - [`TypeOptions`] / [`DefaultValue`] — per-type configuration with
//!   fail-fast validation and a small default-function registry,
//! - [`AttributeDefinition`] — the serialized JSON form a schema persists,
//! - [`Register`] — the timestamped value cell implementing
//!   last-writer-wins conflict resolution.

mod data_type;
mod definition;
mod options;
mod register;
mod value;

pub use data_type::DataType;
pub use definition::{AttributeDefinition, VALUE_TYPE_KINDS};
pub use options::{DefaultValue, TypeOptions};
pub use register::Register;
pub use value::LatticeValue;

use lattice_types::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the type system and the register merge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A type constructor received self-contradictory options. Raised at
    /// schema-definition time, fatal to that definition.
    #[error("invalid type options: {0}")]
    InvalidTypeOptions(String),

    /// A serialized attribute definition was absent where one is required.
    /// Indicates corrupted or incompatible schema data.
    #[error("missing attribute definition")]
    MissingAttributeDefinition,

    /// A serialized attribute definition names an unknown kind.
    #[error("unrecognized attribute type {0:?}")]
    UnrecognizedAttributeType(String),

    /// A value failed its type's input validation during conversion to
    /// storage form; rejects that value's write.
    #[error("cannot serialize value {value} as {kind}")]
    Serializing {
        kind: &'static str,
        value: serde_json::Value,
    },

    #[error("Invalid Date: {0:?}")]
    InvalidDate(String),

    #[error("Invalid Number: {0:?}")]
    InvalidNumber(String),

    #[error("Invalid Boolean: {0:?}")]
    InvalidBoolean(String),

    /// `from_string` was called on a type with no string grammar.
    #[error("cannot parse a {0} value from a string")]
    UnparsableType(&'static str),

    /// Two registers carry the same timestamp but different values. The
    /// clock's uniqueness guarantee should make this impossible; observing
    /// it means corrupted or forged data, never something to resolve
    /// silently.
    #[error("register merge conflict at {timestamp}: {left} vs {right}")]
    MergeConflict {
        timestamp: Timestamp,
        left: serde_json::Value,
        right: serde_json::Value,
    },
}
