//! Property-based tests for the value type system.
//!
//! - Round trip: native → JSON → native is the identity for every value
//!   that passes input validation.
//! - Default resolution: `now` is non-decreasing, `uuid` always validates
//!   and effectively never collides.

use chrono::{TimeZone, Utc};
use lattice_values::{DataType, LatticeValue, TypeOptions};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};

fn string_type() -> DataType {
    DataType::string(TypeOptions::none()).unwrap()
}

// ── Round trips ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn string_round_trip(s in "[a-zA-Z0-9 _.-]{0,40}") {
        let dt = string_type();
        let native = LatticeValue::String(s);
        prop_assume!(dt.validate_input(&native));
        let json = dt.convert_input_to_json(&native).unwrap();
        prop_assert_eq!(dt.convert_json_value_to_native(&json).unwrap(), native);
    }

    #[test]
    fn number_round_trip(n in -1.0e9f64..1.0e9) {
        let dt = DataType::number(TypeOptions::none()).unwrap();
        let native = LatticeValue::Number(n);
        let json = dt.convert_input_to_json(&native).unwrap();
        prop_assert_eq!(dt.convert_json_value_to_native(&json).unwrap(), native);
    }

    #[test]
    fn boolean_round_trip(b in any::<bool>()) {
        let dt = DataType::boolean(TypeOptions::none()).unwrap();
        let native = LatticeValue::Boolean(b);
        let json = dt.convert_input_to_json(&native).unwrap();
        prop_assert_eq!(dt.convert_json_value_to_native(&json).unwrap(), native);
    }

    #[test]
    fn date_round_trip(secs in 0i64..4_000_000_000, millis in 0u32..1000) {
        let dt = DataType::date(TypeOptions::none()).unwrap();
        let date = Utc.timestamp_opt(secs, millis * 1_000_000).unwrap();
        let native = LatticeValue::Date(date);
        let json = dt.convert_input_to_json(&native).unwrap();
        prop_assert_eq!(dt.convert_json_value_to_native(&json).unwrap(), native);
    }

    #[test]
    fn set_round_trip(members in prop::collection::hash_set("[a-z]{1,8}", 0..8)) {
        let dt = DataType::set(string_type()).unwrap();
        let native = LatticeValue::Set(
            members.iter().map(|s| LatticeValue::String(s.clone())).collect(),
        );
        let json = dt.convert_input_to_json(&native).unwrap();
        // Distinct members in, so dedup cannot drop anything.
        prop_assert_eq!(
            json.as_array().unwrap().len(),
            members.len()
        );
        prop_assert_eq!(dt.convert_json_value_to_native(&json).unwrap(), native);
    }

    #[test]
    fn record_round_trip(name in "[a-z]{1,12}", age in 0.0f64..150.0) {
        let dt = DataType::record(
            [
                ("name".to_string(), string_type()),
                ("age".to_string(), DataType::number(TypeOptions::none()).unwrap()),
            ]
            .into_iter()
            .collect::<BTreeMap<_, _>>(),
        );
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), LatticeValue::String(name));
        map.insert("age".to_string(), LatticeValue::Number(age));
        let native = LatticeValue::Record(map);
        let json = dt.convert_input_to_json(&native).unwrap();
        prop_assert_eq!(dt.convert_json_value_to_native(&json).unwrap(), native);
    }
}

// ── Default resolution ───────────────────────────────────────────

#[test]
fn now_defaults_are_non_decreasing() {
    let dt = DataType::date(TypeOptions::with_default_fn("now", None)).unwrap();
    let first = dt.default_value().unwrap();
    let second = dt.default_value().unwrap();
    // ISO-8601 strings at equal precision compare chronologically as text.
    assert!(first.as_str().unwrap() <= second.as_str().unwrap());
    assert!(dt.validate_triple_value(&first));
}

#[test]
fn uuid_defaults_validate_and_do_not_collide() {
    let dt = DataType::string(TypeOptions::with_default_fn("uuid", None)).unwrap();
    let mut seen = HashSet::new();
    for _ in 0..10_000 {
        let value = dt.default_value().unwrap();
        assert!(dt.validate_triple_value(&value));
        assert!(
            seen.insert(value.as_str().unwrap().to_string()),
            "uuid default collided"
        );
    }
}
