use lattice_db::{prepare_query, DbError, QueryOptions};
use lattice_model::Model;
use lattice_query::{and, or, CollectionQuery, Filter, FilterStatement, Operator};
use lattice_values::{DataType, TypeOptions};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn users_model() -> Model {
    let mut schema = BTreeMap::new();
    schema.insert(
        "name".to_string(),
        DataType::string(TypeOptions::none()).unwrap(),
    );
    schema.insert(
        "createdAt".to_string(),
        DataType::date(TypeOptions::none()).unwrap(),
    );
    schema.insert(
        "posts".to_string(),
        DataType::query(
            CollectionQuery::new("posts")
                .filter(Filter::statement("authorId", Operator::Eq, "$id")),
        ),
    );
    Model::new(schema)
}

fn vars(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

fn statement(filter: &Filter) -> &FilterStatement {
    match filter {
        Filter::Statement(statement) => statement,
        other => panic!("expected a statement, got {other:?}"),
    }
}

// ── Variable substitution ────────────────────────────────────────

#[test]
fn session_variable_resolves() {
    let query =
        CollectionQuery::new("users").filter(Filter::statement("owner", Operator::Eq, "$who"));
    let prepared = prepare_query(
        &query,
        None,
        &vars(&[("who", json!("alice"))]),
        QueryOptions::default(),
    )
    .unwrap();

    assert_eq!(statement(&prepared.where_[0]).value, json!("alice"));
}

#[test]
fn unbound_variable_fails_preparation() {
    let query = CollectionQuery::new("users")
        .filter(Filter::statement("owner", Operator::Eq, "$missing"));
    match prepare_query(&query, None, &BTreeMap::new(), QueryOptions::default()) {
        Err(DbError::SessionVariableNotFound(name)) => assert_eq!(name, "missing"),
        other => panic!("expected SessionVariableNotFound, got {other:?}"),
    }
}

#[test]
fn query_vars_override_session_variables() {
    let query = CollectionQuery::new("users")
        .filter(Filter::statement("owner", Operator::Eq, "$who"))
        .var("who", "bob");
    let prepared = prepare_query(
        &query,
        None,
        &vars(&[("who", json!("alice"))]),
        QueryOptions::default(),
    )
    .unwrap();

    assert_eq!(statement(&prepared.where_[0]).value, json!("bob"));
}

#[test]
fn substitution_recurses_into_groups() {
    let query = CollectionQuery::new("users").filter(or(vec![
        Filter::statement("owner", Operator::Eq, "$who"),
        and(vec![Filter::statement("editor", Operator::Eq, "$who")]),
    ]));
    let prepared = prepare_query(
        &query,
        None,
        &vars(&[("who", json!("alice"))]),
        QueryOptions::default(),
    )
    .unwrap();

    let Filter::Group(outer) = &prepared.where_[0] else {
        panic!("expected a group");
    };
    assert_eq!(statement(&outer.filters[0]).value, json!("alice"));
    let Filter::Group(inner) = &outer.filters[1] else {
        panic!("expected a nested group");
    };
    assert_eq!(statement(&inner.filters[0]).value, json!("alice"));
}

#[test]
fn substitution_does_not_descend_into_exists() {
    let sub = CollectionQuery::new("posts")
        .filter(Filter::statement("authorId", Operator::Eq, "$id"));
    let query = CollectionQuery::new("users").filter(Filter::exists(sub.clone()));
    // "$id" is unbound here; preparation must still succeed because the
    // sub-query's scope is resolved at execution time.
    let prepared =
        prepare_query(&query, None, &BTreeMap::new(), QueryOptions::default()).unwrap();
    assert_eq!(prepared.where_[0], Filter::exists(sub));
}

#[test]
fn entity_id_shortcut_substitutes() {
    let query = CollectionQuery::new("users").entity_id("$me");
    let prepared = prepare_query(
        &query,
        None,
        &vars(&[("me", json!("alice"))]),
        QueryOptions::default(),
    )
    .unwrap();
    assert_eq!(prepared.entity_id.as_deref(), Some("alice"));

    assert!(matches!(
        prepare_query(
            &CollectionQuery::new("users").entity_id("$nobody"),
            None,
            &BTreeMap::new(),
            QueryOptions::default(),
        ),
        Err(DbError::SessionVariableNotFound(_))
    ));
}

// ── Read-rule injection ──────────────────────────────────────────

#[test]
fn read_rules_append_to_where() {
    let model = users_model().read_rule(
        "not_deleted",
        vec![Filter::statement("deleted", Operator::Eq, false)],
    );
    let query =
        CollectionQuery::new("users").filter(Filter::statement("owner", Operator::Eq, "alice"));

    let prepared =
        prepare_query(&query, Some(&model), &BTreeMap::new(), QueryOptions::default()).unwrap();
    assert_eq!(prepared.where_.len(), 2);
    assert_eq!(statement(&prepared.where_[0]).attribute, "owner");
    assert_eq!(statement(&prepared.where_[1]).attribute, "deleted");
}

#[test]
fn rule_variables_resolve_against_session_scope() {
    let model = users_model().read_rule(
        "owner_only",
        vec![Filter::statement("owner", Operator::Eq, "$user")],
    );
    let query = CollectionQuery::new("users");

    let prepared = prepare_query(
        &query,
        Some(&model),
        &vars(&[("user", json!("alice"))]),
        QueryOptions::default(),
    )
    .unwrap();
    // The injected rule filter is substituted like a caller-written one.
    assert_eq!(statement(&prepared.where_[0]).attribute, "owner");
    assert_eq!(statement(&prepared.where_[0]).value, json!("alice"));
}

#[test]
fn rule_with_unbound_variable_fails_preparation() {
    let model = users_model().read_rule(
        "owner_only",
        vec![Filter::statement("owner", Operator::Eq, "$user")],
    );
    assert!(matches!(
        prepare_query(
            &CollectionQuery::new("users"),
            Some(&model),
            &BTreeMap::new(),
            QueryOptions::default(),
        ),
        Err(DbError::SessionVariableNotFound(_))
    ));
}

#[test]
fn skip_rules_leaves_where_untouched() {
    let model = users_model().read_rule(
        "not_deleted",
        vec![Filter::statement("deleted", Operator::Eq, false)],
    );
    let query =
        CollectionQuery::new("users").filter(Filter::statement("owner", Operator::Eq, "alice"));

    let prepared = prepare_query(
        &query,
        Some(&model),
        &BTreeMap::new(),
        QueryOptions { skip_rules: true },
    )
    .unwrap();
    assert_eq!(prepared.where_.len(), 1);
    assert_eq!(statement(&prepared.where_[0]).attribute, "owner");
}

// ── Date normalization ───────────────────────────────────────────

#[test]
fn date_literals_render_canonically() {
    let model = users_model();
    let query = CollectionQuery::new("users").filter(Filter::statement(
        "createdAt",
        Operator::Gte,
        "2024-03-01",
    ));
    let prepared =
        prepare_query(&query, Some(&model), &BTreeMap::new(), QueryOptions::default()).unwrap();
    assert_eq!(
        statement(&prepared.where_[0]).value,
        json!("2024-03-01T00:00:00.000Z")
    );
}

#[test]
fn unparseable_date_literal_fails() {
    let model = users_model();
    let query = CollectionQuery::new("users").filter(Filter::statement(
        "createdAt",
        Operator::Eq,
        "not a date",
    ));
    assert!(matches!(
        prepare_query(&query, Some(&model), &BTreeMap::new(), QueryOptions::default()),
        Err(DbError::Values(lattice_values::Error::InvalidDate(_)))
    ));
}

// ── Sub-query rewriting ──────────────────────────────────────────

#[test]
fn relationship_path_rewrites_to_exists() {
    let model = users_model();
    let query = CollectionQuery::new("users").filter(Filter::statement(
        "posts.title",
        Operator::Eq,
        "Hello",
    ));
    let prepared =
        prepare_query(&query, Some(&model), &BTreeMap::new(), QueryOptions::default()).unwrap();

    let Filter::Exists(sub) = &prepared.where_[0] else {
        panic!("expected an exists node, got {:?}", prepared.where_[0]);
    };
    assert_eq!(sub.exists.collection_name, "posts");
    assert_eq!(sub.exists.where_.len(), 2);
    assert_eq!(
        statement(&sub.exists.where_[0]),
        &FilterStatement::new("authorId", Operator::Eq, "$id")
    );
    assert_eq!(
        statement(&sub.exists.where_[1]),
        &FilterStatement::new("title", Operator::Eq, "Hello")
    );
}

#[test]
fn deep_relationship_suffix_is_preserved() {
    let model = users_model();
    let query = CollectionQuery::new("users").filter(Filter::statement(
        "posts.meta.lang",
        Operator::Eq,
        "en",
    ));
    let prepared =
        prepare_query(&query, Some(&model), &BTreeMap::new(), QueryOptions::default()).unwrap();

    let Filter::Exists(sub) = &prepared.where_[0] else {
        panic!("expected an exists node");
    };
    assert_eq!(statement(&sub.exists.where_[1]).attribute, "meta.lang");
}

#[test]
fn plain_attributes_are_left_alone() {
    let model = users_model();
    let query =
        CollectionQuery::new("users").filter(Filter::statement("name", Operator::Eq, "Alice"));
    let prepared =
        prepare_query(&query, Some(&model), &BTreeMap::new(), QueryOptions::default()).unwrap();
    assert_eq!(prepared.where_, query.where_);
}
