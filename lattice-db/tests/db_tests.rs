use lattice_db::{Db, DbError, QueryOptions, Subscription};
use lattice_model::{Model, StoreSchema};
use lattice_query::{CollectionQuery, Direction, Filter, Operator};
use lattice_values::{DataType, TypeOptions};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

fn blog_schema() -> StoreSchema {
    let mut users = BTreeMap::new();
    users.insert(
        "name".to_string(),
        DataType::string(TypeOptions::none()).unwrap(),
    );
    users.insert(
        "role".to_string(),
        DataType::string(TypeOptions::with_default("reader")).unwrap(),
    );
    users.insert(
        "tags".to_string(),
        DataType::set(DataType::string(TypeOptions::none()).unwrap()).unwrap(),
    );
    users.insert(
        "posts".to_string(),
        DataType::query(
            CollectionQuery::new("posts")
                .filter(Filter::statement("authorId", Operator::Eq, "$id")),
        ),
    );

    let mut posts = BTreeMap::new();
    posts.insert(
        "title".to_string(),
        DataType::string(TypeOptions::none()).unwrap(),
    );
    posts.insert(
        "authorId".to_string(),
        DataType::string(TypeOptions::none()).unwrap(),
    );
    posts.insert(
        "published".to_string(),
        DataType::boolean(TypeOptions::with_default(true)).unwrap(),
    );

    StoreSchema::new(1)
        .collection("users", Model::new(users))
        .collection(
            "posts",
            Model::new(posts).read_rule(
                "published_only",
                vec![Filter::statement("published", Operator::Eq, true)],
            ),
        )
}

fn blog_db() -> Db<lattice_store::MemoryTupleStorage> {
    let mut db = Db::in_memory();
    db.define_schema(&blog_schema()).unwrap();
    db
}

// ── Insert / fetch ───────────────────────────────────────────────

#[test]
fn insert_and_fetch_by_id() {
    let mut db = blog_db();
    db.insert("users", json!({"id": "alice", "name": "Alice"}))
        .unwrap();

    let entity = db.fetch_by_id("users", "alice").unwrap().unwrap();
    assert_eq!(entity["id"], json!("alice"));
    assert_eq!(entity["name"], json!("Alice"));
    // Schema default fills the missing attribute.
    assert_eq!(entity["role"], json!("reader"));
}

#[test]
fn insert_without_id_generates_one() {
    let mut db = blog_db();
    let id = db.insert("users", json!({"name": "Anon"})).unwrap();
    assert!(!id.is_empty());
    assert!(db.fetch_by_id("users", &id).unwrap().is_some());
}

#[test]
fn insert_rejects_separator_in_id() {
    let mut db = blog_db();
    assert!(matches!(
        db.insert("users", json!({"id": "a#b", "name": "Eve"})),
        Err(DbError::Types(lattice_types::Error::InvalidEntityId { .. }))
    ));
}

#[test]
fn insert_rejects_mistyped_value_without_writing() {
    let mut db = blog_db();
    assert!(db
        .insert("users", json!({"id": "alice", "name": 42}))
        .is_err());
    assert!(db.fetch_by_id("users", "alice").unwrap().is_none());
}

#[test]
fn fetch_filters_and_orders() {
    let mut db = blog_db();
    db.insert("users", json!({"id": "a", "name": "Carol"})).unwrap();
    db.insert("users", json!({"id": "b", "name": "Alice"})).unwrap();
    db.insert("users", json!({"id": "c", "name": "Bob"})).unwrap();

    let query = CollectionQuery::new("users")
        .filter(Filter::statement("name", Operator::Neq, "Bob"))
        .order_by("name", Direction::Asc);
    let results = db.fetch(&query).unwrap();
    let names: Vec<&Value> = results.iter().map(|(_, e)| &e["name"]).collect();
    assert_eq!(names, vec![&json!("Alice"), &json!("Carol")]);

    let limited = db
        .fetch(&CollectionQuery::new("users").order_by("name", Direction::Desc).limit(1))
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].1["name"], json!("Carol"));
}

#[test]
fn select_prunes_to_requested_leaves() {
    let mut db = Db::in_memory();
    db.insert(
        "notes",
        json!({"id": "n1", "text": "hi", "meta": {"lang": "en", "draft": false}}),
    )
    .unwrap();

    let query = CollectionQuery::new("notes")
        .select(vec!["text".to_string(), "meta.lang".to_string()]);
    let results = db.fetch(&query).unwrap();
    assert_eq!(
        results[0].1,
        json!({"id": "n1", "text": "hi", "meta": {"lang": "en"}})
    );
}

#[test]
fn set_attributes_match_by_membership() {
    let mut db = blog_db();
    db.insert("users", json!({"id": "alice", "name": "Alice", "tags": ["rust", "db"]}))
        .unwrap();
    db.insert("users", json!({"id": "bob", "name": "Bob", "tags": ["go"]}))
        .unwrap();

    let query =
        CollectionQuery::new("users").filter(Filter::statement("tags", Operator::Eq, "rust"));
    let results = db.fetch(&query).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, "alice");
}

#[test]
fn session_variables_apply_to_fetch() {
    let mut db = blog_db();
    db.insert("users", json!({"id": "alice", "name": "Alice"})).unwrap();
    db.insert("users", json!({"id": "bob", "name": "Bob"})).unwrap();
    db.set_variable("me", "Alice");

    let query =
        CollectionQuery::new("users").filter(Filter::statement("name", Operator::Eq, "$me"));
    let results = db.fetch(&query).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, "alice");
}

// ── Relationships ────────────────────────────────────────────────

#[test]
fn relationship_filter_traverses_posts() {
    let mut db = blog_db();
    db.insert("users", json!({"id": "alice", "name": "Alice"})).unwrap();
    db.insert("users", json!({"id": "bob", "name": "Bob"})).unwrap();
    db.insert(
        "posts",
        json!({"id": "p1", "title": "Hello", "authorId": "alice"}),
    )
    .unwrap();
    db.insert(
        "posts",
        json!({"id": "p2", "title": "Other", "authorId": "bob"}),
    )
    .unwrap();

    let query = CollectionQuery::new("users")
        .filter(Filter::statement("posts.title", Operator::Eq, "Hello"));
    let results = db.fetch(&query).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, "alice");
}

#[test]
fn relationship_respects_sub_collection_rules() {
    let mut db = blog_db();
    db.insert("users", json!({"id": "alice", "name": "Alice"})).unwrap();
    db.insert(
        "posts",
        json!({"id": "p1", "title": "Draft", "authorId": "alice", "published": false}),
    )
    .unwrap();

    // The posts read rule hides unpublished posts from the sub-query too.
    let query = CollectionQuery::new("users")
        .filter(Filter::statement("posts.title", Operator::Eq, "Draft"));
    assert!(db.fetch(&query).unwrap().is_empty());
}

// ── Read rules ───────────────────────────────────────────────────

#[test]
fn read_rules_narrow_fetch_results() {
    let mut db = blog_db();
    db.insert(
        "posts",
        json!({"id": "p1", "title": "Live", "authorId": "a"}),
    )
    .unwrap();
    db.insert(
        "posts",
        json!({"id": "p2", "title": "Draft", "authorId": "a", "published": false}),
    )
    .unwrap();

    let all = CollectionQuery::new("posts");
    assert_eq!(db.fetch(&all).unwrap().len(), 1);
    assert_eq!(
        db.fetch_with_options(&all, QueryOptions { skip_rules: true })
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn read_rule_with_session_variable_shows_own_rows() {
    let mut docs = BTreeMap::new();
    docs.insert(
        "owner".to_string(),
        DataType::string(TypeOptions::none()).unwrap(),
    );
    let schema = StoreSchema::new(1).collection(
        "docs",
        Model::new(docs).read_rule(
            "owner_only",
            vec![Filter::statement("owner", Operator::Eq, "$user")],
        ),
    );
    let mut db = Db::in_memory();
    db.define_schema(&schema).unwrap();
    db.insert("docs", json!({"id": "d1", "owner": "alice"})).unwrap();
    db.insert("docs", json!({"id": "d2", "owner": "bob"})).unwrap();

    db.set_variable("user", "alice");
    let results = db.fetch(&CollectionQuery::new("docs")).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, "d1");

    db.set_variable("user", "carol");
    assert!(db.fetch(&CollectionQuery::new("docs")).unwrap().is_empty());
}

// ── Update / delete ──────────────────────────────────────────────

#[test]
fn update_rewrites_changed_leaves() {
    let mut db = blog_db();
    db.insert("users", json!({"id": "alice", "name": "Alice"})).unwrap();
    db.update("users", "alice", |map| {
        map.insert("name".to_string(), json!("Alice B."));
    })
    .unwrap();

    let entity = db.fetch_by_id("users", "alice").unwrap().unwrap();
    assert_eq!(entity["name"], json!("Alice B."));
    assert_eq!(entity["role"], json!("reader"));
}

#[test]
fn update_removes_dropped_attributes() {
    let mut db = blog_db();
    db.insert(
        "users",
        json!({"id": "alice", "name": "Alice", "tags": ["rust"]}),
    )
    .unwrap();
    db.update("users", "alice", |map| {
        map.remove("tags");
    })
    .unwrap();

    let entity = db.fetch_by_id("users", "alice").unwrap().unwrap();
    assert_eq!(entity.get("tags"), None);
}

#[test]
fn update_missing_entity_fails() {
    let mut db = blog_db();
    assert!(matches!(
        db.update("users", "ghost", |_| {}),
        Err(DbError::EntityNotFound { .. })
    ));
}

#[test]
fn delete_removes_entity_from_results() {
    let mut db = blog_db();
    db.insert("users", json!({"id": "alice", "name": "Alice"})).unwrap();
    db.delete("users", "alice").unwrap();

    assert!(db.fetch_by_id("users", "alice").unwrap().is_none());
    assert!(db.fetch(&CollectionQuery::new("users")).unwrap().is_empty());
    assert!(matches!(
        db.delete("users", "alice"),
        Err(DbError::EntityNotFound { .. })
    ));
}

// ── Subscriptions ────────────────────────────────────────────────

#[test]
fn subscription_delivers_initial_and_updated_results() {
    let mut db = blog_db();
    db.insert("users", json!({"id": "alice", "name": "Alice"})).unwrap();

    let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = db.subscribe(
        CollectionQuery::new("users"),
        move |results, info| {
            assert!(info.has_remote_fulfilled);
            sink.lock().unwrap().push(results.len());
        },
        |err| panic!("unexpected subscription error: {err}"),
        QueryOptions::default(),
    );

    db.insert("users", json!({"id": "bob", "name": "Bob"})).unwrap();
    db.delete("users", "alice").unwrap();
    // Writes to other collections do not re-deliver.
    db.insert(
        "posts",
        json!({"id": "p1", "title": "Hello", "authorId": "bob"}),
    )
    .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 1]);
    drop(subscription);

    db.insert("users", json!({"id": "carol", "name": "Carol"})).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 1]);
}

#[test]
fn callback_can_drop_its_own_subscription() {
    let mut db = blog_db();
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let handle = Arc::clone(&slot);
    let count = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&count);

    let subscription = db.subscribe(
        CollectionQuery::new("users"),
        move |_, _| {
            let mut deliveries = sink.lock().unwrap();
            *deliveries += 1;
            if *deliveries == 2 {
                // Unsubscribing from inside a notification must not block.
                drop(handle.lock().unwrap().take());
            }
        },
        |err| panic!("unexpected subscription error: {err}"),
        QueryOptions::default(),
    );
    *slot.lock().unwrap() = Some(subscription);

    db.insert("users", json!({"id": "alice", "name": "Alice"})).unwrap();
    db.insert("users", json!({"id": "bob", "name": "Bob"})).unwrap();
    // Initial delivery plus the first insert; the handle is gone after.
    assert_eq!(*count.lock().unwrap(), 2);
}

#[test]
fn unsubscribe_stops_delivery() {
    let mut db = blog_db();
    let count = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&count);
    let subscription = db.subscribe(
        CollectionQuery::new("users"),
        move |_, _| *sink.lock().unwrap() += 1,
        |_| {},
        QueryOptions::default(),
    );
    assert_eq!(*count.lock().unwrap(), 1);

    subscription.unsubscribe();
    db.insert("users", json!({"id": "alice", "name": "Alice"})).unwrap();
    assert_eq!(*count.lock().unwrap(), 1);
}

// ── Schemaless mode ──────────────────────────────────────────────

#[test]
fn schemaless_db_stores_entities_as_given() {
    let mut db = Db::in_memory();
    db.insert("notes", json!({"id": "n1", "text": "hi", "pinned": true}))
        .unwrap();

    let entity = db.fetch_by_id("notes", "n1").unwrap().unwrap();
    assert_eq!(entity["text"], json!("hi"));
    assert_eq!(entity["pinned"], json!(true));
}
