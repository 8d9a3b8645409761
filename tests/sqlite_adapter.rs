// tests/sqlite_adapter.rs
#![cfg(feature = "sqlite")]

use std::sync::Arc;

use corpus::{adapters::SqliteAdapter, fields, Adapter, Collection, Connector, FieldValue, Q};

async fn setup() -> Collection {
    let adapter = SqliteAdapter::new_memory().await.unwrap();
    adapter.init_schema().await.unwrap();
    let connector = Arc::new(Connector::with_adapter(Arc::new(adapter)));
    Collection::new("users", connector)
}

#[tokio::test]
async fn set_and_stream_roundtrip() {
    let users = setup().await;

    users
        .create(fields! { "name" => "alice", "age" => 34, "active" => true })
        .await
        .unwrap();
    users
        .create(fields! { "name" => "bob", "age" => 19, "active" => false })
        .await
        .unwrap();

    let all = users.all().await;
    assert_eq!(all.count().await.unwrap(), 2);

    let alice = users.get(Q::eq("name", "alice")).await.unwrap();
    assert_eq!(alice.value_of("age").as_int(), Some(34));
    assert_eq!(alice.value_of("active").as_bool(), Some(true));
}

#[tokio::test]
async fn range_constraints_push_down_to_sql() {
    let users = setup().await;

    users.create(fields! { "name" => "alice" }).await.unwrap();
    users.create(fields! { "name" => "alina" }).await.unwrap();
    users.create(fields! { "name" => "bob" }).await.unwrap();

    let qs = users.all().await.where_contains("name", "ali");
    let records = qs.fetch().await.unwrap();
    assert_eq!(records.len(), 2);
    for record in records {
        assert!(record.value_of("name").as_str().unwrap().starts_with("ali"));
    }
}

#[tokio::test]
async fn id_equality_lookup_pushes_down_to_sql() {
    let users = setup().await;

    let record = users.create(fields! { "name" => "alice" }).await.unwrap();
    users.create(fields! { "name" => "bob" }).await.unwrap();

    let found = users.get(Q::eq("id", record.id())).await.unwrap();
    assert_eq!(found.id(), record.id());
    assert_eq!(found.value_of("name").as_str(), Some("alice"));
}

#[tokio::test]
async fn timestamps_round_trip_and_filter_by_equality() {
    let users = setup().await;
    let at: chrono::DateTime<chrono::Utc> = "2024-05-01T12:00:00Z".parse().unwrap();

    users
        .create(fields! { "name" => "alice", "at" => at })
        .await
        .unwrap();

    let record = users.get(Q::eq("at", at)).await.unwrap();
    assert_eq!(record.value_of("at").as_timestamp(), Some(at));
}

#[tokio::test]
async fn null_equality_matches_explicit_nulls_not_missing_fields() {
    let adapter = SqliteAdapter::new_memory().await.unwrap();
    adapter.init_schema().await.unwrap();

    adapter
        .set_document("users", "a", &fields! { "mid" => FieldValue::Null })
        .await
        .unwrap();
    adapter
        .set_document("users", "b", &fields! { "name" => "b" })
        .await
        .unwrap();

    let constraints = [corpus::Constraint::new(
        "mid",
        corpus::Comparison::Equal,
        FieldValue::Null,
    )];
    let documents = adapter.stream_documents("users", &constraints).await.unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].0, "a");
}

#[tokio::test]
async fn overwrite_replaces_the_full_document() {
    let adapter = SqliteAdapter::new_memory().await.unwrap();
    adapter.init_schema().await.unwrap();

    adapter
        .set_document("users", "u1", &fields! { "name" => "old", "stale" => true })
        .await
        .unwrap();
    adapter
        .set_document("users", "u1", &fields! { "name" => "new" })
        .await
        .unwrap();

    let documents = adapter.stream_documents("users", &[]).await.unwrap();
    assert_eq!(documents.len(), 1);
    let (_, doc) = &documents[0];
    assert_eq!(doc.get("name"), Some(&FieldValue::String("new".into())));
    assert!(!doc.contains_key("stale"));
}

#[tokio::test]
async fn delete_removes_by_identity_and_tolerates_absent_ids() {
    let adapter = SqliteAdapter::new_memory().await.unwrap();
    adapter.init_schema().await.unwrap();

    adapter
        .set_document("users", "u1", &fields! { "name" => "alice" })
        .await
        .unwrap();
    adapter.delete_document("users", "u1").await.unwrap();
    assert!(adapter.stream_documents("users", &[]).await.unwrap().is_empty());

    // Deleting an already-deleted id is not an error.
    adapter.delete_document("users", "u1").await.unwrap();
}
