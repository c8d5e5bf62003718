mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::seeded;
use oxide_query::{Event, HookOutcome, Payload, QueryError, Record, Written};
use serde_json::json;

#[tokio::test]
async fn test_batch_insert_runs_one_statement_per_record() {
    let (db, counters) = seeded().await;
    let before = Arc::new(AtomicUsize::new(0));
    let after = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&before);
    db.events().register(Event::BeforeInsert, "tags", move |ctx| {
        assert_eq!(ctx.records.map_or(0, <[_]>::len), 3);
        counter.fetch_add(1, Ordering::SeqCst);
        None
    });
    let counter = Arc::clone(&after);
    db.events().register(Event::AfterInsert, "tags", move |ctx| {
        assert_eq!(ctx.insert_ids.map_or(0, <[_]>::len), 3);
        counter.fetch_add(1, Ordering::SeqCst);
        None
    });

    let ids = db
        .table("tags")
        .insert(vec![
            Record::new().set("label", "a"),
            Record::new().set("label", "b"),
            Record::new().set("label", "c"),
        ])
        .await
        .unwrap();

    assert_eq!(ids, vec![Some(4), Some(5), Some(6)]);
    assert_eq!(counters.statements(), 3);
    assert_eq!(before.load(Ordering::SeqCst), 1);
    assert_eq!(after.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_insert_from_json_payload() {
    let (db, _) = seeded().await;
    let payload = Payload::try_from(json!({"label": "json"})).unwrap();
    let ids = db.table("tags").insert(payload).await.unwrap();
    assert_eq!(ids, vec![Some(4)]);

    let payload = Payload::try_from(json!([{"label": "x"}, {"label": "y"}])).unwrap();
    let ids = db.table("tags").insert(payload).await.unwrap();
    assert_eq!(ids, vec![Some(5), Some(6)]);

    let ids = db.table("tags").insert(Vec::<Record>::new()).await.unwrap();
    assert!(ids.is_empty());
}

#[tokio::test]
async fn test_insert_ignore_and_replace() {
    let (db, _) = seeded().await;
    let duplicate = Record::new()
        .set("id", 1)
        .set("name", "duplicate")
        .set("email", "user1@example.com");

    let ids = db
        .table("users")
        .insert_ignore(duplicate.clone())
        .await
        .unwrap();
    assert_eq!(ids, vec![None]);
    let user = db.table("users").find(1).await.unwrap().unwrap();
    assert_eq!(user["name"], json!("user1"));

    db.table("users").replace(duplicate).await.unwrap();
    let user = db.table("users").find(1).await.unwrap().unwrap();
    assert_eq!(user["name"], json!("duplicate"));
    assert_eq!(user["team"], json!(null));

    let err = db
        .table("users")
        .insert(Record::new().set("id", 2).set("name", "clash"))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Database(_)));
}

#[tokio::test]
async fn test_upsert() {
    let (db, _) = seeded().await;
    db.table("users")
        .on_duplicate_key_update(Record::new().set("name", "upserted"))
        .on_conflict(&["id"])
        .insert(Record::new().set("id", 1).set("name", "ignored"))
        .await
        .unwrap();
    let user = db.table("users").find(1).await.unwrap().unwrap();
    assert_eq!(user["name"], json!("upserted"));
    assert_eq!(user["team"], json!("red"));
}

#[tokio::test]
async fn test_update_and_delete() {
    let (db, _) = seeded().await;
    let updated = db
        .table("users")
        .where_eq("team", "red")
        .update(Record::new().set("score", 0))
        .await
        .unwrap();
    assert_eq!(updated, 4);
    let total = db
        .table("users")
        .where_eq("team", "red")
        .sum("score")
        .await
        .unwrap();
    assert!(total.abs() < f64::EPSILON);

    let deleted = db
        .table("users")
        .where_eq("team", "green")
        .delete()
        .await
        .unwrap();
    assert_eq!(deleted, 3);
    assert_eq!(db.table("users").count().await.unwrap(), 8);

    let err = db
        .table("users")
        .update(Record::new())
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Compile(_)));
}

#[tokio::test]
async fn test_write_hooks_can_substitute() {
    let (db, counters) = seeded().await;
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    db.events().register(Event::AfterDelete, "posts", move |ctx| {
        counter.fetch_add(usize::try_from(ctx.affected.unwrap_or(0)).unwrap_or(0), Ordering::SeqCst);
        None
    });
    db.events()
        .register(Event::BeforeUpdate, "users", |_| Some(HookOutcome::Affected(42)));

    let affected = db
        .table("users")
        .update(Record::new().set("name", "nobody"))
        .await
        .unwrap();
    assert_eq!(affected, 42);
    assert_eq!(counters.statements(), 0);

    db.table("posts").where_eq("user_id", 1).delete().await.unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_after_update_hook_receives_the_query() {
    let (db, _) = seeded().await;
    let seen = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&seen);
    db.events().register(Event::AfterUpdate, "users", move |ctx| {
        let query = ctx.query.expect("update query");
        *slot.lock().unwrap() = Some((
            query.sql().to_string(),
            query.bindings().len(),
            ctx.affected,
        ));
        None
    });

    db.table("users")
        .where_eq("team", "blue")
        .update(Record::new().set("score", 0))
        .await
        .unwrap();

    let (sql, bindings, affected) = seen.lock().unwrap().take().expect("hook ran");
    assert!(sql.starts_with("UPDATE"));
    assert_eq!(bindings, 2);
    assert_eq!(affected, Some(3));
}

#[tokio::test]
async fn test_update_or_insert() {
    let (db, _) = seeded().await;
    let written = db
        .table("users")
        .update_or_insert(
            Record::new().set("email", "user2@example.com"),
            Record::new().set("score", 999),
        )
        .await
        .unwrap();
    assert_eq!(written, Written::Updated(1));
    let user = db.table("users").find(2).await.unwrap().unwrap();
    assert_eq!(user["score"], json!(999));

    let written = db
        .table("users")
        .update_or_insert(
            Record::new().set("email", "new@example.com"),
            Record::new().set("name", "newcomer").set("score", 1),
        )
        .await
        .unwrap();
    assert_eq!(written, Written::Inserted(Some(12)));
    let user = db.table("users").find(12).await.unwrap().unwrap();
    assert_eq!(user["email"], json!("new@example.com"));
    assert_eq!(user["name"], json!("newcomer"));
}
