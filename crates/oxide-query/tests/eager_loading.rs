mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::{ids, seeded};
use oxide_query::{Direction, Event, QueryError, Relation, Via};
use serde_json::{json, Value};

fn labels(value: &Value) -> Vec<String> {
    let mut labels: Vec<String> = value
        .as_array()
        .expect("relation array")
        .iter()
        .map(|tag| tag["label"].as_str().unwrap_or_default().to_string())
        .collect();
    labels.sort();
    labels
}

#[tokio::test]
async fn test_one_to_one_last_match_wins() {
    let (db, counters) = seeded().await;
    let rows = db
        .table("users")
        .where_in("id", [1, 2, 3])
        .order_by("id", Direction::Asc)
        .with_one("profile", "profiles", "user_id", "id")
        .get()
        .await
        .unwrap();

    assert_eq!(ids(&rows), vec![1, 2, 3]);
    assert_eq!(rows[0]["profile"]["bio"], json!("new bio"));
    assert_eq!(rows[1]["profile"], Value::Null);
    assert_eq!(rows[2]["profile"]["bio"], json!("hello"));
    assert!(rows[0]["profile"].get("__relation_key").is_none());
    // Root query plus one query for the relation.
    assert_eq!(counters.statements(), 2);
}

#[tokio::test]
async fn test_one_to_many() {
    let (db, counters) = seeded().await;
    let rows = db
        .table("users")
        .where_in("id", [1, 2, 3])
        .order_by("id", Direction::Asc)
        .with_many("posts", "posts", "user_id", "id")
        .get()
        .await
        .unwrap();

    let titles: Vec<usize> = rows
        .iter()
        .map(|row| row["posts"].as_array().map_or(0, Vec::len))
        .collect();
    assert_eq!(titles, vec![2, 1, 0]);
    assert_eq!(rows[1]["posts"][0]["title"], json!("third"));
    assert_eq!(counters.statements(), 2);
}

#[tokio::test]
async fn test_many_to_many_with_two_queries() {
    let (db, counters) = seeded().await;
    let rows = db
        .table("posts")
        .order_by("id", Direction::Asc)
        .with_many_via("tags", "tags", "id", "id", Via::new("post_tag", "post_id", "tag_id"))
        .get()
        .await
        .unwrap();

    assert_eq!(labels(&rows[0]["tags"]), vec!["rust", "sql"]);
    assert_eq!(labels(&rows[1]["tags"]), vec!["sql"]);
    assert_eq!(rows[2]["tags"], json!([]));
    assert_eq!(counters.statements(), 3);
}

#[tokio::test]
async fn test_many_to_many_with_join() {
    let (db, counters) = seeded().await;
    let relation = Relation::many_via(
        "tags",
        "tags",
        "id",
        "id",
        Via::new("post_tag", "post_id", "tag_id"),
    )
    .join_instead_select();
    let rows = db
        .table("posts")
        .order_by("id", Direction::Asc)
        .with(relation)
        .get()
        .await
        .unwrap();

    assert_eq!(labels(&rows[0]["tags"]), vec!["rust", "sql"]);
    assert_eq!(labels(&rows[1]["tags"]), vec!["sql"]);
    assert_eq!(rows[2]["tags"], json!([]));
    assert_eq!(counters.statements(), 2);
}

#[tokio::test]
async fn test_no_keys_means_no_query() {
    let (db, counters) = seeded().await;
    // User 11 has no email, so there is nothing to correlate on.
    let rows = db
        .table("users")
        .where_eq("id", 11)
        .with_many("posts", "posts", "title", "email")
        .with_one("profile", "profiles", "bio", "email")
        .get()
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["posts"], json!([]));
    assert_eq!(rows[0]["profile"], Value::Null);
    assert_eq!(counters.statements(), 1);

    counters.reset();
    let rows = db
        .table("users")
        .where_eq("id", 999)
        .with_many("posts", "posts", "user_id", "id")
        .get()
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(counters.statements(), 1);
}

#[tokio::test]
async fn test_refine_narrows_related_query() {
    let (db, _) = seeded().await;
    let relation =
        Relation::many("posts", "posts", "user_id", "id").refine(|q| q.where_eq("title", "second"));
    let row = db
        .table("users")
        .where_eq("id", 1)
        .with(relation)
        .first()
        .await
        .unwrap()
        .unwrap();
    let posts = row["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["title"], json!("second"));
}

#[tokio::test]
async fn test_relations_apply_before_maps() {
    let (db, _) = seeded().await;
    let rows = db
        .table("users")
        .where_eq("id", 1)
        .with_many("posts", "posts", "user_id", "id")
        .map(|mut row| {
            let count = row["posts"].as_array().map_or(0, Vec::len);
            row.insert(String::from("post_count"), json!(count));
            row
        })
        .get()
        .await
        .unwrap();
    assert_eq!(rows[0]["post_count"], json!(2));
}

#[tokio::test]
async fn test_relations_are_consumed_by_get() {
    let (db, counters) = seeded().await;
    let mut query = db
        .table("users")
        .where_eq("id", 1)
        .with_many("posts", "posts", "user_id", "id");
    let first = query.get().await.unwrap();
    assert!(first[0].contains_key("posts"));

    counters.reset();
    let second = query.get().await.unwrap();
    assert!(!second[0].contains_key("posts"));
    assert_eq!(counters.statements(), 1);
}

#[tokio::test]
async fn test_relation_failure_fails_the_whole_get() {
    let (db, counters) = seeded().await;
    let err = db
        .table("users")
        .with(Relation::many("ghosts", "missing_table", "user_id", "id"))
        .get()
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Database(_)));
    assert_eq!(counters.statements(), 2);
}

#[tokio::test]
async fn test_relation_connection_loss_is_not_retried() {
    let (db, counters) = seeded().await;
    let armed = Arc::new(AtomicBool::new(true));
    let trigger = counters.clone();
    let once = Arc::clone(&armed);
    // Root rows arrive, then the relation query loses the connection.
    db.events().register(Event::AfterSelect, "users", move |_| {
        if once.swap(false, Ordering::SeqCst) {
            trigger.fail_next(1);
        }
        None
    });

    let err = db
        .table("users")
        .with_many("posts", "posts", "user_id", "id")
        .get()
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::ConnectionLost(_)));
    assert!(!armed.load(Ordering::SeqCst));
    assert_eq!(counters.reconnects(), 0);
    assert_eq!(counters.statements(), 2);
}
