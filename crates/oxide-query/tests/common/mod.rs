#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use oxide_query::{
    Binding, Connection, Database, DatabaseConfig, DialectKind, Executed, QueryError, Raw,
    Result, Row, SqliteConnection,
};

const SCHEMA: &[&str] = &[
    "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, team TEXT, score INTEGER, email TEXT UNIQUE)",
    "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT)",
    "CREATE TABLE profiles (id INTEGER PRIMARY KEY, user_id INTEGER, bio TEXT)",
    "CREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT)",
    "CREATE TABLE post_tag (post_id INTEGER, tag_id INTEGER)",
];

/// Counters shared with an [`InstrumentedConnection`].
#[derive(Debug, Clone, Default)]
pub struct Counters {
    statements: Arc<AtomicUsize>,
    reconnects: Arc<AtomicUsize>,
    failures: Arc<AtomicU32>,
}

impl Counters {
    /// Statements handed to the driver, failed ones included.
    pub fn statements(&self) -> usize {
        self.statements.load(Ordering::SeqCst)
    }

    pub fn reconnects(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }

    /// Makes the next `n` statements fail as if the server went away.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.statements.store(0, Ordering::SeqCst);
        self.reconnects.store(0, Ordering::SeqCst);
    }

    fn tick(&self) -> Result<()> {
        self.statements.fetch_add(1, Ordering::SeqCst);
        let pending = self.failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures.store(pending - 1, Ordering::SeqCst);
            return Err(QueryError::ConnectionLost(String::from(
                "MySQL server has gone away",
            )));
        }
        Ok(())
    }
}

/// An in-memory SQLite connection that counts statements and can simulate
/// connection loss. Reconnecting keeps the same session so seeded data
/// survives.
#[derive(Debug)]
pub struct InstrumentedConnection {
    inner: SqliteConnection,
    counters: Counters,
}

#[async_trait]
impl Connection for InstrumentedConnection {
    async fn execute(&mut self, sql: &str, bindings: &[Binding]) -> Result<Executed> {
        self.counters.tick()?;
        self.inner.execute(sql, bindings).await
    }

    async fn fetch_all(&mut self, sql: &str, bindings: &[Binding]) -> Result<Vec<Row>> {
        self.counters.tick()?;
        self.inner.fetch_all(sql, bindings).await
    }

    async fn begin(&mut self) -> Result<()> {
        self.inner.begin().await
    }

    async fn commit(&mut self) -> Result<()> {
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.inner.rollback().await
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.counters.reconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A database with the test schema and no rows.
pub async fn empty() -> (Database, Counters) {
    empty_with(DatabaseConfig::default()).await
}

pub async fn empty_with(config: DatabaseConfig) -> (Database, Counters) {
    let inner = SqliteConnection::connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    let counters = Counters::default();
    let connection = InstrumentedConnection {
        inner,
        counters: counters.clone(),
    };
    let db = Database::new(connection, DialectKind::Sqlite.adapter(), config);
    for ddl in SCHEMA {
        db.query()
            .execute_raw(Raw::new(*ddl))
            .await
            .unwrap_or_else(|e| panic!("Failed to run: {ddl}\nError: {e:?}"));
    }
    counters.reset();
    (db, counters)
}

/// A database with the test schema and fixture rows:
///
/// - users 1..=10 in teams red (4), blue (3) and green (3), scores 10..=100;
///   user 11 has no team, no email and a score of 0
/// - posts: user 1 has 2, user 2 has 1
/// - profiles: user 1 has two (the later one wins), user 3 has one
/// - tags on posts 1 and 2
pub async fn seeded() -> (Database, Counters) {
    let (db, counters) = empty().await;
    let teams = ["red", "red", "red", "red", "blue", "blue", "blue", "green", "green", "green"];
    let mut fixtures: Vec<String> = teams
        .iter()
        .enumerate()
        .map(|(i, team)| {
            let id = i + 1;
            format!(
                "INSERT INTO users (id, name, team, score, email) VALUES ({id}, 'user{id}', '{team}', {}, 'user{id}@example.com')",
                id * 10
            )
        })
        .collect();
    fixtures.push(String::from(
        "INSERT INTO users (id, name, team, score) VALUES (11, 'loner', NULL, 0)",
    ));
    fixtures.extend(
        [
            "INSERT INTO posts (id, user_id, title) VALUES (1, 1, 'first'), (2, 1, 'second'), (3, 2, 'third')",
            "INSERT INTO profiles (id, user_id, bio) VALUES (1, 1, 'old bio'), (2, 1, 'new bio'), (3, 3, 'hello')",
            "INSERT INTO tags (id, label) VALUES (1, 'rust'), (2, 'sql'), (3, 'unused')",
            "INSERT INTO post_tag (post_id, tag_id) VALUES (1, 1), (1, 2), (2, 2)",
        ]
        .map(String::from),
    );
    for sql in &fixtures {
        db.query()
            .execute_raw(Raw::new(sql.as_str()))
            .await
            .unwrap_or_else(|e| panic!("Failed to run: {sql}\nError: {e:?}"));
    }
    counters.reset();
    (db, counters)
}

/// Ids of a result set, in order.
pub fn ids(rows: &[Row]) -> Vec<i64> {
    rows.iter()
        .map(|row| row["id"].as_i64().expect("integer id"))
        .collect()
}
