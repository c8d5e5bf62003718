//! The connection provider contract.
//!
//! A [`Connection`] executes SQL it is handed and nothing more: compilation,
//! retry and post-processing live in the handler. Providers report a dropped
//! connection as [`QueryError::ConnectionLost`](crate::QueryError::ConnectionLost);
//! drivers without structured error codes can fall back to
//! [`is_lost_connection`] on the error message.

mod sqlite;

use std::sync::LazyLock;

use async_trait::async_trait;
use oxide_query_core::SqlValue;
use regex::RegexSet;

use crate::error::Result;
use crate::row::Row;

pub use sqlite::SqliteConnection;

/// A value as handed to the driver.
///
/// Integers and booleans bind as integers. Floats and text bind as text so
/// that drivers never coerce them on their own. Null and blobs stay native.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Null,
    Int(i64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<&SqlValue> for Binding {
    fn from(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null => Self::Null,
            SqlValue::Bool(b) => Self::Int(i64::from(*b)),
            SqlValue::Int(n) => Self::Int(*n),
            SqlValue::Float(f) => Self::Text(f.to_string()),
            SqlValue::Text(s) => Self::Text(s.clone()),
            SqlValue::Blob(b) => Self::Blob(b.clone()),
        }
    }
}

/// Converts compiled bindings into driver bindings.
#[must_use]
pub fn bindings(values: &[SqlValue]) -> Vec<Binding> {
    values.iter().map(Binding::from).collect()
}

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Executed {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// A single database connection.
#[async_trait]
pub trait Connection: Send {
    /// Runs a statement and reports affected rows.
    async fn execute(&mut self, sql: &str, bindings: &[Binding]) -> Result<Executed>;

    /// Runs a query and returns every row.
    async fn fetch_all(&mut self, sql: &str, bindings: &[Binding]) -> Result<Vec<Row>>;

    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Drops the current session and opens a new one.
    async fn reconnect(&mut self) -> Result<()>;
}

/// Driver messages that mean the session is gone.
const LOST_CONNECTION_SIGNATURES: &[&str] = &[
    r"server has gone away",
    r"no connection to the server",
    r"lost connection",
    r"is dead or not enabled",
    r"error while sending",
    r"decryption failed or bad record mac",
    r"server closed the connection unexpectedly",
    r"ssl connection has been closed unexpectedly",
    r"error writing data to the connection",
    r"resource deadlock avoided",
    r"connection (reset|refused|timed out)",
    r"broken pipe",
    r"terminating connection due to administrator command",
    r"database is closed",
];

static LOST_CONNECTION: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(
        LOST_CONNECTION_SIGNATURES
            .iter()
            .map(|signature| format!("(?i){signature}")),
    )
    .unwrap_or_else(|_| RegexSet::empty())
});

/// Whether an error message matches a known connection-loss signature.
#[must_use]
pub fn is_lost_connection(message: &str) -> bool {
    LOST_CONNECTION.is_match(message)
}
