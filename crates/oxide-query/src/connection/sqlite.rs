//! SQLite connection provider backed by sqlx.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Connection as _, Row as _, Sqlite, ValueRef};
use tracing::debug;

use super::{Binding, Connection, Executed};
use crate::error::{QueryError, Result};
use crate::row::Row;

type SqlxQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// A single sqlx SQLite connection that can re-open itself.
///
/// Reconnecting to `sqlite::memory:` yields a fresh, empty database.
pub struct SqliteConnection {
    url: String,
    inner: Option<sqlx::SqliteConnection>,
}

impl SqliteConnection {
    /// Opens a connection.
    pub async fn connect(url: &str) -> Result<Self> {
        let inner = sqlx::SqliteConnection::connect(url).await?;
        debug!(url = %url, "Opened SQLite connection");
        Ok(Self {
            url: url.to_string(),
            inner: Some(inner),
        })
    }

    /// Returns the connection URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn live(&mut self) -> Result<&mut sqlx::SqliteConnection> {
        self.inner
            .as_mut()
            .ok_or_else(|| QueryError::ConnectionLost(String::from("connection is closed")))
    }

    async fn run_plain(&mut self, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(self.live()?).await?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("url", &self.url)
            .field("open", &self.inner.is_some())
            .finish()
    }
}

fn bind_all<'q>(sql: &'q str, bindings: &'q [Binding]) -> SqlxQuery<'q> {
    bindings
        .iter()
        .fold(sqlx::query(sql), |query, binding| match binding {
            Binding::Null => query.bind(None::<i64>),
            Binding::Int(n) => query.bind(*n),
            Binding::Text(s) => query.bind(s.as_str()),
            Binding::Blob(b) => query.bind(b.as_slice()),
        })
}

fn decode_row(row: &SqliteRow) -> Result<Row> {
    let mut out = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else if let Ok(n) = row.try_get::<i64, _>(i) {
            Value::from(n)
        } else if let Ok(f) = row.try_get::<f64, _>(i) {
            serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)
        } else if let Ok(s) = row.try_get::<String, _>(i) {
            Value::String(s)
        } else {
            Value::from(row.try_get::<Vec<u8>, _>(i)?)
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn execute(&mut self, sql: &str, bindings: &[Binding]) -> Result<Executed> {
        let result = bind_all(sql, bindings).execute(self.live()?).await?;
        Ok(Executed {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()),
        })
    }

    async fn fetch_all(&mut self, sql: &str, bindings: &[Binding]) -> Result<Vec<Row>> {
        let rows = bind_all(sql, bindings).fetch_all(self.live()?).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn begin(&mut self) -> Result<()> {
        self.run_plain("BEGIN").await
    }

    async fn commit(&mut self) -> Result<()> {
        self.run_plain("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.run_plain("ROLLBACK").await
    }

    async fn reconnect(&mut self) -> Result<()> {
        if let Some(old) = self.inner.take() {
            // Best effort: the old session is usually already dead.
            let _ = old.close().await;
        }
        self.inner = Some(sqlx::SqliteConnection::connect(&self.url).await?);
        debug!(url = %self.url, "Reconnected SQLite connection");
        Ok(())
    }
}
