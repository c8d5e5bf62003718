//! Table, projection, grouping, ordering and paging clauses.

use std::sync::Arc;
use std::time::Duration;

use oxide_query_core::{Direction, Field, Ordering, Raw, Record, TableRef, Upsert};

use super::{CacheSettings, QueryBuilderHandler};
use crate::cache::CacheHandler;
use crate::error::{QueryError, Result};
use crate::row::Row;

impl QueryBuilderHandler {
    /// Adds a table. The first table names the events fired by this handler.
    #[must_use]
    pub fn from(mut self, table: &str) -> Self {
        if self.table_name.is_none() {
            self.table_name = Some(table.to_string());
        }
        let table = self.table_prefixed(table);
        self.statement.tables.push(TableRef::Name(table));
        self
    }

    /// Adds a raw table expression, typically from [`Self::sub_query`].
    #[must_use]
    pub fn from_raw(mut self, raw: Raw) -> Self {
        self.statement.tables.push(TableRef::Raw(raw));
        self
    }

    /// Appends columns to the projection.
    #[must_use]
    pub fn select(mut self, columns: &[&str]) -> Self {
        let fields: Vec<Field> = columns.iter().map(|c| self.field(c)).collect();
        self.statement.selects.extend(fields);
        self
    }

    /// Appends a raw projection entry.
    #[must_use]
    pub fn select_raw(mut self, raw: Raw) -> Self {
        self.statement.selects.push(Field::Raw(raw));
        self
    }

    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.statement.distinct = true;
        self
    }

    #[must_use]
    pub fn group_by(mut self, columns: &[&str]) -> Self {
        let fields: Vec<Field> = columns.iter().map(|c| self.field(c)).collect();
        self.statement.group_bys.extend(fields);
        self
    }

    #[must_use]
    pub fn group_by_raw(mut self, raw: Raw) -> Self {
        self.statement.group_bys.push(Field::Raw(raw));
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        let field = self.field(column);
        self.statement.order_bys.push(Ordering { field, direction });
        self
    }

    #[must_use]
    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by(column, Direction::Desc)
    }

    #[must_use]
    pub fn order_by_raw(mut self, raw: Raw) -> Self {
        self.statement.order_bys.push(Ordering {
            field: Field::Raw(raw),
            direction: Direction::Asc,
        });
        self
    }

    /// Sets LIMIT. Last call wins.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.statement.limit = Some(limit);
        self
    }

    /// Sets OFFSET. Last call wins.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.statement.offset = Some(offset);
        self
    }

    /// Turns inserts into upserts that apply `update` to an existing row.
    #[must_use]
    pub fn on_duplicate_key_update(mut self, update: Record) -> Self {
        self.statement.upsert.get_or_insert_with(Upsert::default).update = update;
        self
    }

    /// Sets the conflict target used by `ON CONFLICT` dialects.
    #[must_use]
    pub fn on_conflict(mut self, columns: &[&str]) -> Self {
        self.statement.upsert.get_or_insert_with(Upsert::default).conflict =
            columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// Appends a row transformation. Maps run in registration order, after
    /// eager loading.
    #[must_use]
    pub fn map<F>(mut self, f: F) -> Self
    where
        F: Fn(Row) -> Row + Send + Sync + 'static,
    {
        self.maps.push(Arc::new(f));
        self
    }

    /// Memoizes `get()` results for `ttl_seconds`.
    ///
    /// A TTL of zero disables caching; a negative TTL is a configuration
    /// error.
    pub fn cache(mut self, handler: Arc<dyn CacheHandler>, ttl_seconds: i64) -> Result<Self> {
        let ttl = u64::try_from(ttl_seconds).map_err(|_| {
            QueryError::Configuration(format!("invalid cache ttl: {ttl_seconds}"))
        })?;
        self.cache = Some(CacheSettings {
            handler,
            ttl: Duration::from_secs(ttl),
            key: None,
        });
        Ok(self)
    }

    /// Uses an explicit cache key instead of the hashed SQL.
    #[must_use]
    pub fn cache_as(mut self, key: impl Into<String>) -> Self {
        if let Some(cache) = self.cache.as_mut() {
            cache.key = Some(key.into());
        }
        self
    }
}
