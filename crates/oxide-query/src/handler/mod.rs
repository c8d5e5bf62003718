//! The query builder handler.
//!
//! A [`QueryBuilderHandler`] owns one [`Statement`] and grows it through
//! by-value fluent calls. Terminal operations (`get`, `first`, `count`,
//! `insert`, `update`, `delete`, ...) compile the statement through the
//! database's [`Adapter`](oxide_query_core::Adapter), run it through the
//! retrying execution layer and post-process the rows.
//!
//! ```ignore
//! let db = Database::connect(DatabaseConfig::new("sqlite::memory:")).await?;
//!
//! let users = db
//!     .table("users")
//!     .select(&["id", "name"])
//!     .where_eq("active", true)
//!     .with_many("posts", "posts", "user_id", "id")
//!     .order_by_desc("id")
//!     .limit(10)
//!     .get()
//!     .await?;
//! ```
//!
//! # Table prefixes
//!
//! When a prefix is configured, bare table names are always prefixed, while
//! column names are prefixed only when qualified (`users.id` becomes
//! `app_users.id`, `id` stays `id`). Raw fragments and sub-queries pass
//! through untouched.

mod clauses;
mod execution;
mod joins;
mod predicates;
mod read;
mod transaction;
mod write;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use oxide_query_core::{CompileKind, Field, Query, Raw, Statement, TableRef};
use tracing::info;

use crate::cache::CacheHandler;
use crate::database::Database;
use crate::eager::Relation;
use crate::error::{QueryError, Result};
use crate::events::ANY_TABLE;
use crate::registry;
use crate::row::Row;

pub use joins::JoinBuilder;
pub use read::{Aggregate, Page, PageOptions};
pub use write::{Payload, Written};

pub(crate) use transaction::TransactionScope;

/// A row transformation applied after eager loading.
pub type RowMap = Arc<dyn Fn(Row) -> Row + Send + Sync>;

#[derive(Clone)]
struct CacheSettings {
    handler: Arc<dyn CacheHandler>,
    ttl: Duration,
    key: Option<String>,
}

/// Fluent builder and executor for one statement.
#[derive(Clone)]
pub struct QueryBuilderHandler {
    database: Database,
    statement: Statement,
    prefix: Option<String>,
    /// Unprefixed name of the main table, used to key events.
    table_name: Option<String>,
    pub(crate) relations: Vec<Relation>,
    maps: Vec<RowMap>,
    cache: Option<CacheSettings>,
    pending: Option<Vec<Row>>,
    attempts: u32,
    transaction: Option<Arc<TransactionScope>>,
    dump: bool,
}

impl QueryBuilderHandler {
    /// Creates a handler with an empty statement.
    #[must_use]
    pub fn new(database: Database) -> Self {
        let prefix = database.config().prefix.clone();
        Self {
            database,
            statement: Statement::new(),
            prefix,
            table_name: None,
            relations: Vec::new(),
            maps: Vec::new(),
            cache: None,
            pending: None,
            attempts: 0,
            transaction: None,
            dump: false,
        }
    }

    /// Creates a handler on the registered default database.
    ///
    /// Meant for tests; see [`registry`].
    pub fn from_default() -> Result<Self> {
        registry::default_database().map(Self::new)
    }

    /// Starts a fresh query on `name`.
    ///
    /// The new handler shares the connection and copies the prefix, cache
    /// settings and transaction scope. Nothing else carries over.
    #[must_use]
    pub fn table(&self, name: &str) -> Self {
        self.new_query().from(name)
    }

    /// Starts a fresh query with no table.
    #[must_use]
    pub fn new_query(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            cache: self.cache.clone(),
            transaction: self.transaction.clone(),
            ..Self::new(self.database.clone())
        }
    }

    /// Replaces the table prefix for names added from now on.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Makes the next statement fail with [`QueryError::Dumped`] carrying its
    /// inlined SQL, instead of running it.
    #[must_use]
    pub const fn dump(mut self) -> Self {
        self.dump = true;
        self
    }

    /// The statement being built.
    #[must_use]
    pub const fn statement(&self) -> &Statement {
        &self.statement
    }

    /// The database this handler runs on.
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.database
    }

    /// Reconnect attempts spent by the last statement.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Compiles the statement as `kind`.
    pub fn get_query(&self, kind: CompileKind) -> Result<Query> {
        Ok(self
            .database
            .adapter()
            .compile(kind, &self.statement, None)?)
    }

    /// Compiles the select and inlines its bindings. For inspection only.
    pub fn get_sql(&self) -> Result<String> {
        Ok(self.get_query(CompileKind::Select)?.raw_sql())
    }

    /// Compiles the select as a fragment for use inside another statement.
    ///
    /// With an alias the fragment reads `(SELECT ...) AS alias` and fits a
    /// FROM or projection slot. Without one it is the bare `SELECT ...`, for
    /// `IN` operands.
    pub fn sub_query(&self, alias: Option<&str>) -> Result<Raw> {
        let adapter = self.database.adapter();
        let (sql, bindings) = adapter
            .compile_fragment(CompileKind::Select, &self.statement, None)?
            .into_parts();
        let sql = match alias {
            Some(alias) => format!("({sql}) AS {}", adapter.quote_identifier(alias)),
            None => sql,
        };
        Ok(Raw::with_bindings(sql, bindings))
    }

    fn table_prefixed(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{name}"),
            None => name.to_string(),
        }
    }

    fn column_prefixed(&self, name: &str) -> String {
        prefix_column(self.prefix.as_deref(), name)
    }

    fn field(&self, name: &str) -> Field {
        Field::Column(self.column_prefixed(name))
    }

    fn event_table(&self) -> &str {
        self.table_name.as_deref().unwrap_or(ANY_TABLE)
    }

    /// The main table as written in the statement (prefixed).
    fn main_table(&self) -> Option<&str> {
        match self.statement.tables.first() {
            Some(TableRef::Name(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    fn intercept_dump(&mut self, query: &Query) -> Result<()> {
        if self.dump {
            self.dump = false;
            let sql = query.raw_sql();
            info!(sql = %sql, "Dumped query");
            return Err(QueryError::Dumped(sql));
        }
        Ok(())
    }
}

/// Prefixes a column name only when it is qualified by a table.
pub(crate) fn prefix_column(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) if name.contains('.') => format!("{prefix}{name}"),
        _ => name.to_string(),
    }
}

impl fmt::Debug for QueryBuilderHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilderHandler")
            .field("statement", &self.statement)
            .field("prefix", &self.prefix)
            .field("relations", &self.relations.len())
            .field("maps", &self.maps.len())
            .field("cached", &self.cache.is_some())
            .field("in_transaction", &self.transaction.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_column_rule() {
        assert_eq!(prefix_column(Some("app_"), "id"), "id");
        assert_eq!(prefix_column(Some("app_"), "users.id"), "app_users.id");
        assert_eq!(prefix_column(None, "users.id"), "users.id");
    }
}
