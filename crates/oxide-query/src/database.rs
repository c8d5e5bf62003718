//! Database handles and configuration.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use oxide_query_core::{Adapter, Compiler, GenericDialect, MySqlDialect, PostgresDialect};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::connection::{Connection, SqliteConnection};
use crate::error::{QueryError, Result};
use crate::events::EventRegistry;
use crate::handler::QueryBuilderHandler;

/// The supported SQL dialects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    Sqlite,
    Mysql,
    Postgres,
    Generic,
}

impl DialectKind {
    /// Returns the stock compiler for the dialect.
    #[must_use]
    pub fn adapter(self) -> Arc<dyn Adapter> {
        match self {
            Self::Sqlite => Arc::new(oxide_query_sqlite::compiler()),
            Self::Mysql => Arc::new(Compiler::new(MySqlDialect::new())),
            Self::Postgres => Arc::new(Compiler::new(PostgresDialect::new())),
            Self::Generic => Arc::new(Compiler::new(GenericDialect::new())),
        }
    }
}

/// Connection settings.
///
/// Deserializable, so it can be embedded in an application's own config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL, e.g. `sqlite::memory:` or `sqlite://app.db`.
    pub url: String,
    pub dialect: DialectKind,
    /// Prepended to every table name.
    pub prefix: Option<String>,
    /// Reconnect-and-reissue cycles allowed per statement.
    pub max_reconnect_attempts: u32,
    /// Column used by late-lookup pagination and `find`.
    pub primary_key: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::from("sqlite::memory:"),
            dialect: DialectKind::Sqlite,
            prefix: None,
            max_reconnect_attempts: 3,
            primary_key: String::from("id"),
        }
    }
}

impl DatabaseConfig {
    /// Creates a config for a URL with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub const fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }
}

/// A shared connection plus everything needed to compile and hook statements.
///
/// Cloning is cheap and every clone talks to the same connection. Statements
/// from all clones and all handlers derived from them run one at a time.
#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Box<dyn Connection>>>,
    adapter: Arc<dyn Adapter>,
    events: Arc<EventRegistry>,
    config: Arc<DatabaseConfig>,
}

impl Database {
    /// Wraps an open connection.
    pub fn new<C>(connection: C, adapter: Arc<dyn Adapter>, config: DatabaseConfig) -> Self
    where
        C: Connection + 'static,
    {
        Self {
            connection: Arc::new(Mutex::new(Box::new(connection))),
            adapter,
            events: Arc::new(EventRegistry::new()),
            config: Arc::new(config),
        }
    }

    /// Opens the built-in SQLite driver.
    ///
    /// Other dialects need a caller-supplied [`Connection`] via [`Database::new`].
    pub async fn connect(config: DatabaseConfig) -> Result<Self> {
        if config.dialect != DialectKind::Sqlite {
            return Err(QueryError::Configuration(format!(
                "no built-in driver for the {:?} dialect",
                config.dialect
            )));
        }
        let connection = SqliteConnection::connect(&config.url).await?;
        let adapter = config.dialect.adapter();
        Ok(Self::new(connection, adapter, config))
    }

    /// Starts a query on a table.
    #[must_use]
    pub fn table(&self, name: &str) -> QueryBuilderHandler {
        QueryBuilderHandler::new(self.clone()).from(name)
    }

    /// Starts a query with no table.
    #[must_use]
    pub fn query(&self) -> QueryBuilderHandler {
        QueryBuilderHandler::new(self.clone())
    }

    /// Runs `f` inside a transaction. See [`QueryBuilderHandler::transaction`].
    pub async fn transaction<T, F>(&self, f: F) -> Result<Option<T>>
    where
        F: for<'t> FnOnce(&'t mut QueryBuilderHandler) -> BoxFuture<'t, Result<T>>,
    {
        self.query().transaction(f).await
    }

    #[must_use]
    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    #[must_use]
    pub fn adapter(&self) -> &dyn Adapter {
        self.adapter.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub(crate) fn connection(&self) -> &Mutex<Box<dyn Connection>> {
        &self.connection
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.adapter.name())
            .field("config", &self.config)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
