//! # oxide-query
//!
//! A fluent SQL query builder with eager loading, result caching, lifecycle
//! hooks and resilient execution.
//!
//! This crate provides:
//! - [`QueryBuilderHandler`]: the fluent builder and executor for one
//!   statement
//! - [`Relation`]: eager-load declarations resolved with one query per
//!   relation
//! - [`EventRegistry`]: before/after hooks keyed by event and table
//! - [`CacheHandler`]: pluggable memoization of select results
//! - [`Connection`]: the driver contract, with [`SqliteConnection`] built in
//!
//! ## Quick Start
//!
//! ```ignore
//! use oxide_query::{Database, DatabaseConfig, Record};
//!
//! async fn example() -> oxide_query::Result<()> {
//!     let db = Database::connect(DatabaseConfig::new("sqlite::memory:")).await?;
//!
//!     let ids = db
//!         .table("users")
//!         .insert(Record::new().set("name", "ada").set("active", true))
//!         .await?;
//!
//!     let active = db
//!         .table("users")
//!         .where_eq("active", true)
//!         .with_many("posts", "posts", "user_id", "id")
//!         .get()
//!         .await?;
//!
//!     let page = db.table("users").order_by_desc("id").paginate(2, 20).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! Every fallible operation returns [`QueryError`]. Connection loss is
//! retried transparently up to
//! [`DatabaseConfig::max_reconnect_attempts`] times per statement before
//! surfacing as [`QueryError::RetriesExhausted`].

pub mod cache;
pub mod connection;
pub mod database;
pub mod eager;
pub mod error;
pub mod events;
mod handler;
pub mod registry;
pub mod row;

pub use cache::{CacheHandler, MemoryCache};
pub use connection::{Binding, Connection, Executed, SqliteConnection};
pub use database::{Database, DatabaseConfig, DialectKind};
pub use eager::{Relation, Via};
pub use error::{QueryError, Result};
pub use events::{Event, EventContext, EventRegistry, HookOutcome, ANY_TABLE};
pub use handler::{
    Aggregate, JoinBuilder, Page, PageOptions, Payload, QueryBuilderHandler, RowMap, Written,
};
pub use row::Row;

// Re-export the statement vocabulary so callers need a single dependency.
pub use oxide_query_core::{
    CompileKind, Direction, JoinKind, Operand, Operator, Query, Raw, Record, SqlValue,
    ToSqlValue,
};
