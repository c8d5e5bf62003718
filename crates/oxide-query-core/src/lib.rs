//! # oxide-query-core
//!
//! Dialect-neutral building blocks for the `oxide-query` builder:
//!
//! - [`Statement`]: the clause-by-clause description of one SQL statement,
//!   pure data with no behavior attached.
//! - [`Raw`]: an opaque SQL fragment with its own bindings. Raw fragments are
//!   never quoted, prefixed or escaped.
//! - [`Dialect`]: the per-database grammar knobs (quoting, placeholders,
//!   insert verbs, upsert syntax).
//! - [`Adapter`]: the compile contract. [`Compiler`] implements it for any
//!   [`Dialect`].
//! - [`Query`]: compiled SQL plus bindings, with an inline debug renderer.
//!
//! ## Example
//!
//! ```rust
//! use oxide_query_core::{
//!     Adapter, CompileKind, Compiler, GenericDialect, Operand, Operator, Predicate,
//!     Statement,
//! };
//!
//! let mut statement = Statement::default();
//! statement.tables.push("users".into());
//! statement
//!     .wheres
//!     .push(Predicate::compare("status", Operator::Eq, Operand::from("active")));
//! statement.limit = Some(10);
//!
//! let query = Compiler::new(GenericDialect::new())
//!     .compile(CompileKind::Select, &statement, None)
//!     .unwrap();
//! assert_eq!(
//!     query.sql(),
//!     r#"SELECT * FROM "users" WHERE "status" = ? LIMIT 10"#
//! );
//! assert_eq!(
//!     query.raw_sql(),
//!     r#"SELECT * FROM "users" WHERE "status" = 'active' LIMIT 10"#
//! );
//! ```

pub mod compiler;
pub mod dialect;
pub mod error;
pub mod query;
pub mod raw;
pub mod statement;
pub mod value;

pub use compiler::{Adapter, CompileKind, Compiler};
pub use dialect::{Dialect, GenericDialect, InsertMode, MySqlDialect, PostgresDialect, UpsertStyle};
pub use error::CompileError;
pub use query::{PlaceholderStyle, Query};
pub use raw::Raw;
pub use statement::{
    Condition, Direction, Field, Join, JoinKind, Joiner, Operand, Operator, Ordering,
    Predicate, Record, Statement, TableRef, Upsert,
};
pub use value::{SqlValue, ToSqlValue};
