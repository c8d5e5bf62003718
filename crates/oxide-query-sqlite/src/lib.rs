//! # oxide-query-sqlite
//!
//! SQLite dialect for `oxide-query-core`.
//!
//! # How SQLite differs from other dialects
//!
//! - **[UPSERT]**: SQLite supports `INSERT ... ON CONFLICT (target) DO UPDATE
//!   SET ...` (since SQLite 3.24.0). A conflict target is required.
//! - **Insert-or-ignore / replace**: SQLite spells them as
//!   [`INSERT OR IGNORE`] and `REPLACE INTO` (an alias for
//!   `INSERT OR REPLACE`).
//! - **OFFSET**: SQLite rejects `OFFSET` without `LIMIT`, so an offset-only
//!   statement is compiled with `LIMIT -1`.
//! - **Identifier quoting**: SQLite uses double quotes (`"`) as the standard
//!   quoting style, though it also accepts backticks and square brackets.
//!
//! [UPSERT]: https://www.sqlite.org/lang_upsert.html
//! [`INSERT OR IGNORE`]: https://www.sqlite.org/lang_conflict.html
//!
//! ## Example
//!
//! ```rust
//! use oxide_query_core::{Adapter, CompileKind, Compiler, Record, Statement};
//! use oxide_query_sqlite::SqliteDialect;
//!
//! let mut statement = Statement::new();
//! statement.tables.push("users".into());
//! let record = Record::new().set("email", "a@example.com");
//!
//! let query = Compiler::new(SqliteDialect::new())
//!     .compile(CompileKind::InsertIgnore, &statement, Some(&record))
//!     .unwrap();
//! assert_eq!(
//!     query.sql(),
//!     r#"INSERT OR IGNORE INTO "users" ("email") VALUES (?)"#
//! );
//! ```

mod dialect;

pub use dialect::SqliteDialect;

use oxide_query_core::Compiler;

/// The stock compiler for SQLite.
pub type SqliteCompiler = Compiler<SqliteDialect>;

/// Creates a compiler for SQLite.
#[must_use]
pub const fn compiler() -> SqliteCompiler {
    Compiler::new(SqliteDialect::new())
}
