//! SQL dialect support.
//!
//! The compiler is dialect-neutral; everything that differs between databases
//! is asked of a [`Dialect`]. Returning `None` from [`Dialect::insert_verb`]
//! marks an insert mode the database cannot express, which the compiler turns
//! into a [`CompileError::Unsupported`](crate::CompileError::Unsupported).

mod generic;
mod mysql;
mod postgres;

pub use generic::GenericDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;

/// The three flavors of INSERT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Plain `INSERT`.
    Insert,
    /// Insert, silently skipping rows that violate a unique constraint.
    Ignore,
    /// Insert, deleting any conflicting row first.
    Replace,
}

/// How a dialect spells "insert or update".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStyle {
    /// `ON CONFLICT (target) DO UPDATE SET col = excluded.col` (PostgreSQL, SQLite).
    OnConflict,
    /// `ON DUPLICATE KEY UPDATE col = ?` (MySQL).
    OnDuplicateKey,
}

/// Trait for SQL dialect-specific behavior.
pub trait Dialect: Send + Sync {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character (e.g., `"` for standard SQL, `` ` `` for MySQL).
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Whether placeholders are numbered (`$1`, `$2`) instead of `?`.
    fn numbered_parameters(&self) -> bool {
        false
    }

    /// Returns the statement head for an insert mode, or `None` if unsupported.
    fn insert_verb(&self, mode: InsertMode) -> Option<&'static str> {
        match mode {
            InsertMode::Insert => Some("INSERT INTO"),
            InsertMode::Ignore | InsertMode::Replace => None,
        }
    }

    /// Returns a clause appended after VALUES for an insert mode.
    fn insert_suffix(&self, _mode: InsertMode) -> &'static str {
        ""
    }

    /// Returns the upsert syntax.
    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::OnConflict
    }

    /// Whether UPDATE and DELETE accept ORDER BY / LIMIT.
    fn supports_limit_on_write(&self) -> bool {
        false
    }

    /// LIMIT value used when only an OFFSET is requested, for dialects that
    /// reject a bare OFFSET.
    fn unbounded_limit(&self) -> Option<&'static str> {
        None
    }

    /// Quotes one identifier, doubling embedded quote characters.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        let escaped = name.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }
}
