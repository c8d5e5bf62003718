//! MySQL dialect.

use super::{Dialect, InsertMode, UpsertStyle};

/// MySQL / MariaDB dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn insert_verb(&self, mode: InsertMode) -> Option<&'static str> {
        Some(match mode {
            InsertMode::Insert => "INSERT INTO",
            InsertMode::Ignore => "INSERT IGNORE INTO",
            InsertMode::Replace => "REPLACE INTO",
        })
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::OnDuplicateKey
    }

    fn supports_limit_on_write(&self) -> bool {
        true
    }

    fn unbounded_limit(&self) -> Option<&'static str> {
        Some("18446744073709551615")
    }
}
