//! PostgreSQL dialect.

use super::{Dialect, InsertMode};

/// PostgreSQL dialect.
///
/// Insert-ignore is spelled `ON CONFLICT DO NOTHING`; there is no REPLACE.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn numbered_parameters(&self) -> bool {
        true
    }

    fn insert_verb(&self, mode: InsertMode) -> Option<&'static str> {
        match mode {
            InsertMode::Insert | InsertMode::Ignore => Some("INSERT INTO"),
            InsertMode::Replace => None,
        }
    }

    fn insert_suffix(&self, mode: InsertMode) -> &'static str {
        match mode {
            InsertMode::Ignore => " ON CONFLICT DO NOTHING",
            InsertMode::Insert | InsertMode::Replace => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_dialect() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.name(), "postgres");
        assert!(dialect.numbered_parameters());
        assert_eq!(dialect.insert_verb(InsertMode::Replace), None);
        assert_eq!(
            dialect.insert_suffix(InsertMode::Ignore),
            " ON CONFLICT DO NOTHING"
        );
    }
}
