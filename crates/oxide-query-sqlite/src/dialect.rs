//! SQLite dialect implementation.

use oxide_query_core::{Dialect, InsertMode};

/// SQLite dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn insert_verb(&self, mode: InsertMode) -> Option<&'static str> {
        Some(match mode {
            InsertMode::Insert => "INSERT INTO",
            InsertMode::Ignore => "INSERT OR IGNORE INTO",
            InsertMode::Replace => "REPLACE INTO",
        })
    }

    fn unbounded_limit(&self) -> Option<&'static str> {
        Some("-1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_query_core::{
        Adapter, CompileKind, Compiler, Record, Statement, UpsertStyle, Upsert,
    };

    fn users() -> Statement {
        let mut statement = Statement::new();
        statement.tables.push("users".into());
        statement
    }

    #[test]
    fn test_sqlite_dialect() {
        let dialect = SqliteDialect::new();
        assert_eq!(dialect.name(), "sqlite");
        assert_eq!(dialect.identifier_quote(), '"');
        assert!(!dialect.numbered_parameters());
        assert_eq!(dialect.upsert_style(), UpsertStyle::OnConflict);
    }

    #[test]
    fn test_replace_into() {
        let record = Record::new().set("id", 1).set("name", "Ann");
        let query = Compiler::new(SqliteDialect::new())
            .compile(CompileKind::Replace, &users(), Some(&record))
            .unwrap();
        assert_eq!(
            query.sql(),
            r#"REPLACE INTO "users" ("id", "name") VALUES (?, ?)"#
        );
    }

    #[test]
    fn test_upsert_on_conflict() {
        let record = Record::new().set("id", 1).set("name", "Ann");
        let mut statement = users();
        statement.upsert = Some(Upsert {
            conflict: vec![String::from("id")],
            update: Record::new().set("name", "Ann"),
        });
        let query = Compiler::new(SqliteDialect::new())
            .compile(CompileKind::Upsert, &statement, Some(&record))
            .unwrap();
        assert_eq!(
            query.sql(),
            r#"INSERT INTO "users" ("id", "name") VALUES (?, ?) ON CONFLICT ("id") DO UPDATE SET "name" = ?"#
        );
    }

    #[test]
    fn test_offset_only_uses_unbounded_limit() {
        let mut statement = users();
        statement.offset = Some(20);
        let query = Compiler::new(SqliteDialect::new())
            .compile(CompileKind::Select, &statement, None)
            .unwrap();
        assert_eq!(query.sql(), r#"SELECT * FROM "users" LIMIT -1 OFFSET 20"#);
    }
}
