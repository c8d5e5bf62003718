mod common;

use common::{compile, statement, with_where};
use oxide_query_core::{
    Adapter, CompileKind, Compiler, Field, GenericDialect, MySqlDialect, Operand, Operator,
    PostgresDialect, Predicate, Raw, Record, SqlValue, TableRef,
};

#[test]
fn test_raw_sub_query_as_table_is_renumbered() {
    let inner = with_where(statement("orders"), "status", "paid");
    let compiler = Compiler::new(PostgresDialect::new());
    let fragment = compiler
        .compile_fragment(CompileKind::Select, &inner, None)
        .unwrap();
    let (sql, bindings) = fragment.into_parts();

    let mut outer = statement("unused");
    outer.tables = vec![TableRef::Raw(Raw::with_bindings(format!("({sql}) AS o"), bindings))];
    outer
        .wheres
        .push(Predicate::compare("o.total", Operator::Gt, 100));

    let query = compile(PostgresDialect::new(), CompileKind::Select, &outer, None);
    assert_eq!(
        query.sql(),
        r#"SELECT * FROM (SELECT * FROM "orders" WHERE "status" = $1) AS o WHERE "o"."total" > $2"#
    );
    assert_eq!(
        query.bindings(),
        &[SqlValue::Text(String::from("paid")), SqlValue::Int(100)]
    );
}

#[test]
fn test_in_with_sub_query_operand() {
    let mut outer = statement("users");
    outer.wheres.push(Predicate::compare(
        "id",
        Operator::In,
        Raw::new("SELECT user_id FROM bans WHERE reason = ?").bind("spam"),
    ));
    let query = compile(GenericDialect::new(), CompileKind::Select, &outer, None);
    assert_eq!(
        query.sql(),
        r#"SELECT * FROM "users" WHERE "id" IN (SELECT user_id FROM bans WHERE reason = ?)"#
    );
    assert_eq!(query.raw_sql().matches("'spam'").count(), 1);
}

#[test]
fn test_raw_projection_carries_bindings() {
    let mut select = statement("products");
    select.selects = vec![
        Field::from("name"),
        Field::Raw(Raw::new("price * ? AS taxed").bind(1.2)),
    ];
    let query = compile(MySqlDialect::new(), CompileKind::Select, &select, None);
    assert_eq!(query.sql(), "SELECT `name`, price * ? AS taxed FROM `products`");
    assert_eq!(query.raw_sql(), "SELECT `name`, price * 1.2 AS taxed FROM `products`");
}

#[test]
fn test_insert_ignore_per_dialect() {
    let record = Record::new().set("email", "a@example.com");
    let table = statement("subscribers");

    let mysql = compile(MySqlDialect::new(), CompileKind::InsertIgnore, &table, Some(&record));
    assert_eq!(
        mysql.sql(),
        "INSERT IGNORE INTO `subscribers` (`email`) VALUES (?)"
    );

    let postgres = compile(
        PostgresDialect::new(),
        CompileKind::InsertIgnore,
        &table,
        Some(&record),
    );
    assert_eq!(
        postgres.sql(),
        r#"INSERT INTO "subscribers" ("email") VALUES ($1) ON CONFLICT DO NOTHING"#
    );
}

#[test]
fn test_null_equality_becomes_is_null() {
    let select = with_where(statement("users"), "deleted_at", Operand::Value(SqlValue::Null));
    let query = compile(GenericDialect::new(), CompileKind::Select, &select, None);
    assert_eq!(query.sql(), r#"SELECT * FROM "users" WHERE "deleted_at" IS NULL"#);
    assert!(query.bindings().is_empty());
}

#[test]
fn test_missing_table_is_reported() {
    let err = Compiler::new(GenericDialect::new())
        .compile(CompileKind::Delete, &oxide_query_core::Statement::new(), None)
        .unwrap_err();
    assert_eq!(err.to_string(), "cannot compile delete without a table");
}
