#![allow(dead_code)]

use oxide_query_core::{
    Adapter, CompileKind, Compiler, Dialect, Operand, Operator, Predicate, Query, Record,
    Statement,
};

pub fn statement(table: &str) -> Statement {
    let mut statement = Statement::new();
    statement.tables.push(table.into());
    statement
}

pub fn with_where(mut statement: Statement, column: &str, value: impl Into<Operand>) -> Statement {
    statement
        .wheres
        .push(Predicate::compare(column, Operator::Eq, value));
    statement
}

pub fn compile<D: Dialect>(
    dialect: D,
    kind: CompileKind,
    statement: &Statement,
    data: Option<&Record>,
) -> Query {
    Compiler::new(dialect)
        .compile(kind, statement, data)
        .unwrap_or_else(|e| panic!("Failed to compile {kind}: {e}"))
}
