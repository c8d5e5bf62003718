//! Statement compilation.
//!
//! [`Adapter`] is the contract the query handler compiles through. The
//! handler never inspects a dialect itself; it hands over a [`Statement`], a
//! [`CompileKind`] and, for writes, a [`Record`].
//!
//! [`Compiler`] is the stock adapter. It renders portable SQL with `?`
//! placeholders and lets the [`Dialect`] decide quoting, insert verbs and
//! upsert syntax. Placeholders are renumbered at the very end for dialects
//! that want `$n`.

use std::fmt;

use crate::dialect::{Dialect, InsertMode, UpsertStyle};
use crate::error::CompileError;
use crate::query::{PlaceholderStyle, Query};
use crate::raw::Raw;
use crate::statement::{
    Condition, Direction, Field, Operand, Operator, Predicate, Record, Statement, TableRef,
};
use crate::value::SqlValue;

/// The closed set of things a statement can be compiled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileKind {
    Select,
    Insert,
    InsertIgnore,
    Replace,
    Upsert,
    Update,
    Delete,
    /// Only the WHERE predicates, without the `WHERE` keyword.
    CriteriaOnly,
}

impl CompileKind {
    const fn insert_mode(self) -> Option<InsertMode> {
        match self {
            Self::Insert | Self::Upsert => Some(InsertMode::Insert),
            Self::InsertIgnore => Some(InsertMode::Ignore),
            Self::Replace => Some(InsertMode::Replace),
            _ => None,
        }
    }
}

impl fmt::Display for CompileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::InsertIgnore => "insert ignore",
            Self::Replace => "replace",
            Self::Upsert => "upsert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::CriteriaOnly => "criteria",
        })
    }
}

/// Compiles statements for one database.
pub trait Adapter: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns how placeholders are spelled in final SQL.
    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Quotes a possibly qualified identifier.
    fn quote_identifier(&self, name: &str) -> String;

    /// Compiles into portable form (`?` placeholders), for embedding into
    /// another statement.
    fn compile_fragment(
        &self,
        kind: CompileKind,
        statement: &Statement,
        data: Option<&Record>,
    ) -> Result<Raw, CompileError>;

    /// Compiles into a final, executable query.
    fn compile(
        &self,
        kind: CompileKind,
        statement: &Statement,
        data: Option<&Record>,
    ) -> Result<Query, CompileError> {
        let (sql, bindings) = self.compile_fragment(kind, statement, data)?.into_parts();
        Ok(Query::from_portable(sql, bindings, self.placeholder_style()))
    }
}

/// The default [`Adapter`], parameterized by dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct Compiler<D> {
    dialect: D,
}

impl<D: Dialect> Compiler<D> {
    /// Creates a compiler for a dialect.
    #[must_use]
    pub const fn new(dialect: D) -> Self {
        Self { dialect }
    }

    /// Returns the dialect.
    #[must_use]
    pub const fn dialect(&self) -> &D {
        &self.dialect
    }

    fn select(&self, statement: &Statement) -> Result<Sql<'_, D>, CompileError> {
        if statement.tables.is_empty() {
            return Err(CompileError::MissingTable(CompileKind::Select));
        }
        let mut sql = Sql::new(&self.dialect);
        sql.push("SELECT ");
        if statement.distinct {
            sql.push("DISTINCT ");
        }
        if statement.selects.is_empty() {
            sql.push("*");
        } else {
            sql.fields(&statement.selects);
        }
        sql.push(" FROM ");
        for (i, table) in statement.tables.iter().enumerate() {
            if i > 0 {
                sql.push(", ");
            }
            sql.table(table);
        }
        for join in &statement.joins {
            sql.push(" ");
            sql.push(join.kind.as_sql());
            sql.push(" ");
            sql.table(&join.table);
            let on = sql.criteria(&join.on)?;
            if !on.is_empty() {
                sql.push(" ON ");
                sql.append(on);
            }
        }
        sql.clause(" WHERE ", &statement.wheres)?;
        if !statement.group_bys.is_empty() {
            sql.push(" GROUP BY ");
            sql.fields(&statement.group_bys);
        }
        sql.clause(" HAVING ", &statement.havings)?;
        sql.order_by(statement);
        sql.limit_offset(statement.limit, statement.offset);
        Ok(sql)
    }

    fn insert(
        &self,
        kind: CompileKind,
        statement: &Statement,
        data: Option<&Record>,
    ) -> Result<Sql<'_, D>, CompileError> {
        let mode = kind.insert_mode().unwrap_or(InsertMode::Insert);
        let verb = self
            .dialect
            .insert_verb(mode)
            .ok_or(CompileError::Unsupported {
                kind,
                dialect: self.dialect.name(),
            })?;
        let table = statement
            .tables
            .first()
            .ok_or(CompileError::MissingTable(kind))?;
        let data = data
            .filter(|d| !d.is_empty())
            .ok_or(CompileError::MissingPayload(kind))?;

        let mut sql = Sql::new(&self.dialect);
        sql.push(verb);
        sql.push(" ");
        sql.table(table);
        sql.push(" (");
        for (i, column) in data.columns().enumerate() {
            if i > 0 {
                sql.push(", ");
            }
            sql.ident(column);
        }
        sql.push(") VALUES (");
        for (i, (column, value)) in data.iter().enumerate() {
            if i > 0 {
                sql.push(", ");
            }
            sql.value(column, value)?;
        }
        sql.push(")");
        sql.push(self.dialect.insert_suffix(mode));

        if kind == CompileKind::Upsert {
            let upsert = statement
                .upsert
                .as_ref()
                .filter(|u| !u.update.is_empty())
                .ok_or(CompileError::MissingUpsert)?;
            match self.dialect.upsert_style() {
                UpsertStyle::OnDuplicateKey => sql.push(" ON DUPLICATE KEY UPDATE "),
                UpsertStyle::OnConflict => {
                    if upsert.conflict.is_empty() {
                        return Err(CompileError::MissingConflictTarget(self.dialect.name()));
                    }
                    sql.push(" ON CONFLICT (");
                    for (i, column) in upsert.conflict.iter().enumerate() {
                        if i > 0 {
                            sql.push(", ");
                        }
                        sql.ident(column);
                    }
                    sql.push(") DO UPDATE SET ");
                }
            }
            sql.assignments(&upsert.update)?;
        }
        Ok(sql)
    }

    fn update(&self, statement: &Statement, data: Option<&Record>) -> Result<Sql<'_, D>, CompileError> {
        let table = statement
            .tables
            .first()
            .ok_or(CompileError::MissingTable(CompileKind::Update))?;
        let data = data
            .filter(|d| !d.is_empty())
            .ok_or(CompileError::MissingPayload(CompileKind::Update))?;

        let mut sql = Sql::new(&self.dialect);
        sql.push("UPDATE ");
        sql.table(table);
        sql.push(" SET ");
        sql.assignments(data)?;
        sql.clause(" WHERE ", &statement.wheres)?;
        if self.dialect.supports_limit_on_write() {
            sql.order_by(statement);
            sql.limit_offset(statement.limit, None);
        }
        Ok(sql)
    }

    fn delete(&self, statement: &Statement) -> Result<Sql<'_, D>, CompileError> {
        let table = statement
            .tables
            .first()
            .ok_or(CompileError::MissingTable(CompileKind::Delete))?;

        let mut sql = Sql::new(&self.dialect);
        sql.push("DELETE FROM ");
        sql.table(table);
        sql.clause(" WHERE ", &statement.wheres)?;
        if self.dialect.supports_limit_on_write() {
            sql.order_by(statement);
            sql.limit_offset(statement.limit, None);
        }
        Ok(sql)
    }
}

impl<D: Dialect> Adapter for Compiler<D> {
    fn name(&self) -> &'static str {
        self.dialect.name()
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        if self.dialect.numbered_parameters() {
            PlaceholderStyle::Numbered
        } else {
            PlaceholderStyle::Question
        }
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_path(&self.dialect, name)
    }

    fn compile_fragment(
        &self,
        kind: CompileKind,
        statement: &Statement,
        data: Option<&Record>,
    ) -> Result<Raw, CompileError> {
        let sql = match kind {
            CompileKind::Select => self.select(statement)?,
            CompileKind::Insert
            | CompileKind::InsertIgnore
            | CompileKind::Replace
            | CompileKind::Upsert => self.insert(kind, statement, data)?,
            CompileKind::Update => self.update(statement, data)?,
            CompileKind::Delete => self.delete(statement)?,
            CompileKind::CriteriaOnly => {
                let mut sql = Sql::new(&self.dialect);
                let criteria = sql.criteria(&statement.wheres)?;
                sql.append(criteria);
                sql
            }
        };
        Ok(sql.finish())
    }
}

/// Quotes `schema.table.column` part by part, keeping `*` bare and quoting
/// an `AS` alias separately. Names containing parentheses or already starting
/// with the quote character are passed through.
fn quote_path<D: Dialect + ?Sized>(dialect: &D, name: &str) -> String {
    let name = name.trim();
    if name.contains('(') || name.starts_with(dialect.identifier_quote()) {
        return name.to_string();
    }
    if let Some(at) = name.to_ascii_uppercase().find(" AS ") {
        let (expr, alias) = (&name[..at], &name[at + 4..]);
        return format!(
            "{} AS {}",
            quote_path(dialect, expr),
            dialect.quote_identifier(alias.trim())
        );
    }
    name.split('.')
        .map(|part| {
            if part == "*" {
                part.to_string()
            } else {
                dialect.quote_identifier(part)
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// SQL text under construction plus the bindings it references.
struct Sql<'d, D> {
    dialect: &'d D,
    text: String,
    bindings: Vec<SqlValue>,
}

impl<'d, D: Dialect> Sql<'d, D> {
    const fn new(dialect: &'d D) -> Self {
        Self {
            dialect,
            text: String::new(),
            bindings: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn push(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn append(&mut self, other: Self) {
        self.text.push_str(&other.text);
        self.bindings.extend(other.bindings);
    }

    fn bind(&mut self, value: SqlValue) {
        self.text.push('?');
        self.bindings.push(value);
    }

    fn raw(&mut self, raw: &Raw) {
        self.text.push_str(raw.sql());
        self.bindings.extend_from_slice(raw.bindings());
    }

    fn ident(&mut self, name: &str) {
        let quoted = quote_path(self.dialect, name);
        self.text.push_str(&quoted);
    }

    fn table(&mut self, table: &TableRef) {
        match table {
            TableRef::Name(name) => self.ident(name),
            TableRef::Raw(raw) => self.raw(raw),
        }
    }

    fn field(&mut self, field: &Field) {
        match field {
            Field::Column(name) => self.ident(name),
            Field::Raw(raw) => self.raw(raw),
        }
    }

    fn fields(&mut self, fields: &[Field]) {
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.field(field);
        }
    }

    fn value(&mut self, column: &str, value: &Operand) -> Result<(), CompileError> {
        match value {
            Operand::Value(v) => self.bind(v.clone()),
            Operand::Raw(raw) => self.raw(raw),
            Operand::Column(name) => self.ident(name),
            Operand::None | Operand::List(_) => {
                return Err(CompileError::InvalidValue(column.to_string()))
            }
        }
        Ok(())
    }

    fn assignments(&mut self, record: &Record) -> Result<(), CompileError> {
        for (i, (column, value)) in record.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.ident(column);
            self.push(" = ");
            self.value(column, value)?;
        }
        Ok(())
    }

    fn clause(&mut self, keyword: &str, predicates: &[Predicate]) -> Result<(), CompileError> {
        let criteria = self.criteria(predicates)?;
        if !criteria.is_empty() {
            self.push(keyword);
            self.append(criteria);
        }
        Ok(())
    }

    fn order_by(&mut self, statement: &Statement) {
        if statement.order_bys.is_empty() {
            return;
        }
        self.push(" ORDER BY ");
        for (i, ordering) in statement.order_bys.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.field(&ordering.field);
            self.push(match ordering.direction {
                Direction::Asc => " ASC",
                Direction::Desc => " DESC",
            });
        }
    }

    fn limit_offset(&mut self, limit: Option<u64>, offset: Option<u64>) {
        match (limit, offset) {
            (Some(limit), _) => self.push(&format!(" LIMIT {limit}")),
            (None, Some(_)) => {
                if let Some(unbounded) = self.dialect.unbounded_limit() {
                    self.push(&format!(" LIMIT {unbounded}"));
                }
            }
            (None, None) => {}
        }
        if let Some(offset) = offset {
            self.push(&format!(" OFFSET {offset}"));
        }
    }

    /// Renders a predicate list. Predicates that compile to nothing (empty
    /// groups, empty NOT IN) are dropped together with their connective.
    fn criteria(&self, predicates: &[Predicate]) -> Result<Self, CompileError> {
        let mut out = Self::new(self.dialect);
        for predicate in predicates {
            let Some(part) = self.condition(&predicate.condition)? else {
                continue;
            };
            if !out.is_empty() {
                out.push(" ");
                out.push(predicate.joiner.connective());
                out.push(" ");
            }
            if predicate.joiner.is_negated() {
                out.push("NOT ");
            }
            out.append(part);
        }
        Ok(out)
    }

    fn condition(&self, condition: &Condition) -> Result<Option<Self>, CompileError> {
        let mut out = Self::new(self.dialect);
        match condition {
            Condition::Raw(raw) => out.raw(raw),
            Condition::Group(predicates) => {
                let inner = self.criteria(predicates)?;
                if inner.is_empty() {
                    return Ok(None);
                }
                out.push("(");
                out.append(inner);
                out.push(")");
            }
            Condition::Compare {
                key,
                operator,
                operand,
            } => {
                if !out.comparison(key, *operator, operand)? {
                    return Ok(None);
                }
            }
        }
        Ok(Some(out))
    }

    /// Writes one comparison, returning false when it should be omitted.
    fn comparison(
        &mut self,
        key: &Field,
        operator: Operator,
        operand: &Operand,
    ) -> Result<bool, CompileError> {
        match operator {
            Operator::IsNull | Operator::IsNotNull => {
                self.field(key);
                self.push(" ");
                self.push(operator.as_sql());
            }
            Operator::In | Operator::NotIn => {
                let values = match operand {
                    Operand::List(values) => values.clone(),
                    Operand::Value(value) => vec![value.clone()],
                    Operand::Raw(raw) => {
                        self.field(key);
                        self.push(" ");
                        self.push(operator.as_sql());
                        self.push(" (");
                        self.raw(raw);
                        self.push(")");
                        return Ok(true);
                    }
                    Operand::None | Operand::Column(_) => {
                        return Err(CompileError::InvalidOperand {
                            operator,
                            reason: "expects a list of values or a sub-query",
                        })
                    }
                };
                if values.is_empty() {
                    if operator == Operator::NotIn {
                        return Ok(false);
                    }
                    self.push("1 = 2");
                    return Ok(true);
                }
                self.field(key);
                self.push(" ");
                self.push(operator.as_sql());
                self.push(" (");
                for (i, value) in values.into_iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.bind(value);
                }
                self.push(")");
            }
            Operator::Between | Operator::NotBetween => {
                let Operand::List(values) = operand else {
                    return Err(CompileError::InvalidOperand {
                        operator,
                        reason: "expects exactly two values",
                    });
                };
                let [low, high] = values.as_slice() else {
                    return Err(CompileError::InvalidOperand {
                        operator,
                        reason: "expects exactly two values",
                    });
                };
                self.field(key);
                self.push(" ");
                self.push(operator.as_sql());
                self.push(" ");
                self.bind(low.clone());
                self.push(" AND ");
                self.bind(high.clone());
            }
            _ => {
                self.field(key);
                match operand {
                    Operand::Value(SqlValue::Null) if operator == Operator::Eq => {
                        self.push(" IS NULL");
                    }
                    Operand::Value(SqlValue::Null) if operator == Operator::NotEq => {
                        self.push(" IS NOT NULL");
                    }
                    Operand::Value(value) => {
                        self.push(" ");
                        self.push(operator.as_sql());
                        self.push(" ");
                        self.bind(value.clone());
                    }
                    Operand::Column(column) => {
                        self.push(" ");
                        self.push(operator.as_sql());
                        self.push(" ");
                        self.ident(column);
                    }
                    Operand::Raw(raw) => {
                        self.push(" ");
                        self.push(operator.as_sql());
                        self.push(" ");
                        self.raw(raw);
                    }
                    Operand::None | Operand::List(_) => {
                        return Err(CompileError::InvalidOperand {
                            operator,
                            reason: "expects a single value",
                        })
                    }
                }
            }
        }
        Ok(true)
    }

    fn finish(self) -> Raw {
        Raw::with_bindings(self.text, self.bindings)
    }
}
