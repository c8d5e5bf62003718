//! The statement model.
//!
//! A [`Statement`] holds one typed field per clause kind. List clauses keep
//! insertion order; `limit`, `offset` and `distinct` are scalars where the
//! last write wins. Nothing here knows how to render SQL: that is the job of
//! an [`Adapter`](crate::Adapter).

use std::fmt;
use std::str::FromStr;

use crate::raw::Raw;
use crate::value::{SqlValue, ToSqlValue};

/// A table reference in FROM or JOIN position.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    /// A table name, optionally `name AS alias`.
    Name(String),
    /// A raw fragment, typically an aliased sub-query.
    Raw(Raw),
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        Self::Name(String::from(name))
    }
}

impl From<String> for TableRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Raw> for TableRef {
    fn from(raw: Raw) -> Self {
        Self::Raw(raw)
    }
}

/// A column reference in projection, grouping or ordering position.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// A column, `table.column`, `column AS alias` or `*`.
    Column(String),
    /// A raw fragment.
    Raw(Raw),
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Self::Column(String::from(name))
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Self::Column(name)
    }
}

impl From<Raw> for Field {
    fn from(raw: Raw) -> Self {
        Self::Raw(raw)
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `IN (...)`
    In,
    /// `NOT IN (...)`
    NotIn,
    /// `BETWEEN ? AND ?`
    Between,
    /// `NOT BETWEEN ? AND ?`
    NotBetween,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
}

impl Operator {
    /// Returns the SQL keyword or symbol.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Between => "BETWEEN",
            Self::NotBetween => "NOT BETWEEN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim().to_ascii_uppercase().as_str() {
            "=" | "==" => Self::Eq,
            "<>" | "!=" => Self::NotEq,
            "<" => Self::Lt,
            "<=" => Self::Lte,
            ">" => Self::Gt,
            ">=" => Self::Gte,
            "LIKE" => Self::Like,
            "NOT LIKE" => Self::NotLike,
            "IN" => Self::In,
            "NOT IN" => Self::NotIn,
            "BETWEEN" => Self::Between,
            "NOT BETWEEN" => Self::NotBetween,
            "IS NULL" => Self::IsNull,
            "IS NOT NULL" => Self::IsNotNull,
            other => return Err(format!("unknown operator: {other}")),
        };
        Ok(op)
    }
}

/// How a predicate attaches to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Joiner {
    #[default]
    And,
    Or,
    AndNot,
    OrNot,
}

impl Joiner {
    /// The connective placed before a non-leading predicate.
    #[must_use]
    pub const fn connective(self) -> &'static str {
        match self {
            Self::And | Self::AndNot => "AND",
            Self::Or | Self::OrNot => "OR",
        }
    }

    /// Whether the predicate is negated.
    #[must_use]
    pub const fn is_negated(self) -> bool {
        matches!(self, Self::AndNot | Self::OrNot)
    }
}

/// The right-hand side of a predicate, or a value in a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand, for `IS NULL` / `IS NOT NULL`.
    None,
    /// A single bound value.
    Value(SqlValue),
    /// A list of bound values, for `IN` and `BETWEEN`.
    List(Vec<SqlValue>),
    /// Another column, for join conditions.
    Column(String),
    /// A raw fragment, including sub-queries.
    Raw(Raw),
}

impl Operand {
    /// Builds a list operand.
    pub fn list<T, I>(values: I) -> Self
    where
        T: ToSqlValue,
        I: IntoIterator<Item = T>,
    {
        Self::List(values.into_iter().map(ToSqlValue::to_sql_value).collect())
    }
}

impl<T: ToSqlValue> From<T> for Operand {
    fn from(value: T) -> Self {
        Self::Value(value.to_sql_value())
    }
}

impl From<Raw> for Operand {
    fn from(raw: Raw) -> Self {
        Self::Raw(raw)
    }
}

/// What a predicate tests.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `key operator operand`
    Compare {
        key: Field,
        operator: Operator,
        operand: Operand,
    },
    /// A raw boolean fragment.
    Raw(Raw),
    /// A parenthesized group of predicates.
    Group(Vec<Predicate>),
}

/// One entry of a WHERE, HAVING or ON list.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub joiner: Joiner,
    pub condition: Condition,
}

impl Predicate {
    /// Creates an AND-joined comparison.
    pub fn compare(key: impl Into<Field>, operator: Operator, operand: impl Into<Operand>) -> Self {
        Self {
            joiner: Joiner::And,
            condition: Condition::Compare {
                key: key.into(),
                operator,
                operand: operand.into(),
            },
        }
    }

    /// Creates an AND-joined raw predicate.
    #[must_use]
    pub const fn raw(raw: Raw) -> Self {
        Self {
            joiner: Joiner::And,
            condition: Condition::Raw(raw),
        }
    }

    /// Creates an AND-joined group.
    #[must_use]
    pub const fn group(predicates: Vec<Self>) -> Self {
        Self {
            joiner: Joiner::And,
            condition: Condition::Group(predicates),
        }
    }

    /// Replaces the joiner.
    #[must_use]
    pub const fn joined(mut self, joiner: Joiner) -> Self {
        self.joiner = joiner;
        self
    }
}

/// Join types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
        }
    }
}

/// A join entry with its ON conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: Vec<Predicate>,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// An ORDER BY entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub field: Field,
    pub direction: Direction,
}

/// An ordered column/value map used as an insert or update payload.
///
/// Setting an existing column replaces its value in place, so column order is
/// the order of first assignment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    entries: Vec<(String, Operand)>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Sets a column value, returning the record.
    #[must_use]
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Operand>) -> Self {
        self.insert(column, value);
        self
    }

    /// Sets a column value in place.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Operand>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    /// Returns the value assigned to a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Operand> {
        self.entries
            .iter()
            .find_map(|(c, v)| (c == column).then_some(v))
    }

    /// Iterates over `(column, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Operand)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Returns the column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Operand>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

/// Upsert payload: conflict target plus the columns to overwrite.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Upsert {
    /// Conflict target columns. Required by `ON CONFLICT` dialects.
    pub conflict: Vec<String>,
    /// Assignments applied when the row already exists.
    pub update: Record,
}

/// A statement under construction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    pub tables: Vec<TableRef>,
    pub selects: Vec<Field>,
    pub wheres: Vec<Predicate>,
    pub joins: Vec<Join>,
    pub group_bys: Vec<Field>,
    pub order_bys: Vec<Ordering>,
    pub havings: Vec<Predicate>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub distinct: bool,
    pub upsert: Option<Upsert>,
}

impl Statement {
    /// Creates an empty statement.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether GROUP BY or HAVING entries are present.
    #[must_use]
    pub fn is_grouped(&self) -> bool {
        !self.group_bys.is_empty() || !self.havings.is_empty()
    }

    /// Whether the projection is empty or a lone `*`.
    #[must_use]
    pub fn selects_everything(&self) -> bool {
        match self.selects.as_slice() {
            [] => true,
            [Field::Column(c)] => c == "*",
            _ => false,
        }
    }
}
