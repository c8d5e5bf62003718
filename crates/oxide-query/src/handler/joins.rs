//! Joins.

use oxide_query_core::{Join, JoinKind, Joiner, Operand, Operator, Predicate, Raw, TableRef};

use super::{prefix_column, QueryBuilderHandler};

/// Collects the ON conditions of one join.
///
/// Column names follow the parent handler's prefix rule.
#[derive(Debug, Clone, Default)]
pub struct JoinBuilder {
    prefix: Option<String>,
    on: Vec<Predicate>,
}

impl JoinBuilder {
    fn new(prefix: Option<String>) -> Self {
        Self {
            prefix,
            on: Vec::new(),
        }
    }

    fn column(&self, name: &str) -> String {
        prefix_column(self.prefix.as_deref(), name)
    }

    fn push(mut self, joiner: Joiner, left: &str, operator: Operator, right: Operand) -> Self {
        let left = self.column(left);
        self.on
            .push(Predicate::compare(left, operator, right).joined(joiner));
        self
    }

    /// `left <operator> right`, both columns.
    #[must_use]
    pub fn on(self, left: &str, operator: Operator, right: &str) -> Self {
        let right = Operand::Column(self.column(right));
        self.push(Joiner::And, left, operator, right)
    }

    #[must_use]
    pub fn or_on(self, left: &str, operator: Operator, right: &str) -> Self {
        let right = Operand::Column(self.column(right));
        self.push(Joiner::Or, left, operator, right)
    }

    /// `column <operator> ?`, binding a value.
    #[must_use]
    pub fn on_value(self, column: &str, operator: Operator, value: impl Into<Operand>) -> Self {
        self.push(Joiner::And, column, operator, value.into())
    }

    #[must_use]
    pub fn on_raw(mut self, raw: Raw) -> Self {
        self.on.push(Predicate::raw(raw));
        self
    }
}

impl QueryBuilderHandler {
    /// Adds a join whose ON conditions are built by `f`.
    ///
    /// ```ignore
    /// db.table("users")
    ///     .join("posts", |j| j.on("posts.user_id", Operator::Eq, "users.id"));
    /// ```
    #[must_use]
    pub fn join<F>(self, table: &str, f: F) -> Self
    where
        F: FnOnce(JoinBuilder) -> JoinBuilder,
    {
        self.add_join(JoinKind::Inner, table, f)
    }

    #[must_use]
    pub fn left_join<F>(self, table: &str, f: F) -> Self
    where
        F: FnOnce(JoinBuilder) -> JoinBuilder,
    {
        self.add_join(JoinKind::Left, table, f)
    }

    #[must_use]
    pub fn right_join<F>(self, table: &str, f: F) -> Self
    where
        F: FnOnce(JoinBuilder) -> JoinBuilder,
    {
        self.add_join(JoinKind::Right, table, f)
    }

    /// Joins a raw table expression such as an aliased sub-query.
    #[must_use]
    pub fn join_raw<F>(mut self, kind: JoinKind, table: Raw, f: F) -> Self
    where
        F: FnOnce(JoinBuilder) -> JoinBuilder,
    {
        let on = f(JoinBuilder::new(self.prefix.clone())).on;
        self.statement.joins.push(Join {
            kind,
            table: TableRef::Raw(table),
            on,
        });
        self
    }

    fn add_join<F>(mut self, kind: JoinKind, table: &str, f: F) -> Self
    where
        F: FnOnce(JoinBuilder) -> JoinBuilder,
    {
        let on = f(JoinBuilder::new(self.prefix.clone())).on;
        let table = TableRef::Name(self.table_prefixed(table));
        self.statement.joins.push(Join { kind, table, on });
        self
    }
}
