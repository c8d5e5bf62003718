//! WHERE and HAVING predicates.

use oxide_query_core::{Joiner, Operand, Operator, Predicate, Raw, ToSqlValue};

use super::QueryBuilderHandler;

impl QueryBuilderHandler {
    fn compare(&self, joiner: Joiner, column: &str, operator: Operator, operand: Operand) -> Predicate {
        Predicate::compare(self.field(column), operator, operand).joined(joiner)
    }

    fn push_where(mut self, predicate: Predicate) -> Self {
        self.statement.wheres.push(predicate);
        self
    }

    /// `column = value`
    #[must_use]
    pub fn where_eq(self, column: &str, value: impl Into<Operand>) -> Self {
        self.where_op(column, Operator::Eq, value)
    }

    /// `column <operator> value`
    #[must_use]
    pub fn where_op(self, column: &str, operator: Operator, value: impl Into<Operand>) -> Self {
        let predicate = self.compare(Joiner::And, column, operator, value.into());
        self.push_where(predicate)
    }

    /// Adds `column <operator> value` only when `filter` is true.
    #[must_use]
    pub fn where_if(
        self,
        filter: bool,
        column: &str,
        operator: Operator,
        value: impl Into<Operand>,
    ) -> Self {
        if filter {
            self.where_op(column, operator, value)
        } else {
            self
        }
    }

    #[must_use]
    pub fn or_where(self, column: &str, operator: Operator, value: impl Into<Operand>) -> Self {
        let predicate = self.compare(Joiner::Or, column, operator, value.into());
        self.push_where(predicate)
    }

    #[must_use]
    pub fn or_where_eq(self, column: &str, value: impl Into<Operand>) -> Self {
        self.or_where(column, Operator::Eq, value)
    }

    /// `AND NOT column <operator> value`
    #[must_use]
    pub fn where_not(self, column: &str, operator: Operator, value: impl Into<Operand>) -> Self {
        let predicate = self.compare(Joiner::AndNot, column, operator, value.into());
        self.push_where(predicate)
    }

    /// `OR NOT column <operator> value`
    #[must_use]
    pub fn or_where_not(self, column: &str, operator: Operator, value: impl Into<Operand>) -> Self {
        let predicate = self.compare(Joiner::OrNot, column, operator, value.into());
        self.push_where(predicate)
    }

    /// Compares two columns.
    #[must_use]
    pub fn where_column(self, left: &str, operator: Operator, right: &str) -> Self {
        let right = Operand::Column(self.column_prefixed(right));
        let predicate = self.compare(Joiner::And, left, operator, right);
        self.push_where(predicate)
    }

    /// `column IN (...)`. An empty list matches nothing.
    #[must_use]
    pub fn where_in<T, I>(self, column: &str, values: I) -> Self
    where
        T: ToSqlValue,
        I: IntoIterator<Item = T>,
    {
        let predicate = self.compare(Joiner::And, column, Operator::In, Operand::list(values));
        self.push_where(predicate)
    }

    #[must_use]
    pub fn or_where_in<T, I>(self, column: &str, values: I) -> Self
    where
        T: ToSqlValue,
        I: IntoIterator<Item = T>,
    {
        let predicate = self.compare(Joiner::Or, column, Operator::In, Operand::list(values));
        self.push_where(predicate)
    }

    /// `column NOT IN (...)`. An empty list is dropped.
    #[must_use]
    pub fn where_not_in<T, I>(self, column: &str, values: I) -> Self
    where
        T: ToSqlValue,
        I: IntoIterator<Item = T>,
    {
        let predicate = self.compare(Joiner::And, column, Operator::NotIn, Operand::list(values));
        self.push_where(predicate)
    }

    /// `column IN (<sub-query>)`, with a fragment from [`Self::sub_query`].
    #[must_use]
    pub fn where_in_raw(self, column: &str, sub_query: Raw) -> Self {
        let predicate = self.compare(Joiner::And, column, Operator::In, Operand::Raw(sub_query));
        self.push_where(predicate)
    }

    #[must_use]
    pub fn where_between(self, column: &str, low: impl ToSqlValue, high: impl ToSqlValue) -> Self {
        let range = Operand::List(vec![low.to_sql_value(), high.to_sql_value()]);
        let predicate = self.compare(Joiner::And, column, Operator::Between, range);
        self.push_where(predicate)
    }

    #[must_use]
    pub fn where_not_between(
        self,
        column: &str,
        low: impl ToSqlValue,
        high: impl ToSqlValue,
    ) -> Self {
        let range = Operand::List(vec![low.to_sql_value(), high.to_sql_value()]);
        let predicate = self.compare(Joiner::And, column, Operator::NotBetween, range);
        self.push_where(predicate)
    }

    #[must_use]
    pub fn where_null(self, column: &str) -> Self {
        let predicate = self.compare(Joiner::And, column, Operator::IsNull, Operand::None);
        self.push_where(predicate)
    }

    #[must_use]
    pub fn or_where_null(self, column: &str) -> Self {
        let predicate = self.compare(Joiner::Or, column, Operator::IsNull, Operand::None);
        self.push_where(predicate)
    }

    #[must_use]
    pub fn where_not_null(self, column: &str) -> Self {
        let predicate = self.compare(Joiner::And, column, Operator::IsNotNull, Operand::None);
        self.push_where(predicate)
    }

    /// Adds a raw predicate, unprefixed and unquoted.
    #[must_use]
    pub fn where_raw(self, raw: Raw) -> Self {
        self.push_where(Predicate::raw(raw))
    }

    #[must_use]
    pub fn or_where_raw(self, raw: Raw) -> Self {
        self.push_where(Predicate::raw(raw).joined(Joiner::Or))
    }

    /// Adds a parenthesized group built by `f` on a scratch handler.
    ///
    /// ```ignore
    /// db.table("users")
    ///     .where_eq("active", true)
    ///     .where_group(|q| q.where_eq("role", "admin").or_where_eq("role", "owner"));
    /// ```
    #[must_use]
    pub fn where_group<F>(self, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        self.group(Joiner::And, f)
    }

    #[must_use]
    pub fn or_where_group<F>(self, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        self.group(Joiner::Or, f)
    }

    #[must_use]
    pub fn where_not_group<F>(self, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        self.group(Joiner::AndNot, f)
    }

    fn group<F>(self, joiner: Joiner, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        let scratch = f(self.new_query());
        let predicate = Predicate::group(scratch.statement.wheres).joined(joiner);
        self.push_where(predicate)
    }

    /// `HAVING column <operator> value`
    #[must_use]
    pub fn having(mut self, column: &str, operator: Operator, value: impl Into<Operand>) -> Self {
        let predicate = self.compare(Joiner::And, column, operator, value.into());
        self.statement.havings.push(predicate);
        self
    }

    #[must_use]
    pub fn or_having(mut self, column: &str, operator: Operator, value: impl Into<Operand>) -> Self {
        let predicate = self.compare(Joiner::Or, column, operator, value.into());
        self.statement.havings.push(predicate);
        self
    }

    #[must_use]
    pub fn having_raw(mut self, raw: Raw) -> Self {
        self.statement.havings.push(Predicate::raw(raw));
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::handler::QueryBuilderHandler;
    use crate::test_support::database;
    use oxide_query_core::{CompileKind, Operator, Raw};

    fn sql(handler: &QueryBuilderHandler) -> String {
        handler.get_query(CompileKind::Select).unwrap().sql().to_string()
    }

    #[tokio::test]
    async fn test_two_argument_where_defaults_to_equality() {
        let db = database().await;
        let query = db.table("users").where_eq("name", "Ann");
        assert_eq!(sql(&query), r#"SELECT * FROM "users" WHERE "name" = ?"#);
    }

    #[tokio::test]
    async fn test_where_if_false_is_a_noop() {
        let db = database().await;
        let query = db
            .table("users")
            .where_if(false, "name", Operator::Eq, "Ann")
            .where_if(true, "age", Operator::Gt, 3);
        assert_eq!(sql(&query), r#"SELECT * FROM "users" WHERE "age" > ?"#);
    }

    #[tokio::test]
    async fn test_in_lists() {
        let db = database().await;
        let query = db
            .table("users")
            .where_in("id", Vec::<i64>::new())
            .where_not_in("id", Vec::<i64>::new());
        assert_eq!(sql(&query), r#"SELECT * FROM "users" WHERE 1 = 2"#);

        let query = db.table("users").where_not_in("id", [1, 2]);
        assert_eq!(sql(&query), r#"SELECT * FROM "users" WHERE "id" NOT IN (?, ?)"#);
    }

    #[tokio::test]
    async fn test_groups_and_negation() {
        let db = database().await;
        let query = db
            .table("users")
            .where_eq("active", true)
            .where_group(|q| q.where_eq("role", "admin").or_where_eq("role", "owner"))
            .or_where_not("age", Operator::Lt, 18)
            .where_raw(Raw::new("length(name) > ?").bind(2));
        assert_eq!(
            sql(&query),
            r#"SELECT * FROM "users" WHERE "active" = ? AND ("role" = ? OR "role" = ?) OR NOT "age" < ? AND length(name) > ?"#
        );
    }

    #[tokio::test]
    async fn test_prefix_rule() {
        let db = database().await;
        let query = db
            .table("users")
            .prefix("app_")
            .from("posts")
            .select(&["id", "posts.title"])
            .where_column("posts.user_id", Operator::Eq, "users.id");
        assert_eq!(
            sql(&query),
            r#"SELECT "id", "app_posts"."title" FROM "users", "app_posts" WHERE "app_posts"."user_id" = "app_users"."id""#
        );
    }

    #[tokio::test]
    async fn test_between_and_null() {
        let db = database().await;
        let query = db
            .table("users")
            .where_between("age", 18, 65)
            .where_null("deleted_at")
            .where_not_null("email");
        assert_eq!(
            sql(&query),
            r#"SELECT * FROM "users" WHERE "age" BETWEEN ? AND ? AND "deleted_at" IS NULL AND "email" IS NOT NULL"#
        );
    }
}
