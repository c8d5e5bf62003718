//! Raw SQL fragments.

use crate::value::{SqlValue, ToSqlValue};

/// An opaque SQL fragment carrying its own bindings.
///
/// Placeholders inside a fragment are always written as `?`. Dialects with
/// numbered parameters renumber them after compilation, so a fragment can be
/// reused across dialects unchanged.
///
/// ```rust
/// use oxide_query_core::Raw;
///
/// let raw = Raw::new("price * ? > ?").bind(2).bind(100);
/// assert_eq!(raw.sql(), "price * ? > ?");
/// assert_eq!(raw.bindings().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Raw {
    sql: String,
    bindings: Vec<SqlValue>,
}

impl Raw {
    /// Creates a fragment without bindings.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }

    /// Creates a fragment with a prepared binding list.
    pub fn with_bindings(sql: impl Into<String>, bindings: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            bindings,
        }
    }

    /// Appends one binding.
    #[must_use]
    pub fn bind<T: ToSqlValue>(mut self, value: T) -> Self {
        self.bindings.push(value.to_sql_value());
        self
    }

    /// Returns the SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the bindings in placeholder order.
    #[must_use]
    pub fn bindings(&self) -> &[SqlValue] {
        &self.bindings
    }

    /// Splits the fragment into its parts.
    #[must_use]
    pub fn into_parts(self) -> (String, Vec<SqlValue>) {
        (self.sql, self.bindings)
    }
}
