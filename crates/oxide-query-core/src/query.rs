//! Compiled queries.

use crate::value::SqlValue;

/// How placeholders are spelled in a compiled query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceholderStyle {
    /// `?`
    #[default]
    Question,
    /// `$1`, `$2`, ...
    Numbered,
}

/// A compiled statement: SQL text plus ordered bindings.
///
/// Queries are immutable once compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    sql: String,
    bindings: Vec<SqlValue>,
    style: PlaceholderStyle,
}

impl Query {
    /// Wraps already-final SQL.
    #[must_use]
    pub const fn new(sql: String, bindings: Vec<SqlValue>, style: PlaceholderStyle) -> Self {
        Self {
            sql,
            bindings,
            style,
        }
    }

    /// Wraps SQL written with `?` placeholders, renumbering them when `style`
    /// asks for numbered parameters.
    #[must_use]
    pub fn from_portable(sql: String, bindings: Vec<SqlValue>, style: PlaceholderStyle) -> Self {
        let sql = match style {
            PlaceholderStyle::Question => sql,
            PlaceholderStyle::Numbered => rewrite_placeholders(
                &sql,
                PlaceholderStyle::Question,
                |index, _| format!("${}", index + 1),
            ),
        };
        Self::new(sql, bindings, style)
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn bindings(&self) -> &[SqlValue] {
        &self.bindings
    }

    #[must_use]
    pub const fn style(&self) -> PlaceholderStyle {
        self.style
    }

    #[must_use]
    pub fn into_parts(self) -> (String, Vec<SqlValue>) {
        (self.sql, self.bindings)
    }

    /// Renders the SQL with every binding inlined as a literal.
    ///
    /// For logs, dumps and cache keys only. The result is never executed.
    #[must_use]
    pub fn raw_sql(&self) -> String {
        rewrite_placeholders(&self.sql, self.style, |index, token| {
            self.bindings
                .get(index)
                .map_or_else(|| token.to_string(), SqlValue::to_sql_inline)
        })
    }
}

/// Rewrites each placeholder outside quoted text.
///
/// `replace` receives the zero-based binding index and the original token.
pub(crate) fn rewrite_placeholders(
    sql: &str,
    style: PlaceholderStyle,
    mut replace: impl FnMut(usize, &str) -> String,
) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;
    let mut next = 0;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            '?' if style == PlaceholderStyle::Question => {
                out.push_str(&replace(next, "?"));
                next += 1;
            }
            '$' if style == PlaceholderStyle::Numbered
                && chars.peek().is_some_and(char::is_ascii_digit) =>
            {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                let position: usize = digits.parse().unwrap_or(0);
                out.push_str(&replace(position.saturating_sub(1), &format!("${digits}")));
            }
            _ => out.push(c),
        }
    }
    out
}
