//! Eager loading of related rows.
//!
//! Each declared [`Relation`] is resolved with one query (two for a
//! many-to-many without a join), whatever the number of root rows:
//!
//! 1. collect the distinct, non-empty correlation values of the root rows;
//! 2. fetch every related row whose key is in that set, projecting the key a
//!    second time under a placeholder alias;
//! 3. group the fetched rows by placeholder and splice them onto the roots.
//!
//! When no root row has a correlation value no query is issued, but the
//! relation field is still set on every row (`null` or `[]`).
//!
//! Related queries bypass hooks, caching and retries. A failure fails the
//! whole `get()`, so callers never see half-loaded relations.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use oxide_query_core::{Operand, Operator, SqlValue};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::handler::QueryBuilderHandler;
use crate::row::{correlation_key, json_to_sql, Row};

/// Alias under which related queries project the correlation value.
const RELATION_KEY: &str = "__relation_key";
/// Alias for the external-side key of a junction row.
const RELATION_TARGET: &str = "__relation_target";

/// Narrows or extends the query that loads a relation.
pub type Refine = Arc<dyn Fn(QueryBuilderHandler) -> QueryBuilderHandler + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    One,
    Many,
    ManyVia,
}

/// The junction table of a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Via {
    pub table: String,
    /// Junction column holding the root row's key.
    pub original_id: String,
    /// Junction column holding the related row's key.
    pub external_id: String,
}

impl Via {
    pub fn new(
        table: impl Into<String>,
        original_id: impl Into<String>,
        external_id: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            original_id: original_id.into(),
            external_id: external_id.into(),
        }
    }
}

/// A relation declaration.
///
/// `original_id` names the root-row column holding the correlation value;
/// `external_id` names the matching column of `external_table`.
#[derive(Clone)]
pub struct Relation {
    shape: Shape,
    name: String,
    external_table: String,
    external_id: String,
    original_id: String,
    via: Option<Via>,
    join_instead_select: bool,
    refine: Option<Refine>,
}

impl Relation {
    fn new(
        shape: Shape,
        name: impl Into<String>,
        external_table: impl Into<String>,
        external_id: impl Into<String>,
        original_id: impl Into<String>,
    ) -> Self {
        Self {
            shape,
            name: name.into(),
            external_table: external_table.into(),
            external_id: external_id.into(),
            original_id: original_id.into(),
            via: None,
            join_instead_select: false,
            refine: None,
        }
    }

    /// One related row per root row, stored as an object or `null`.
    ///
    /// If several related rows match, the last one wins.
    pub fn one(
        name: impl Into<String>,
        external_table: impl Into<String>,
        external_id: impl Into<String>,
        original_id: impl Into<String>,
    ) -> Self {
        Self::new(Shape::One, name, external_table, external_id, original_id)
    }

    /// Any number of related rows per root row, stored as an array.
    pub fn many(
        name: impl Into<String>,
        external_table: impl Into<String>,
        external_id: impl Into<String>,
        original_id: impl Into<String>,
    ) -> Self {
        Self::new(Shape::Many, name, external_table, external_id, original_id)
    }

    /// Related rows reached through a junction table, stored as an array.
    pub fn many_via(
        name: impl Into<String>,
        external_table: impl Into<String>,
        external_id: impl Into<String>,
        original_id: impl Into<String>,
        via: Via,
    ) -> Self {
        let mut relation = Self::new(Shape::ManyVia, name, external_table, external_id, original_id);
        relation.via = Some(via);
        relation
    }

    /// Loads a many-to-many relation with a single joined query instead of
    /// two selects.
    #[must_use]
    pub const fn join_instead_select(mut self) -> Self {
        self.join_instead_select = true;
        self
    }

    /// Adjusts the related query once, before it runs.
    #[must_use]
    pub fn refine<F>(mut self, f: F) -> Self
    where
        F: Fn(QueryBuilderHandler) -> QueryBuilderHandler + Send + Sync + 'static,
    {
        self.refine = Some(Arc::new(f));
        self
    }

    /// Name of the field the related rows are stored under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn empty_value(&self) -> Value {
        match self.shape {
            Shape::One => Value::Null,
            Shape::Many | Shape::ManyVia => Value::Array(Vec::new()),
        }
    }

    fn refined(&self, handler: QueryBuilderHandler) -> QueryBuilderHandler {
        match &self.refine {
            Some(refine) => refine(handler),
            None => handler,
        }
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("shape", &self.shape)
            .field("name", &self.name)
            .field("external_table", &self.external_table)
            .field("external_id", &self.external_id)
            .field("original_id", &self.original_id)
            .field("via", &self.via)
            .field("join_instead_select", &self.join_instead_select)
            .field("refined", &self.refine.is_some())
            .finish()
    }
}

impl QueryBuilderHandler {
    /// Declares a relation to load with the next `get()`.
    #[must_use]
    pub fn with(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Shorthand for [`Relation::one`].
    #[must_use]
    pub fn with_one(self, name: &str, external_table: &str, external_id: &str, original_id: &str) -> Self {
        self.with(Relation::one(name, external_table, external_id, original_id))
    }

    /// Shorthand for [`Relation::many`].
    #[must_use]
    pub fn with_many(self, name: &str, external_table: &str, external_id: &str, original_id: &str) -> Self {
        self.with(Relation::many(name, external_table, external_id, original_id))
    }

    /// Shorthand for [`Relation::many_via`].
    #[must_use]
    pub fn with_many_via(
        self,
        name: &str,
        external_table: &str,
        external_id: &str,
        original_id: &str,
        via: Via,
    ) -> Self {
        self.with(Relation::many_via(name, external_table, external_id, original_id, via))
    }
}

/// Resolves every relation against `rows`, in declaration order.
pub(crate) async fn resolve(
    handler: &QueryBuilderHandler,
    rows: &mut [Row],
    relations: &[Relation],
) -> Result<()> {
    for relation in relations {
        resolve_relation(handler, rows, relation).await?;
    }
    Ok(())
}

async fn resolve_relation(
    handler: &QueryBuilderHandler,
    rows: &mut [Row],
    relation: &Relation,
) -> Result<()> {
    let keys = distinct_keys(rows.iter(), &relation.original_id);
    if keys.is_empty() {
        debug!(relation = %relation.name, "No correlation values, skipping relation");
        for row in rows.iter_mut() {
            row.insert(relation.name.clone(), relation.empty_value());
        }
        return Ok(());
    }

    let related = match (&relation.via, relation.shape) {
        (Some(via), Shape::ManyVia) if !relation.join_instead_select => {
            load_via_two_queries(handler, relation, via, keys).await?
        }
        (Some(via), Shape::ManyVia) => load_via_join(handler, relation, via, keys).await?,
        _ => load_direct(handler, relation, keys).await?,
    };

    for row in rows.iter_mut() {
        let matches = row
            .get(&relation.original_id)
            .and_then(correlation_key)
            .and_then(|key| related.get(&key));
        let value = match (relation.shape, matches) {
            (Shape::One, Some(found)) => found.last().cloned().map_or(Value::Null, Value::Object),
            (Shape::Many | Shape::ManyVia, Some(found)) => {
                Value::Array(found.iter().cloned().map(Value::Object).collect())
            }
            (_, None) => relation.empty_value(),
        };
        row.insert(relation.name.clone(), value);
    }
    Ok(())
}

/// One-to-one and one-to-many: a single `IN` query on the external table.
async fn load_direct(
    handler: &QueryBuilderHandler,
    relation: &Relation,
    keys: Vec<SqlValue>,
) -> Result<HashMap<String, Vec<Row>>> {
    let table = &relation.external_table;
    let key_column = format!("{table}.{}", relation.external_id);
    let query = handler
        .table(table)
        .select(&[
            format!("{table}.*").as_str(),
            format!("{key_column} AS {RELATION_KEY}").as_str(),
        ])
        .where_op(&key_column, Operator::In, Operand::List(keys));
    let fetched = relation.refined(query).fetch_once().await?;
    debug!(relation = %relation.name, rows = fetched.len(), "Loaded relation");
    Ok(group_by_placeholder(fetched))
}

/// Many-to-many in one query: the junction joined to the external table.
async fn load_via_join(
    handler: &QueryBuilderHandler,
    relation: &Relation,
    via: &Via,
    keys: Vec<SqlValue>,
) -> Result<HashMap<String, Vec<Row>>> {
    let table = &relation.external_table;
    let root_column = format!("{}.{}", via.table, via.original_id);
    let target_column = format!("{}.{}", via.table, via.external_id);
    let external_column = format!("{table}.{}", relation.external_id);
    let query = handler
        .table(table)
        .select(&[
            format!("{table}.*").as_str(),
            format!("{root_column} AS {RELATION_KEY}").as_str(),
        ])
        .join(&via.table, |j| j.on(&target_column, Operator::Eq, &external_column))
        .where_op(&root_column, Operator::In, Operand::List(keys));
    let fetched = relation.refined(query).fetch_once().await?;
    debug!(relation = %relation.name, rows = fetched.len(), "Loaded joined relation");
    Ok(group_by_placeholder(fetched))
}

/// Many-to-many in two queries: junction rows first, then the external rows
/// they point at, stitched together in memory.
async fn load_via_two_queries(
    handler: &QueryBuilderHandler,
    relation: &Relation,
    via: &Via,
    keys: Vec<SqlValue>,
) -> Result<HashMap<String, Vec<Row>>> {
    let root_column = format!("{}.{}", via.table, via.original_id);
    let target_column = format!("{}.{}", via.table, via.external_id);
    let links = handler
        .table(&via.table)
        .select(&[
            format!("{target_column} AS {RELATION_TARGET}").as_str(),
            format!("{root_column} AS {RELATION_KEY}").as_str(),
        ])
        .where_op(&root_column, Operator::In, Operand::List(keys))
        .fetch_once()
        .await?;

    let targets = distinct_keys(links.iter(), RELATION_TARGET);
    if targets.is_empty() {
        return Ok(HashMap::new());
    }

    let table = &relation.external_table;
    let external_column = format!("{table}.{}", relation.external_id);
    let query = handler
        .table(table)
        .select(&[
            format!("{table}.*").as_str(),
            format!("{external_column} AS {RELATION_KEY}").as_str(),
        ])
        .where_op(&external_column, Operator::In, Operand::List(targets));
    let external: HashMap<String, Row> = group_by_placeholder(relation.refined(query).fetch_once().await?)
        .into_iter()
        .filter_map(|(key, mut rows)| rows.pop().map(|row| (key, row)))
        .collect();
    debug!(
        relation = %relation.name,
        links = links.len(),
        rows = external.len(),
        "Loaded relation through junction"
    );

    let mut grouped: HashMap<String, Vec<Row>> = HashMap::new();
    for link in &links {
        let (Some(root), Some(target)) = (
            link.get(RELATION_KEY).and_then(correlation_key),
            link.get(RELATION_TARGET).and_then(correlation_key),
        ) else {
            continue;
        };
        if let Some(row) = external.get(&target) {
            grouped.entry(root).or_default().push(row.clone());
        }
    }
    Ok(grouped)
}

/// Distinct non-empty values of `column`, in first-seen order.
fn distinct_keys<'a>(rows: impl Iterator<Item = &'a Row>, column: &str) -> Vec<SqlValue> {
    let mut seen = HashSet::new();
    rows.filter_map(|row| row.get(column))
        .filter_map(|value| correlation_key(value).map(|key| (key, value)))
        .filter(|(key, _)| seen.insert(key.clone()))
        .map(|(_, value)| json_to_sql(value))
        .collect()
}

/// Groups rows by their placeholder value, removing the placeholder column.
fn group_by_placeholder(rows: Vec<Row>) -> HashMap<String, Vec<Row>> {
    let mut grouped: HashMap<String, Vec<Row>> = HashMap::new();
    for mut row in rows {
        let Some(key) = row.shift_remove(RELATION_KEY).as_ref().and_then(correlation_key) else {
            continue;
        };
        grouped.entry(key).or_default().push(row);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: Value) -> Vec<Row> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_distinct_keys_skip_empty_values() {
        let roots = rows(json!([
            {"id": 1}, {"id": 2}, {"id": 1}, {"id": null}, {"id": ""}, {"other": 3}
        ]));
        assert_eq!(
            distinct_keys(roots.iter(), "id"),
            vec![SqlValue::Int(1), SqlValue::Int(2)]
        );
    }

    #[test]
    fn test_group_by_placeholder_strips_column() {
        let fetched = rows(json!([
            {"id": 10, "__relation_key": 1},
            {"id": 11, "__relation_key": 1},
            {"id": 12, "__relation_key": 2},
        ]));
        let grouped = group_by_placeholder(fetched);
        assert_eq!(grouped["1"].len(), 2);
        assert_eq!(grouped["2"][0], *json!({"id": 12}).as_object().unwrap());
    }
}
