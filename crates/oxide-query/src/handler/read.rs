//! Terminal read operations.

use std::fmt;
use std::ops::ControlFlow;

use oxide_query_core::{
    CompileKind, Field, Join, JoinKind, Operand, Operator, Predicate, Query, Raw, TableRef,
    ToSqlValue,
};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::QueryBuilderHandler;
use crate::cache::cache_key;
use crate::eager;
use crate::error::{QueryError, Result};
use crate::events::{Event, EventContext, HookOutcome};
use crate::row::{as_count, Row};

const AGGREGATE_ALIAS: &str = "aggregate";
const LATE_LOOKUP_ALIAS: &str = "__late_lookup";
const LATE_LOOKUP_KEY: &str = "__late_lookup_key";

/// SQL aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        })
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
    pub items: Vec<Row>,
}

/// Optional pagination behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageOptions {
    /// Page primary keys first, then fetch full rows for that page only.
    pub late_lookup: bool,
    /// Known total; skips the count query.
    pub total: Option<u64>,
}

impl QueryBuilderHandler {
    /// Runs a raw query now; the next [`get`](Self::get) returns its rows
    /// through the usual relation and map pipeline.
    pub async fn query(mut self, raw: Raw) -> Result<Self> {
        let (sql, bindings) = raw.into_parts();
        let query = Query::from_portable(sql, bindings, self.database.adapter().placeholder_style());
        let (rows, _) = self.fetch(&query).await?;
        self.pending = Some(rows);
        Ok(self)
    }

    /// Runs a raw statement and returns the number of affected rows.
    pub async fn execute_raw(&mut self, raw: Raw) -> Result<u64> {
        let (sql, bindings) = raw.into_parts();
        let query = Query::from_portable(sql, bindings, self.database.adapter().placeholder_style());
        let (executed, _) = self.execute(&query).await?;
        Ok(executed.rows_affected)
    }

    /// Fetches every row.
    ///
    /// Pipeline: before-select hook (may substitute the rows), execution,
    /// after-select hook, eager loading, maps. With a cache configured the
    /// whole pipeline is memoized. Declared relations are consumed.
    pub async fn get(&mut self) -> Result<Vec<Row>> {
        if self.pending.is_some() {
            return self.materialize(None).await;
        }
        let query = self.get_query(CompileKind::Select)?;
        self.get_compiled(query).await
    }

    async fn get_compiled(&mut self, query: Query) -> Result<Vec<Row>> {
        let Some(cache) = self.cache.clone().filter(|c| !c.ttl.is_zero()) else {
            return self.materialize(Some(&query)).await;
        };
        let key = cache
            .key
            .clone()
            .unwrap_or_else(|| cache_key(&query.raw_sql()));
        if let Some(hit) = cache.handler.get(&key).await {
            debug!(key = %key, "Cache hit");
            self.relations.clear();
            return Ok(serde_json::from_value(hit)?);
        }
        debug!(key = %key, "Cache miss");
        let rows = self.materialize(Some(&query)).await?;
        cache
            .handler
            .set(&key, serde_json::to_value(&rows)?, cache.ttl)
            .await;
        Ok(rows)
    }

    /// Runs the select pipeline. `query` is `None` when rows are pending
    /// from a raw [`query`](Self::query).
    async fn materialize(&mut self, query: Option<&Query>) -> Result<Vec<Row>> {
        let relations = std::mem::take(&mut self.relations);
        let table = self.event_table().to_string();

        let mut before = EventContext::new(Event::BeforeSelect, &table);
        before.query = query;
        if let Some(HookOutcome::Rows(rows)) = self.database.events().fire(&before) {
            self.pending = None;
            return Ok(rows);
        }

        let mut rows = match (self.pending.take(), query) {
            (Some(rows), _) => rows,
            (None, None) => Vec::new(),
            (None, Some(query)) => {
                let (rows, elapsed) = self.fetch(query).await?;
                let mut after = EventContext::new(Event::AfterSelect, &table);
                after.query = Some(query);
                after.rows = Some(&rows);
                after.elapsed = Some(elapsed);
                self.database.events().fire(&after);
                rows
            }
        };

        eager::resolve(self, &mut rows, &relations).await?;
        for map in &self.maps {
            rows = rows.into_iter().map(|row| map(row)).collect();
        }
        Ok(rows)
    }

    /// Fetches the first row, or `None` when nothing matches.
    pub async fn first(&mut self) -> Result<Option<Row>> {
        let limit = self.statement.limit.replace(1);
        let rows = self.get().await;
        self.statement.limit = limit;
        Ok(rows?.into_iter().next())
    }

    /// Fetches the row whose primary key equals `id`.
    pub async fn find(&self, id: impl Into<Operand>) -> Result<Option<Row>> {
        let key = self.database.config().primary_key.clone();
        let mut lookup = self.clone().where_eq(&key, id);
        lookup.first().await
    }

    /// Fetches every row whose primary key is in `ids`.
    pub async fn find_all<T, I>(&self, ids: I) -> Result<Vec<Row>>
    where
        T: ToSqlValue,
        I: IntoIterator<Item = T>,
    {
        let key = self.database.config().primary_key.clone();
        let mut lookup = self.clone().where_in(&key, ids);
        lookup.get().await
    }

    /// Collects one column from every row.
    pub async fn pluck(&mut self, column: &str) -> Result<Vec<Value>> {
        let rows = self.get().await?;
        let name = column.rsplit('.').next().unwrap_or(column);
        Ok(rows
            .into_iter()
            .map(|mut row| row.remove(name).unwrap_or(Value::Null))
            .collect())
    }

    /// Counts matching rows.
    ///
    /// Ordering, limit and offset are ignored. Grouped or distinct statements
    /// are wrapped as `SELECT COUNT(*) FROM (<statement>) AS t`, so the result
    /// is the number of groups.
    pub async fn count(&mut self) -> Result<u64> {
        let mut statement = self.statement.clone();
        statement.order_bys.clear();
        statement.limit = None;
        statement.offset = None;
        statement.upsert = None;

        let count = Field::Raw(Raw::new(format!("COUNT(*) AS {AGGREGATE_ALIAS}")));
        let adapter = self.database.adapter();
        let statement = if statement.is_grouped() || statement.distinct {
            let mut wrapper = self.derived(&statement)?;
            wrapper.selects.push(count);
            wrapper
        } else {
            statement.selects = vec![count];
            statement
        };
        let query = adapter.compile(CompileKind::Select, &statement, None)?;
        let (rows, _) = self.fetch(&query).await?;
        Ok(as_count(rows.first().and_then(|row| row.get(AGGREGATE_ALIAS))))
    }

    /// Whether any row matches.
    pub async fn exists(&mut self) -> Result<bool> {
        Ok(self.count().await? > 0)
    }

    /// Computes `function(column)` over the matching rows.
    ///
    /// The projection is swapped for the aggregate only for this call; the
    /// handler keeps its own projection and can be reused afterwards.
    /// Returns `Null` over an empty set (except for `COUNT`).
    ///
    /// Grouped or distinct statements are wrapped as
    /// `SELECT function(column) FROM (<statement>) AS t`, so the aggregate
    /// runs over the group rows and `column` names one of their output
    /// columns.
    pub async fn aggregate(&mut self, function: Aggregate, column: &str) -> Result<Value> {
        let adapter = self.database.adapter();
        let query = if self.statement.is_grouped() || self.statement.distinct {
            let target = if column == "*" {
                String::from("*")
            } else {
                let name = column.rsplit('.').next().unwrap_or(column);
                adapter.quote_identifier(&format!("t.{name}"))
            };
            let mut statement = self.statement.clone();
            statement.order_bys.clear();
            statement.upsert = None;
            let mut wrapper = self.derived(&statement)?;
            wrapper.selects.push(Field::Raw(Raw::new(format!(
                "{function}({target}) AS {AGGREGATE_ALIAS}"
            ))));
            adapter.compile(CompileKind::Select, &wrapper, None)?
        } else {
            let target = if column == "*" {
                String::from("*")
            } else {
                adapter.quote_identifier(&self.column_prefixed(column))
            };
            let projection =
                Field::Raw(Raw::new(format!("{function}({target}) AS {AGGREGATE_ALIAS}")));
            let saved = std::mem::replace(&mut self.statement.selects, vec![projection]);
            let query = self.get_query(CompileKind::Select);
            self.statement.selects = saved;
            query?
        };

        let (rows, _) = self.fetch(&query).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|mut row| row.remove(AGGREGATE_ALIAS))
            .unwrap_or(Value::Null))
    }

    /// A statement selecting from `statement` as the derived table `t`.
    fn derived(
        &self,
        statement: &oxide_query_core::Statement,
    ) -> Result<oxide_query_core::Statement> {
        let (sql, bindings) = self
            .database
            .adapter()
            .compile_fragment(CompileKind::Select, statement, None)?
            .into_parts();
        let mut wrapper = oxide_query_core::Statement::new();
        wrapper.tables.push(TableRef::Raw(Raw::with_bindings(
            format!("({sql}) AS t"),
            bindings,
        )));
        Ok(wrapper)
    }

    /// Sum of a column; zero over an empty set.
    pub async fn sum(&mut self, column: &str) -> Result<f64> {
        Ok(self.aggregate(Aggregate::Sum, column).await?.as_f64().unwrap_or(0.0))
    }

    pub async fn avg(&mut self, column: &str) -> Result<Option<f64>> {
        Ok(self.aggregate(Aggregate::Avg, column).await?.as_f64())
    }

    pub async fn min(&mut self, column: &str) -> Result<Value> {
        self.aggregate(Aggregate::Min, column).await
    }

    pub async fn max(&mut self, column: &str) -> Result<Value> {
        self.aggregate(Aggregate::Max, column).await
    }

    /// Fetches one page. `page` and `per_page` are clamped to at least 1.
    pub async fn paginate(&mut self, page: i64, per_page: i64) -> Result<Page> {
        self.paginate_with(page, per_page, PageOptions::default())
            .await
    }

    /// Fetches one page with explicit [`PageOptions`].
    ///
    /// Late lookup pages the primary keys of the main table in a derived
    /// table and joins the full rows back on, so wide rows outside the page
    /// are never read. It needs a plain main table.
    pub async fn paginate_with(
        &mut self,
        page: i64,
        per_page: i64,
        options: PageOptions,
    ) -> Result<Page> {
        let page = u64::try_from(page.max(1)).unwrap_or(1);
        let per_page = u64::try_from(per_page.max(1)).unwrap_or(1);
        let offset = (page - 1).checked_mul(per_page).ok_or_else(|| {
            QueryError::Configuration(format!("page {page} of {per_page} rows is out of range"))
        })?;

        let total = match options.total {
            Some(total) => total,
            None => self.count().await?,
        };

        let window = (self.statement.limit, self.statement.offset);
        self.statement.limit = Some(per_page);
        self.statement.offset = Some(offset);
        let query = if options.late_lookup {
            self.late_lookup_query()
        } else {
            self.get_query(CompileKind::Select)
        };
        (self.statement.limit, self.statement.offset) = window;

        let items = self.get_compiled(query?).await?;
        Ok(Page {
            current_page: page,
            per_page,
            total,
            last_page: total.div_ceil(per_page).max(1),
            items,
        })
    }

    fn late_lookup_query(&self) -> Result<Query> {
        let Some(table) = self.main_table().map(str::to_string) else {
            return Err(QueryError::Configuration(String::from(
                "late lookup requires a plain main table",
            )));
        };
        let qualifier = table_qualifier(&table);
        let key = format!(
            "{qualifier}.{}",
            self.database.config().primary_key
        );
        let adapter = self.database.adapter();

        let mut inner = self.statement.clone();
        inner.selects = vec![Field::Column(format!("{key} AS {LATE_LOOKUP_KEY}"))];
        let (sql, bindings) = adapter
            .compile_fragment(CompileKind::Select, &inner, None)?
            .into_parts();

        let mut outer = oxide_query_core::Statement::new();
        outer.tables.push(TableRef::Name(table.clone()));
        outer.selects = if self.statement.selects_everything() {
            vec![Field::Column(format!("{qualifier}.*"))]
        } else {
            self.statement.selects.clone()
        };
        outer.distinct = self.statement.distinct;
        outer.joins.push(Join {
            kind: JoinKind::Inner,
            table: TableRef::Raw(Raw::with_bindings(
                format!("({sql}) AS {LATE_LOOKUP_ALIAS}"),
                bindings,
            )),
            on: vec![Predicate::compare(
                key.as_str(),
                Operator::Eq,
                Operand::Column(format!("{LATE_LOOKUP_ALIAS}.{LATE_LOOKUP_KEY}")),
            )],
        });
        outer.order_bys.clone_from(&self.statement.order_bys);
        Ok(adapter.compile(CompileKind::Select, &outer, None)?)
    }

    /// Walks the result set in windows of `size` rows.
    ///
    /// `f` receives each batch and its zero-based index. Iteration stops at
    /// the first short or empty window, or when `f` breaks. Returns the
    /// number of batches handed to `f`.
    pub async fn chunk<F>(&mut self, size: u64, mut f: F) -> Result<usize>
    where
        F: FnMut(Vec<Row>, usize) -> ControlFlow<()>,
    {
        let size = size.max(1);
        let window = (self.statement.limit, self.statement.offset);
        let start = self.statement.offset.unwrap_or(0);
        let relations = self.relations.clone();

        let mut index = 0;
        let result = loop {
            self.statement.limit = Some(size);
            self.statement.offset = Some(start.saturating_add(size.saturating_mul(index as u64)));
            self.relations.clone_from(&relations);
            let batch = match self.get().await {
                Ok(batch) => batch,
                Err(err) => break Err(err),
            };
            if batch.is_empty() {
                break Ok(index);
            }
            let last = (batch.len() as u64) < size;
            let flow = f(batch, index);
            index += 1;
            if last || flow.is_break() {
                break Ok(index);
            }
        };

        (self.statement.limit, self.statement.offset) = window;
        self.relations = relations;
        result
    }
}

/// The name rows of a table are qualified with: the alias if there is one.
fn table_qualifier(table: &str) -> &str {
    let upper = table.to_ascii_uppercase();
    upper
        .rfind(" AS ")
        .map_or(table, |at| table[at + 4..].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_qualifier() {
        assert_eq!(table_qualifier("users"), "users");
        assert_eq!(table_qualifier("users AS u"), "u");
        assert_eq!(table_qualifier("users as  u "), "u");
    }
}
