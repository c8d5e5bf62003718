//! Terminal write operations.

use std::time::Duration;

use oxide_query_core::{CompileError, CompileKind, Query, Record};
use serde_json::Value;

use super::QueryBuilderHandler;
use crate::error::{QueryError, Result};
use crate::events::{Event, EventContext, HookOutcome};
use crate::row::record_from_row;

/// Data for an insert: one record or a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Single(Record),
    Batch(Vec<Record>),
}

impl Payload {
    /// Returns the records in order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        match self {
            Self::Single(record) => std::slice::from_ref(record),
            Self::Batch(records) => records,
        }
    }

    #[must_use]
    pub const fn is_batch(&self) -> bool {
        matches!(self, Self::Batch(_))
    }

    fn into_records(self) -> Vec<Record> {
        match self {
            Self::Single(record) => vec![record],
            Self::Batch(records) => records,
        }
    }
}

impl From<Record> for Payload {
    fn from(record: Record) -> Self {
        Self::Single(record)
    }
}

impl From<Vec<Record>> for Payload {
    fn from(records: Vec<Record>) -> Self {
        Self::Batch(records)
    }
}

/// Reads a payload from JSON: an object is a single record, an array whose
/// first element is an object is a batch.
impl TryFrom<Value> for Payload {
    type Error = QueryError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(row) => Ok(Self::Single(record_from_row(&row))),
            Value::Array(items) if items.first().is_some_and(Value::is_object) => items
                .iter()
                .map(|item| {
                    item.as_object().map(record_from_row).ok_or_else(|| {
                        QueryError::Configuration(String::from(
                            "batch payload mixes records and scalars",
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::Batch),
            Value::Array(items) if items.is_empty() => Ok(Self::Batch(Vec::new())),
            other => Err(QueryError::Configuration(format!(
                "insert payload must be an object or an array of objects, got {other}"
            ))),
        }
    }
}

/// What [`QueryBuilderHandler::update_or_insert`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Written {
    /// Rows updated.
    Updated(u64),
    /// Identifier of the inserted row.
    Inserted(Option<i64>),
}

impl QueryBuilderHandler {
    /// Inserts one record or a batch, returning one identifier per record in
    /// input order (`None` where nothing was inserted).
    ///
    /// A batch runs one statement per record. Hooks fire once around the
    /// whole call. With [`on_duplicate_key_update`](Self::on_duplicate_key_update)
    /// configured the statements are upserts.
    pub async fn insert(&mut self, payload: impl Into<Payload>) -> Result<Vec<Option<i64>>> {
        let kind = if self.statement.upsert.is_some() {
            CompileKind::Upsert
        } else {
            CompileKind::Insert
        };
        self.insert_records(kind, payload.into()).await
    }

    /// Inserts, skipping records that violate a unique constraint.
    pub async fn insert_ignore(&mut self, payload: impl Into<Payload>) -> Result<Vec<Option<i64>>> {
        self.insert_records(CompileKind::InsertIgnore, payload.into())
            .await
    }

    /// Inserts, replacing rows that violate a unique constraint.
    pub async fn replace(&mut self, payload: impl Into<Payload>) -> Result<Vec<Option<i64>>> {
        self.insert_records(CompileKind::Replace, payload.into())
            .await
    }

    async fn insert_records(&mut self, kind: CompileKind, payload: Payload) -> Result<Vec<Option<i64>>> {
        let records = payload.into_records();
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let adapter = self.database.adapter();
        let queries = records
            .iter()
            .map(|record| adapter.compile(kind, &self.statement, Some(record)))
            .collect::<std::result::Result<Vec<Query>, CompileError>>()?;

        let table = self.event_table().to_string();
        let mut before = EventContext::new(Event::BeforeInsert, &table);
        before.query = queries.first();
        before.records = Some(&records);
        if let Some(HookOutcome::InsertIds(ids)) = self.database.events().fire(&before) {
            return Ok(ids);
        }

        let mut ids = Vec::with_capacity(queries.len());
        let mut elapsed = Duration::ZERO;
        for query in &queries {
            let (executed, took) = self.execute(query).await?;
            elapsed += took;
            ids.push(
                executed
                    .last_insert_id
                    .filter(|_| executed.rows_affected > 0),
            );
        }

        let mut after = EventContext::new(Event::AfterInsert, &table);
        after.query = queries.first();
        after.records = Some(&records);
        after.insert_ids = Some(&ids);
        after.elapsed = Some(elapsed);
        self.database.events().fire(&after);
        Ok(ids)
    }

    /// Updates matching rows, returning how many were affected.
    pub async fn update(&mut self, data: Record) -> Result<u64> {
        let query = self
            .database
            .adapter()
            .compile(CompileKind::Update, &self.statement, Some(&data))?;
        self.write(Event::BeforeUpdate, Event::AfterUpdate, &query)
            .await
    }

    /// Deletes matching rows, returning how many were affected.
    pub async fn delete(&mut self) -> Result<u64> {
        let query = self.get_query(CompileKind::Delete)?;
        self.write(Event::BeforeDelete, Event::AfterDelete, &query)
            .await
    }

    async fn write(&mut self, before: Event, after: Event, query: &Query) -> Result<u64> {
        let table = self.event_table().to_string();
        let mut context = EventContext::new(before, &table);
        context.query = Some(query);
        if let Some(HookOutcome::Affected(affected)) = self.database.events().fire(&context) {
            return Ok(affected);
        }

        let (executed, elapsed) = self.execute(query).await?;

        let mut context = EventContext::new(after, &table);
        context.query = Some(query);
        context.affected = Some(executed.rows_affected);
        context.elapsed = Some(elapsed);
        self.database.events().fire(&context);
        Ok(executed.rows_affected)
    }

    /// Updates the row matching `attributes` with `values`, or inserts
    /// `attributes` merged with `values` when none matches.
    ///
    /// Not atomic: the existence check and the write are separate
    /// round-trips, so a concurrent insert can slip in between.
    pub async fn update_or_insert(&mut self, attributes: Record, values: Record) -> Result<Written> {
        let mut scoped = attributes
            .iter()
            .fold(self.clone(), |q, (column, value)| q.where_eq(column, value.clone()));
        scoped.relations.clear();

        let exists = scoped.clone().first().await?.is_some();
        let written = if exists {
            if values.is_empty() {
                Written::Updated(0)
            } else {
                Written::Updated(scoped.update(values).await?)
            }
        } else {
            let mut record = attributes;
            for (column, value) in values.iter() {
                record.insert(column, value.clone());
            }
            let ids = scoped.insert(record).await?;
            Written::Inserted(ids.into_iter().next().flatten())
        };
        self.attempts = scoped.attempts;
        Ok(written)
    }
}
