//! Resilient statement execution.
//!
//! Each statement goes PREPARE, BIND, EXECUTE. A failure classified as
//! transient triggers a reconnect and a reissue of the same SQL with the same
//! bindings, up to `max_reconnect_attempts` times per statement. The attempt
//! counter lives on the handler and is reset for every statement.
//!
//! Reissuing is not deduplicated: a write that reached the database before
//! the connection dropped may be applied twice. Inside a transaction nothing
//! is retried, since a new session would have lost the transaction.

use std::time::{Duration, Instant};

use oxide_query_core::{CompileKind, Query};
use tracing::{debug, warn};

use super::QueryBuilderHandler;
use crate::connection::{bindings, Executed};
use crate::error::{QueryError, Result};
use crate::row::Row;

enum Mode {
    Fetch,
    Execute,
}

enum Outcome {
    Rows(Vec<Row>),
    Executed(Executed),
}

impl QueryBuilderHandler {
    /// Runs a query and returns its rows, retrying lost connections.
    pub(crate) async fn fetch(&mut self, query: &Query) -> Result<(Vec<Row>, Duration)> {
        let retry = self.transaction.is_none();
        let started = Instant::now();
        match self.run(query, Mode::Fetch, retry).await? {
            Outcome::Rows(rows) => Ok((rows, started.elapsed())),
            Outcome::Executed(_) => Ok((Vec::new(), started.elapsed())),
        }
    }

    /// Runs a statement, retrying lost connections.
    pub(crate) async fn execute(&mut self, query: &Query) -> Result<(Executed, Duration)> {
        let retry = self.transaction.is_none();
        let started = Instant::now();
        match self.run(query, Mode::Execute, retry).await? {
            Outcome::Executed(executed) => Ok((executed, started.elapsed())),
            Outcome::Rows(_) => Ok((Executed::default(), started.elapsed())),
        }
    }

    /// Compiles and fetches without retries, hooks, cache or relations.
    ///
    /// Used for eager-load queries.
    pub(crate) async fn fetch_once(mut self) -> Result<Vec<Row>> {
        let query = self.get_query(CompileKind::Select)?;
        match self.run(&query, Mode::Fetch, false).await? {
            Outcome::Rows(rows) => Ok(rows),
            Outcome::Executed(_) => Ok(Vec::new()),
        }
    }

    async fn run(&mut self, query: &Query, mode: Mode, retry: bool) -> Result<Outcome> {
        self.intercept_dump(query)?;

        let budget = self.database.config().max_reconnect_attempts;
        let bound = bindings(query.bindings());
        self.attempts = 0;

        let mut connection = self.database.connection().lock().await;
        loop {
            debug!(sql = %query.sql(), bindings = bound.len(), attempt = self.attempts, "Executing SQL");
            let result = match mode {
                Mode::Fetch => connection
                    .fetch_all(query.sql(), &bound)
                    .await
                    .map(Outcome::Rows),
                Mode::Execute => connection
                    .execute(query.sql(), &bound)
                    .await
                    .map(Outcome::Executed),
            };

            let err = match result {
                Ok(outcome) => return Ok(outcome),
                Err(err) if retry && err.is_transient() => err,
                Err(err) => return Err(err),
            };

            if self.attempts >= budget {
                warn!(attempts = self.attempts, error = %err, "Giving up after repeated connection loss");
                return Err(QueryError::RetriesExhausted {
                    attempts: self.attempts,
                    message: err.to_string(),
                });
            }
            self.attempts += 1;
            warn!(attempt = self.attempts, budget, error = %err, "Connection lost, reconnecting");

            if let Err(reconnect) = connection.reconnect().await {
                if !reconnect.is_transient() {
                    return Err(reconnect);
                }
                debug!(error = %reconnect, "Reconnect failed");
            }
        }
    }
}
