//! Error types for the query handler.
//!
//! Errors fall into four classes:
//!
//! - configuration: [`QueryError::Configuration`] and [`QueryError::Compile`],
//!   raised at the call that introduced the mistake;
//! - transient: [`QueryError::ConnectionLost`], retried by the execution
//!   layer;
//! - fatal: [`QueryError::Database`] and [`QueryError::RetriesExhausted`];
//! - control flow: [`QueryError::TransactionHalted`] and
//!   [`QueryError::Dumped`].
//!
//! Missing data is never an error: lookups return `Option`.

use oxide_query_core::CompileError;
use thiserror::Error;

use crate::connection::is_lost_connection;

/// Query handler errors.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Invalid setup: bad TTL, unsupported driver, no default database.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The statement could not be compiled.
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    /// The connection dropped. Retried by the execution layer.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Any other failure reported by the database.
    #[error("database error: {0}")]
    Database(String),

    /// The connection kept dropping.
    #[error("connection lost after {attempts} reconnect attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    /// Rows could not be (de)serialized, e.g. a corrupt cache entry.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The transaction was committed or rolled back by hand.
    #[error("transaction halted")]
    TransactionHalted,

    /// Dump mode intercepted a statement. Carries the inlined SQL.
    #[error("dumped query: {0}")]
    Dumped(String),
}

impl QueryError {
    /// Whether reconnecting and reissuing the statement may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }

    /// Whether this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Compile(_))
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(e) => Self::ConnectionLost(e.to_string()),
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed => {
                Self::ConnectionLost(err.to_string())
            }
            sqlx::Error::Configuration(e) => Self::Configuration(e.to_string()),
            other => {
                let message = other.to_string();
                if is_lost_connection(&message) {
                    Self::ConnectionLost(message)
                } else {
                    Self::Database(message)
                }
            }
        }
    }
}

/// Result type alias for query handler operations.
pub type Result<T> = std::result::Result<T, QueryError>;
