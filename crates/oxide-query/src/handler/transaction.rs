//! Transactions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use super::QueryBuilderHandler;
use crate::error::{QueryError, Result};

/// Shared by every handler derived from a transaction handle.
#[derive(Debug, Default)]
pub(crate) struct TransactionScope {
    resolved: AtomicBool,
}

impl TransactionScope {
    fn resolve(&self) {
        self.resolved.store(true, Ordering::SeqCst);
    }

    fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::SeqCst)
    }
}

impl QueryBuilderHandler {
    /// Runs `f` inside a transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns an error
    /// and passes the error on. `f` may finish the transaction early with
    /// [`commit`](Self::commit) or [`rollback`](Self::rollback); both return
    /// [`QueryError::TransactionHalted`] so that `?` leaves `f`, and the
    /// call then yields `Ok(None)`.
    ///
    /// Statements inside the transaction are never retried after a lost
    /// connection.
    ///
    /// ```ignore
    /// db.transaction(|tx| Box::pin(async move {
    ///     tx.table("accounts").where_eq("id", 1).update(debit).await?;
    ///     tx.table("accounts").where_eq("id", 2).update(credit).await?;
    ///     Ok(())
    /// }))
    /// .await?;
    /// ```
    pub async fn transaction<T, F>(&self, f: F) -> Result<Option<T>>
    where
        F: for<'t> FnOnce(&'t mut Self) -> BoxFuture<'t, Result<T>>,
    {
        if self.transaction.is_some() {
            return Err(QueryError::Configuration(String::from(
                "nested transactions are not supported",
            )));
        }
        let scope = Arc::new(TransactionScope::default());
        let mut tx = self.new_query();
        tx.transaction = Some(Arc::clone(&scope));

        self.database.connection().lock().await.begin().await?;
        debug!("Transaction started");

        let result = f(&mut tx).await;
        if scope.is_resolved() {
            return match result {
                Ok(value) => Ok(Some(value)),
                Err(QueryError::TransactionHalted) => Ok(None),
                Err(err) => Err(err),
            };
        }

        match result {
            Ok(value) => {
                let mut connection = self.database.connection().lock().await;
                if let Err(err) = connection.commit().await {
                    warn!(error = %err, "Commit failed, rolling back");
                    let _ = connection.rollback().await;
                    return Err(err);
                }
                debug!("Transaction committed");
                Ok(Some(value))
            }
            Err(err) => {
                if let Err(rollback) = self.database.connection().lock().await.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                debug!(error = %err, "Transaction rolled back");
                match err {
                    QueryError::TransactionHalted => Ok(None),
                    err => Err(err),
                }
            }
        }
    }

    /// Commits the surrounding transaction and halts it.
    ///
    /// Returns [`QueryError::TransactionHalted`] on success, so that
    /// `tx.commit().await?` exits the transaction closure.
    pub async fn commit<T>(&mut self) -> Result<T> {
        let scope = self.scope("commit")?;
        self.database.connection().lock().await.commit().await?;
        scope.resolve();
        debug!("Transaction committed early");
        Err(QueryError::TransactionHalted)
    }

    /// Rolls back the surrounding transaction and halts it.
    pub async fn rollback<T>(&mut self) -> Result<T> {
        let scope = self.scope("rollback")?;
        self.database.connection().lock().await.rollback().await?;
        scope.resolve();
        debug!("Transaction rolled back early");
        Err(QueryError::TransactionHalted)
    }

    fn scope(&self, action: &str) -> Result<Arc<TransactionScope>> {
        self.transaction.clone().ok_or_else(|| {
            QueryError::Configuration(format!("{action} called outside a transaction"))
        })
    }
}
