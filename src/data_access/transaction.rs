//! Transaction scope handed to `execute_transaction` callbacks.
//!
//! # Responsibilities
//! - Run statements on the open store transaction under a per-statement deadline
//! - Decode rows into caller types
//! - Finish with exactly one commit, or a rollback when anything failed

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::data_access::decode_row;
use crate::error::{Error, Result};
use crate::resilience::with_deadline;
use crate::store::{Rollback, RunResult, StoreTransaction};

/// An open transaction. Only lives for one `execute_transaction` call.
pub struct Transaction {
    id: Uuid,
    inner: Box<dyn StoreTransaction>,
    timeout: Duration,
    finished: bool,
}

impl Transaction {
    pub(crate) fn new(id: Uuid, inner: Box<dyn StoreTransaction>, timeout: Duration) -> Self {
        Self {
            id,
            inner,
            timeout,
            finished: false,
        }
    }

    /// Correlation id carried on this transaction's log records.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Fetch at most one row.
    pub async fn get<T: DeserializeOwned>(&mut self, query: &str, params: &[Value]) -> Result<Option<T>> {
        let timeout = self.timeout;
        let row = with_deadline(timeout, async {
            self.inner.get(query, params).await.map_err(Error::from)
        })
        .await?;
        row.map(decode_row).transpose()
    }

    /// Fetch every row.
    pub async fn all<T: DeserializeOwned>(&mut self, query: &str, params: &[Value]) -> Result<Vec<T>> {
        let timeout = self.timeout;
        let rows = with_deadline(timeout, async {
            self.inner.all(query, params).await.map_err(Error::from)
        })
        .await?;
        rows.into_iter().map(decode_row).collect()
    }

    /// Execute a mutating statement.
    pub async fn run(&mut self, query: &str, params: &[Value]) -> Result<RunResult> {
        let timeout = self.timeout;
        with_deadline(timeout, async {
            self.inner.run(query, params).await.map_err(Error::from)
        })
        .await
    }

    pub(crate) async fn commit(&mut self) -> Result<()> {
        self.finished = true;
        self.inner.commit().await.map_err(Error::from)
    }

    /// Roll back after `cause`; a rollback failure is logged, never returned.
    pub(crate) async fn rollback_after(&mut self, cause: &Error) {
        self.finished = true;
        match self.inner.rollback().await {
            Ok(Rollback::RolledBack) => {
                tracing::debug!(transaction = %self.id, cause = %cause, "Transaction rolled back")
            }
            Ok(Rollback::Released) => tracing::debug!(
                transaction = %self.id,
                cause = %cause,
                "Transaction handle already released, store discarded its writes on drop"
            ),
            Err(e) => tracing::error!(
                transaction = %self.id,
                cause = %cause,
                error = %e,
                "Rollback failed"
            ),
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                transaction = %self.id,
                "Transaction dropped before completing, store discards its writes"
            );
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .field("finished", &self.finished)
            .finish()
    }
}
