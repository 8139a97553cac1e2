//! Managed store access.
//!
//! # Responsibilities
//! - Route every store call through retry → circuit breaker → deadline
//! - Pick the store call shape (explicitly or by classification)
//! - Log slow and failed calls with truncated query text
//! - Provide error-swallowing `safe_*` wrappers, transactions and health checks
//!
//! # Call pipeline
//! ```text
//! execute_query / query_one / query_many / execute
//!     → execute_with_retry   (reads: 3 attempts, writes: 1; store contention only)
//!         → CircuitBreaker::execute
//!             → with_deadline(options.timeout)
//!                 → Store::get / all / run
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::{DataAccessConfig, HealthCheckConfig, QuerySettings, RetrySettings};
use crate::data_access::classify::QueryKind;
use crate::data_access::health::HealthReport;
use crate::data_access::options::{OperationType, QueryOptions};
use crate::data_access::transaction::Transaction;
use crate::data_access::{decode_row, QueryResult};
use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::resilience::{
    execute_with_retry, with_deadline, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats,
    RetryConfig, RetryOn,
};
use crate::store::{RunResult, Store};

/// Resilient facade over a `Store`.
///
/// One instance per logical database; share it behind an `Arc`. The circuit
/// breaker is shared by every call made through the instance.
pub struct ManagedDataAccess {
    store: Arc<dyn Store>,
    breaker: Arc<CircuitBreaker>,
    queries: QuerySettings,
    retry: RetrySettings,
    health: HealthCheckConfig,
}

impl ManagedDataAccess {
    /// Build the facade with its own circuit breaker.
    pub fn new(store: Arc<dyn Store>, config: &DataAccessConfig) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(
            "database",
            CircuitBreakerConfig::from(&config.breaker),
        ));

        Self {
            store,
            breaker,
            queries: config.queries.clone(),
            retry: config.retry.clone(),
            health: config.health_check.clone(),
        }
    }

    /// Use an externally owned breaker, e.g. one shared with another
    /// facade over the same database.
    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn circuit_breaker_stats(&self) -> CircuitBreakerStats {
        self.breaker.stats()
    }

    /// Read options with the configured default deadline.
    pub fn read_options(&self) -> QueryOptions {
        QueryOptions::read().with_timeout(self.queries.timeout())
    }

    /// Write options with the configured default deadline.
    pub fn write_options(&self) -> QueryOptions {
        QueryOptions::write().with_timeout(self.queries.timeout())
    }

    /// Run `query`, choosing the store call from the statement text.
    pub async fn execute_query(
        &self,
        query: &str,
        params: &[Value],
        options: QueryOptions,
    ) -> Result<QueryResult> {
        self.run_pipeline(QueryKind::classify(query), query, params, &options)
            .await
    }

    /// Fetch at most one row as `T`.
    pub async fn query_one<T: DeserializeOwned>(
        &self,
        query: &str,
        params: &[Value],
        options: QueryOptions,
    ) -> Result<Option<T>> {
        let result = self.run_pipeline(QueryKind::One, query, params, &options).await?;
        result
            .into_row()
            .map(decode_row)
            .transpose()
            .inspect_err(|e| self.log_decode_failure(query, e))
    }

    /// Fetch every row as `T`.
    pub async fn query_many<T: DeserializeOwned>(
        &self,
        query: &str,
        params: &[Value],
        options: QueryOptions,
    ) -> Result<Vec<T>> {
        let result = self.run_pipeline(QueryKind::Many, query, params, &options).await?;
        result
            .into_rows()
            .into_iter()
            .map(decode_row)
            .collect::<Result<Vec<T>>>()
            .inspect_err(|e| self.log_decode_failure(query, e))
    }

    /// Execute a mutating statement.
    pub async fn execute(
        &self,
        query: &str,
        params: &[Value],
        options: QueryOptions,
    ) -> Result<RunResult> {
        let result = self
            .run_pipeline(QueryKind::Mutation, query, params, &options)
            .await?;
        Ok(result.into_run())
    }

    /// `query_one` as a read that yields `None` on any failure.
    pub async fn safe_get<T: DeserializeOwned>(&self, query: &str, params: &[Value]) -> Option<T> {
        match self.query_one(query, params, self.read_options()).await {
            Ok(row) => row,
            Err(e) => {
                self.log_suppressed("safe_get", query, &e);
                None
            }
        }
    }

    /// `query_many` as a read that yields an empty list on any failure.
    pub async fn safe_all<T: DeserializeOwned>(&self, query: &str, params: &[Value]) -> Vec<T> {
        match self.query_many(query, params, self.read_options()).await {
            Ok(rows) => rows,
            Err(e) => {
                self.log_suppressed("safe_all", query, &e);
                Vec::new()
            }
        }
    }

    /// `execute` as a write without retry that yields `None` on any failure.
    pub async fn safe_run(&self, query: &str, params: &[Value]) -> Option<RunResult> {
        match self
            .execute(query, params, self.write_options().without_retry())
            .await
        {
            Ok(result) => Some(result),
            Err(e) => {
                self.log_suppressed("safe_run", query, &e);
                None
            }
        }
    }

    /// Run `operation` inside a store transaction.
    ///
    /// Commits when `operation` succeeds. If `operation` or the commit
    /// fails, the transaction is rolled back and the original error is
    /// returned; a failing rollback is logged and never replaces it. The
    /// whole transaction counts as one call for the circuit breaker.
    pub async fn execute_transaction<T, F>(&self, operation: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>>,
    {
        let id = Uuid::new_v4();
        let start = Instant::now();
        tracing::debug!(transaction = %id, "Transaction starting");

        let result = self
            .breaker
            .execute(|| self.run_transaction(id, operation))
            .await;

        match &result {
            Ok(_) => {
                metrics::record_transaction("committed");
                tracing::debug!(
                    transaction = %id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Transaction committed"
                );
            }
            Err(e) => {
                metrics::record_transaction("failed");
                tracing::error!(
                    transaction = %id,
                    error = %e,
                    error_class = e.class(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Transaction failed"
                );
            }
        }
        result
    }

    /// `execute_transaction` that yields `None` on failure.
    pub async fn safe_transaction<T, F>(&self, operation: F) -> Option<T>
    where
        F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>>,
    {
        self.execute_transaction(operation).await.ok()
    }

    /// Issue the configured trivial read without retry. Never fails.
    pub async fn health_check(&self) -> HealthReport {
        let start = Instant::now();
        let options = QueryOptions::read()
            .with_timeout(self.health.timeout())
            .without_retry();

        let result = self
            .run_pipeline(QueryKind::One, &self.health.query, &[], &options)
            .await;
        let elapsed = start.elapsed();
        metrics::record_health(result.is_ok(), elapsed);

        HealthReport {
            is_healthy: result.is_ok(),
            response_time_ms: elapsed.as_millis() as u64,
            error_message: result.err().map(|e| e.to_string()),
        }
    }

    async fn run_pipeline(
        &self,
        kind: QueryKind,
        query: &str,
        params: &[Value],
        options: &QueryOptions,
    ) -> Result<QueryResult> {
        let start = Instant::now();
        let timeout = options.timeout;

        let result = if options.use_retry {
            let retry = self.retry_config(options.operation_type);
            execute_with_retry(&retry, || self.guarded_call(kind, query, params, timeout)).await
        } else {
            self.guarded_call(kind, query, params, timeout).await
        };

        let elapsed = start.elapsed();
        match &result {
            Ok(_) => {
                metrics::record_query(kind.as_str(), "ok", start);
                if elapsed > self.queries.slow_query_threshold() {
                    metrics::record_slow_query(kind.as_str());
                    tracing::warn!(
                        query = %self.truncate(query),
                        duration_ms = elapsed.as_millis() as u64,
                        "Slow query"
                    );
                }
            }
            Err(e) => {
                metrics::record_query(kind.as_str(), e.class(), start);
                tracing::error!(
                    query = %self.truncate(query),
                    params = params.len(),
                    error = %e,
                    error_class = e.class(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Query failed"
                );
            }
        }
        result
    }

    /// One attempt: breaker gate around the deadline-bounded store call.
    async fn guarded_call(
        &self,
        kind: QueryKind,
        query: &str,
        params: &[Value],
        timeout: std::time::Duration,
    ) -> Result<QueryResult> {
        self.breaker
            .execute(|| with_deadline(timeout, self.store_call(kind, query, params)))
            .await
    }

    fn store_call<'a>(
        &'a self,
        kind: QueryKind,
        query: &'a str,
        params: &'a [Value],
    ) -> impl Future<Output = Result<QueryResult>> + 'a {
        async move {
            let result = match kind {
                QueryKind::One => QueryResult::Row(self.store.get(query, params).await?),
                QueryKind::Many => QueryResult::Rows(self.store.all(query, params).await?),
                QueryKind::Mutation => QueryResult::Run(self.store.run(query, params).await?),
            };
            Ok(result)
        }
    }

    async fn run_transaction<T, F>(&self, id: Uuid, operation: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>>,
    {
        let inner = self.store.begin().await?;
        let mut tx = Transaction::new(id, inner, self.queries.timeout());

        match operation(&mut tx).await {
            Ok(value) => match tx.commit().await {
                Ok(()) => Ok(value),
                Err(commit_err) => {
                    tx.rollback_after(&commit_err).await;
                    Err(commit_err)
                }
            },
            Err(err) => {
                tx.rollback_after(&err).await;
                Err(err)
            }
        }
    }

    fn retry_config(&self, operation: OperationType) -> RetryConfig {
        let attempts = match operation {
            OperationType::Read => self.queries.read_max_attempts,
            OperationType::Write => self.queries.write_max_attempts,
        };
        RetryConfig::from_settings(&self.retry, attempts, RetryOn::StoreContention)
    }

    fn truncate<'q>(&self, query: &'q str) -> Cow<'q, str> {
        truncate_query(query, self.queries.log_query_chars)
    }

    fn log_decode_failure(&self, query: &str, error: &Error) {
        tracing::error!(query = %self.truncate(query), error = %error, "Row decode failed");
    }

    fn log_suppressed(&self, operation: &'static str, query: &str, error: &Error) {
        tracing::debug!(
            operation,
            query = %self.truncate(query),
            error_class = error.class(),
            "Suppressed error, returning empty result"
        );
    }
}

impl std::fmt::Debug for ManagedDataAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedDataAccess")
            .field("breaker", &self.breaker)
            .field("queries", &self.queries)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Keep the first `max_chars` characters, marking the cut with "...".
pub fn truncate_query(query: &str, max_chars: usize) -> Cow<'_, str> {
    match query.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(format!("{}...", &query[..idx])),
        None => Cow::Borrowed(query),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_query_respects_char_boundaries() {
        assert_eq!(truncate_query("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_query("SELECT * FROM bets", 6), "SELECT...");
        assert_eq!(truncate_query("SELECT 'ñandú'", 10), "SELECT 'ña...");
    }
}
