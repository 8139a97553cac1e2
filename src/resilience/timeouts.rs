//! Timeout enforcement.
//!
//! # Responsibilities
//! - Race a store call against a per-call deadline
//! - Map an expired deadline to `Error::QueryTimeout`
//!
//! The raced future is dropped when the deadline fires, which cancels the
//! in-flight store call instead of leaving it running in the background.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Await `operation`, failing with `QueryTimeout` once `timeout` elapses.
pub async fn with_deadline<F, T>(timeout: Duration, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!(timeout_ms = timeout.as_millis() as u64, "Deadline exceeded");
            Err(Error::QueryTimeout { timeout })
        }
    }
}
