//! Retry logic.
//!
//! # Responsibilities
//! - Decide per failure whether an operation is worth repeating
//! - Execute attempts with exponential backoff between them
//! - Report attempts, delays and final failures through tracing
//!
//! The executor keeps no state between calls; every invocation is
//! independent and may run concurrently with others.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetrySettings;
use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::resilience::backoff::{apply_jitter, calculate_backoff};

/// Predicate deciding which errors are retried.
#[derive(Clone, Default)]
pub enum RetryOn {
    /// Connection resets, timeouts, unavailability and store contention.
    #[default]
    Transient,
    /// Busy, locked and lock-timeout store errors only.
    StoreContention,
    /// Never retry.
    Never,
    /// Caller-supplied predicate.
    Custom(Arc<dyn Fn(&Error) -> bool + Send + Sync>),
}

impl RetryOn {
    pub fn matches(&self, error: &Error) -> bool {
        match self {
            RetryOn::Transient => error.is_transient(),
            RetryOn::StoreContention => error.is_store_contention(),
            RetryOn::Never => false,
            RetryOn::Custom(predicate) => predicate(error),
        }
    }
}

impl fmt::Debug for RetryOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryOn::Transient => write!(f, "Transient"),
            RetryOn::StoreContention => write!(f, "StoreContention"),
            RetryOn::Never => write!(f, "Never"),
            RetryOn::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Per-call retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Growth factor applied per attempt.
    pub backoff_factor: f64,
    /// Random widening of each delay, 0.0 disables jitter.
    pub jitter_ratio: f64,
    /// Which errors are retried.
    pub retry_on: RetryOn,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
            jitter_ratio: 0.0,
            retry_on: RetryOn::Transient,
        }
    }
}

impl RetryConfig {
    /// Build a policy from configured delays with the given attempt budget.
    pub fn from_settings(settings: &RetrySettings, max_attempts: u32, retry_on: RetryOn) -> Self {
        Self {
            max_attempts,
            base_delay: settings.base_delay(),
            max_delay: settings.max_delay(),
            backoff_factor: settings.backoff_factor,
            jitter_ratio: settings.jitter_ratio,
            retry_on,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    pub fn should_retry(&self, error: &Error) -> bool {
        self.retry_on.matches(error)
    }

    /// Delay after failed attempt `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = calculate_backoff(attempt, self.base_delay, self.max_delay, self.backoff_factor);
        apply_jitter(delay, self.jitter_ratio)
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// runs out of attempts. The last error is returned unchanged.
pub async fn execute_with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                if attempt >= max_attempts || !config.should_retry(&error) {
                    if attempt > 1 {
                        tracing::warn!(
                            attempt,
                            max_attempts,
                            error = %error,
                            "Operation failed after retries"
                        );
                    }
                    return Err(error);
                }

                let delay = config.delay_for(attempt);
                tracing::debug!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Attempt failed, retrying"
                );
                metrics::record_retry(error.class());

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
