//! Per-call query options.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether a call reads or mutates; drives the retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    #[default]
    Read,
    Write,
}

/// Options for a single managed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Retry store contention errors with backoff.
    pub use_retry: bool,
    /// Deadline for each store attempt.
    pub timeout: Duration,
    /// Reads get several attempts, writes get one.
    pub operation_type: OperationType,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            use_retry: true,
            timeout: Duration::from_secs(10),
            operation_type: OperationType::Read,
        }
    }
}

impl QueryOptions {
    pub fn read() -> Self {
        Self::default()
    }

    pub fn write() -> Self {
        Self {
            operation_type: OperationType::Write,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, use_retry: bool) -> Self {
        self.use_retry = use_retry;
        self
    }

    pub fn without_retry(self) -> Self {
        self.with_retry(false)
    }
}
