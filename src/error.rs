//! Error taxonomy for the data-access layer.
//!
//! # Classes
//! - Transient store errors (busy, locked, lock timeout): retryable
//! - Query timeout: deadline exceeded, not retried within the same call
//! - Circuit open: breaker rejected the call before touching the store
//! - Data errors (constraint, bad SQL): never retried
//!
//! Services in front of this layer map `status_code()` onto their own
//! responses: unavailability classes become 503, data errors 4xx.

use std::time::Duration;

use crate::store::{StoreError, StoreErrorKind};

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Contention failures that are expected to clear on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    Busy,
    Locked,
    LockTimeout,
}

impl std::fmt::Display for TransientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransientKind::Busy => write!(f, "busy"),
            TransientKind::Locked => write!(f, "locked"),
            TransientKind::LockTimeout => write!(f, "lock timeout"),
        }
    }
}

/// Permanent failures caused by the statement or the data itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataErrorKind {
    Constraint,
    Syntax,
    Other,
}

impl std::fmt::Display for DataErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataErrorKind::Constraint => write!(f, "constraint violation"),
            DataErrorKind::Syntax => write!(f, "invalid statement"),
            DataErrorKind::Other => write!(f, "data error"),
        }
    }
}

/// Errors surfaced by the managed data-access layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transient store error ({kind}): {message}")]
    TransientStore { kind: TransientKind, message: String },

    #[error("query timed out after {}ms", .timeout.as_millis())]
    QueryTimeout { timeout: Duration },

    #[error("circuit breaker is open, retry in {}ms", .retry_after.as_millis())]
    CircuitOpen { retry_after: Duration },

    #[error("{kind}: {message}")]
    Data { kind: DataErrorKind, message: String },

    #[error("connection reset: {message}")]
    ConnectionReset { message: String },

    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    #[error("failed to decode row: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// Busy, locked or lock-timeout failures.
    pub fn is_store_contention(&self) -> bool {
        matches!(self, Error::TransientStore { .. })
    }

    /// Failures expected to resolve without intervention: contention,
    /// timeouts, dropped connections and unavailability.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::TransientStore { .. }
                | Error::QueryTimeout { .. }
                | Error::ConnectionReset { .. }
                | Error::Unavailable { .. }
        )
    }

    /// HTTP-equivalent status for callers that expose this layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::TransientStore { .. }
            | Error::QueryTimeout { .. }
            | Error::CircuitOpen { .. }
            | Error::ConnectionReset { .. }
            | Error::Unavailable { .. } => 503,
            Error::Data {
                kind: DataErrorKind::Constraint,
                ..
            } => 409,
            Error::Data { .. } => 400,
            Error::Decode(_) => 500,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn class(&self) -> &'static str {
        match self {
            Error::TransientStore { .. } => "transient",
            Error::QueryTimeout { .. } => "timeout",
            Error::CircuitOpen { .. } => "circuit_open",
            Error::Data { .. } => "data",
            Error::ConnectionReset { .. } => "connection_reset",
            Error::Unavailable { .. } => "unavailable",
            Error::Decode(_) => "decode",
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        let message = err.message;
        match err.kind {
            StoreErrorKind::Busy => Error::TransientStore {
                kind: TransientKind::Busy,
                message,
            },
            StoreErrorKind::Locked => Error::TransientStore {
                kind: TransientKind::Locked,
                message,
            },
            StoreErrorKind::LockTimeout => Error::TransientStore {
                kind: TransientKind::LockTimeout,
                message,
            },
            StoreErrorKind::ConnectionReset => Error::ConnectionReset { message },
            StoreErrorKind::Unavailable => Error::Unavailable { message },
            StoreErrorKind::Constraint => Error::Data {
                kind: DataErrorKind::Constraint,
                message,
            },
            StoreErrorKind::Syntax => Error::Data {
                kind: DataErrorKind::Syntax,
                message,
            },
            StoreErrorKind::Other => Error::Data {
                kind: DataErrorKind::Other,
                message,
            },
        }
    }
}
