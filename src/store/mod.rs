//! Storage collaborator boundary.
//!
//! # Data Flow
//! ```text
//! ManagedDataAccess
//!     → Store::get / all / run      (single statements)
//!     → Store::begin                (StoreTransaction: get / all / run / commit / rollback)
//! ```
//!
//! Stores report failures as `StoreError` carrying a `StoreErrorKind`; the
//! data-access layer turns the kind into its own error taxonomy and never
//! inspects driver messages.

#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// A result row keyed by column name.
pub type Row = Map<String, Value>;

/// What `StoreTransaction::rollback` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollback {
    /// The store rolled the transaction back.
    RolledBack,
    /// The handle was already released (e.g. consumed by a failed commit);
    /// the store discarded the writes when it was dropped.
    Released,
}

/// Outcome of a mutating statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunResult {
    /// Rows changed by the statement.
    pub changes: u64,
    /// Row id of the last inserted row, when the store exposes one.
    pub last_id: Option<i64>,
}

/// Failure classes a store can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    Busy,
    Locked,
    LockTimeout,
    ConnectionReset,
    Unavailable,
    Constraint,
    Syntax,
    Other,
}

/// Error reported by a `Store` implementation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Query execution primitive the data-access layer runs on.
///
/// Implementations must be safe for concurrent use; the layer does not
/// serialize access beyond what the circuit breaker imposes.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch at most one row.
    async fn get(&self, query: &str, params: &[Value]) -> Result<Option<Row>, StoreError>;

    /// Fetch every row.
    async fn all(&self, query: &str, params: &[Value]) -> Result<Vec<Row>, StoreError>;

    /// Execute a mutating statement.
    async fn run(&self, query: &str, params: &[Value]) -> Result<RunResult, StoreError>;

    /// Open a transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

/// An open store-level transaction.
///
/// Dropping a transaction that was neither committed nor rolled back must
/// discard its writes.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn get(&mut self, query: &str, params: &[Value]) -> Result<Option<Row>, StoreError>;

    async fn all(&mut self, query: &str, params: &[Value]) -> Result<Vec<Row>, StoreError>;

    async fn run(&mut self, query: &str, params: &[Value]) -> Result<RunResult, StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<Rollback, StoreError>;
}
