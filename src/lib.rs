//! Resilient data access for the betting backend.
//!
//! Every store call goes through a deadline, a shared circuit breaker and
//! (for reads) bounded retries on store contention.

pub mod config;
pub mod data_access;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod store;

pub use config::DataAccessConfig;
pub use data_access::{
    HealthReport, ManagedDataAccess, OperationType, QueryOptions, QueryResult, Transaction,
};
pub use error::{Error, Result};
pub use lifecycle::Shutdown;
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use store::{Rollback, Row, RunResult, Store, StoreError, StoreErrorKind, StoreTransaction};
