//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Store call:
//!     → retries.rs (repeat retryable failures with backoff.rs delays)
//!     → circuit_breaker.rs (fail fast while the store is known-bad)
//!     → timeouts.rs (race the call against its deadline)
//! ```
//!
//! Each piece is usable on its own; `data_access` composes them.

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use retries::{execute_with_retry, RetryConfig, RetryOn};
pub use timeouts::with_deadline;
