//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! resilience / data_access / health produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! Log records carry truncated query text, never parameter values.

pub mod logging;
pub mod metrics;
