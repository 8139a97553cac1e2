//! Background health checking.
//!
//! # Data Flow
//! ```text
//! HealthMonitor (monitor.rs):
//!     Periodic timer
//!     → ManagedDataAccess::health_check (no retry, own deadline)
//!     → Log healthy/unhealthy transitions
//! ```

pub mod monitor;

pub use monitor::HealthMonitor;
