//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DataAccessConfig (validated, immutable)
//!     → handed to ManagedDataAccess / HealthMonitor at startup
//! ```
//!
//! All fields have defaults so a missing section falls back to the
//! built-in values. Validation separates syntactic (serde) from semantic
//! checks.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BreakerSettings, DataAccessConfig, DatabaseConfig, HealthCheckConfig, LogFormat,
    ObservabilityConfig, QuerySettings, RetrySettings,
};
pub use validation::ValidationError;
