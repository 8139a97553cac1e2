//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! data-access layer. All types derive Serde traits for deserialization from
//! config files, and every field has a default so partial files are valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DataAccessConfig {
    /// Store connection settings.
    pub database: DatabaseConfig,

    /// Circuit breaker tuning.
    pub breaker: BreakerSettings,

    /// Per-query defaults.
    pub queries: QuerySettings,

    /// Backoff between retries.
    pub retry: RetrySettings,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Store connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL (e.g., "sqlite://betting.db").
    pub url: String,

    /// Maximum pooled connections.
    pub max_connections: u32,

    /// How long the driver waits on a locked database before reporting busy.
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://betting.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Time the circuit stays open before a probe, in milliseconds.
    pub open_duration_ms: u64,

    /// Quiet period after which old failures stop counting, in milliseconds.
    pub probe_window_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration_ms: 30_000,
            probe_window_ms: 60_000,
        }
    }
}

impl BreakerSettings {
    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }

    pub fn probe_window(&self) -> Duration {
        Duration::from_millis(self.probe_window_ms)
    }
}

/// Per-query defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Default deadline for a single store call, in milliseconds.
    pub timeout_ms: u64,

    /// Calls slower than this are logged as slow, in milliseconds.
    pub slow_query_ms: u64,

    /// Characters of query text kept in log records.
    pub log_query_chars: usize,

    /// Attempts for reads when retry is enabled.
    pub read_max_attempts: u32,

    /// Attempts for writes when retry is enabled.
    pub write_max_attempts: u32,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            slow_query_ms: 1000,
            log_query_chars: 100,
            read_max_attempts: 3,
            // A partially applied write must not be replayed blindly.
            write_max_attempts: 1,
        }
    }
}

impl QuerySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn slow_query_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_query_ms)
    }
}

/// Backoff settings shared by all retried calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Delay before the first retry in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,

    /// Multiplier applied per attempt.
    pub backoff_factor: f64,

    /// Random widening of each delay (0.0 = exact delays).
    pub jitter_ratio: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 100,
            max_delay_ms: 2000,
            backoff_factor: 2.0,
            jitter_ratio: 0.0,
        }
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the periodic health monitor.
    pub enabled: bool,

    /// Interval between monitor checks in seconds.
    pub interval_secs: u64,

    /// Deadline for a single check in milliseconds.
    pub timeout_ms: u64,

    /// Statement issued by the check.
    pub query: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_ms: 5000,
            query: "SELECT 1".to_string(),
        }
    }
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
