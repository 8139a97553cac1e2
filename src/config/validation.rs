//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds, attempts, timeouts)
//! - Check related fields agree (base delay within max delay)
//!
//! Returns every problem found rather than stopping at the first.

use std::net::SocketAddr;

use crate::config::schema::DataAccessConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &DataAccessConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.database.url.trim().is_empty() {
        errors.push(ValidationError::new("database.url", "must not be empty"));
    }
    if config.database.max_connections == 0 {
        errors.push(ValidationError::new("database.max_connections", "must be at least 1"));
    }

    if config.breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("breaker.failure_threshold", "must be at least 1"));
    }
    if config.breaker.open_duration_ms == 0 {
        errors.push(ValidationError::new("breaker.open_duration_ms", "must be greater than 0"));
    }

    if config.queries.timeout_ms == 0 {
        errors.push(ValidationError::new("queries.timeout_ms", "must be greater than 0"));
    }
    if config.queries.read_max_attempts == 0 {
        errors.push(ValidationError::new("queries.read_max_attempts", "must be at least 1"));
    }
    if config.queries.write_max_attempts == 0 {
        errors.push(ValidationError::new("queries.write_max_attempts", "must be at least 1"));
    }

    if !(config.retry.backoff_factor >= 1.0) {
        errors.push(ValidationError::new(
            "retry.backoff_factor",
            format!("must be >= 1.0, got {}", config.retry.backoff_factor),
        ));
    }
    if !(0.0..=1.0).contains(&config.retry.jitter_ratio) {
        errors.push(ValidationError::new("retry.jitter_ratio", "must be between 0.0 and 1.0"));
    }
    if config.retry.base_delay_ms > config.retry.max_delay_ms {
        errors.push(ValidationError::new(
            "retry.base_delay_ms",
            format!(
                "{} exceeds retry.max_delay_ms {}",
                config.retry.base_delay_ms, config.retry.max_delay_ms
            ),
        ));
    }

    if config.health_check.timeout_ms == 0 {
        errors.push(ValidationError::new("health_check.timeout_ms", "must be greater than 0"));
    }
    if config.health_check.enabled && config.health_check.interval_secs == 0 {
        errors.push(ValidationError::new("health_check.interval_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
