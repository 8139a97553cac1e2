//! Metrics collection and exposition.
//!
//! # Metrics
//! - `db_queries_total` (counter): store calls by kind and outcome
//! - `db_query_duration_seconds` (histogram): call latency by kind
//! - `db_slow_queries_total` (counter): calls over the slow threshold
//! - `db_retries_total` (counter): retry attempts by error class
//! - `db_circuit_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `db_circuit_breaker_rejections_total` (counter): fast-failed calls
//! - `db_transactions_total` (counter): transactions by outcome
//! - `db_health` (gauge): 1=healthy, 0=unhealthy
//! - `db_health_check_duration_seconds` (histogram)
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed with `init_metrics`.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::time::Instant;

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_query(kind: &'static str, outcome: &'static str, start: Instant) {
    metrics::counter!("db_queries_total", "kind" => kind, "outcome" => outcome).increment(1);
    metrics::histogram!("db_query_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_slow_query(kind: &'static str) {
    metrics::counter!("db_slow_queries_total", "kind" => kind).increment(1);
}

pub fn record_retry(error_class: &'static str) {
    metrics::counter!("db_retries_total", "error" => error_class).increment(1);
}

pub fn record_breaker_state(breaker: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    metrics::gauge!("db_circuit_breaker_state", "breaker" => breaker.to_string()).set(value);
}

pub fn record_breaker_rejection(breaker: &str) {
    metrics::counter!("db_circuit_breaker_rejections_total", "breaker" => breaker.to_string())
        .increment(1);
}

pub fn record_transaction(outcome: &'static str) {
    metrics::counter!("db_transactions_total", "outcome" => outcome).increment(1);
}

pub fn record_health(healthy: bool, elapsed: Duration) {
    metrics::gauge!("db_health").set(if healthy { 1.0 } else { 0.0 });
    metrics::histogram!("db_health_check_duration_seconds").record(elapsed.as_secs_f64());
}
