//! Periodic health checking.
//!
//! # Responsibilities
//! - Run the managed health check on an interval
//! - Log transitions between healthy and unhealthy
//! - Stop on the shutdown broadcast

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::data_access::{HealthReport, ManagedDataAccess};

pub struct HealthMonitor {
    access: Arc<ManagedDataAccess>,
    config: HealthCheckConfig,
    healthy: Option<bool>,
}

impl HealthMonitor {
    pub fn new(access: Arc<ManagedDataAccess>, config: HealthCheckConfig) -> Self {
        Self {
            access,
            config,
            healthy: None,
        }
    }

    /// Last observed health, `None` before the first check.
    pub fn is_healthy(&self) -> Option<bool> {
        self.healthy
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Health checks disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.config.interval_secs,
            query = %self.config.query,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run one check and record the transition, if any.
    pub async fn check(&mut self) -> HealthReport {
        let report = self.access.health_check().await;
        let breaker = self.access.circuit_breaker_stats();

        match (self.healthy, report.is_healthy) {
            (Some(false), true) => tracing::info!(
                response_time_ms = report.response_time_ms,
                "Database recovered"
            ),
            (None | Some(true), false) => tracing::warn!(
                response_time_ms = report.response_time_ms,
                error = report.error_message.as_deref().unwrap_or("unknown"),
                breaker_state = %breaker.state,
                consecutive_failures = breaker.consecutive_failures,
                "Database unhealthy"
            ),
            _ => tracing::debug!(
                healthy = report.is_healthy,
                response_time_ms = report.response_time_ms,
                "Health check complete"
            ),
        }

        self.healthy = Some(report.is_healthy);
        report
    }
}
