//! Circuit breaker for store protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: store assumed down, calls fail fast
//! - Half-Open: a single probe call tests whether the store recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: first call after open_duration has elapsed
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails (open window restarts)
//! ```
//!
//! State is guarded by a mutex that is never held across the wrapped
//! operation. Admission and probe reservation happen under one lock
//! acquisition, so only one caller can own the half-open probe. Outcomes of
//! calls admitted before a state change carry a stale generation and are
//! ignored.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::time::Instant;

use crate::config::BreakerSettings;
use crate::error::{Error, Result};
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Breaker tuning.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a probe is allowed.
    pub open_duration: Duration,
    /// Quiet period after which a lingering failure count is discarded.
    pub probe_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(30),
            probe_window: Duration::from_secs(60),
        }
    }
}

impl From<&BreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &BreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            open_duration: settings.open_duration(),
            probe_window: settings.probe_window(),
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure_time: Option<SystemTime>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    last_failure_time: Option<SystemTime>,
    generation: u64,
    probe_in_flight: bool,
}

enum Admission {
    Normal { generation: u64 },
    Probe,
}

/// Three-state failure isolation for one downstream resource.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        metrics::record_breaker_state(&name, CircuitState::Closed);
        Self {
            name,
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                last_failure_time: None,
                generation: 0,
                probe_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state without triggering any transition.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Snapshot of the breaker. A failure count older than `probe_window`
    /// is discarded first, exactly as the next call would see it.
    pub fn stats(&self) -> CircuitBreakerStats {
        let mut inner = self.lock();
        self.discard_stale_failures(&mut inner, Instant::now());
        CircuitBreakerStats {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_failure_time: inner.last_failure_time,
        }
    }

    /// Run `operation` through the breaker.
    ///
    /// Any error returned by the operation counts as a failure; rejected
    /// calls fail with `Error::CircuitOpen` without invoking it.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.admit()? {
            Admission::Normal { generation } => {
                let result = operation().await;
                match &result {
                    Ok(_) => self.on_success(generation),
                    Err(_) => self.on_failure(generation),
                }
                result
            }
            Admission::Probe => {
                let guard = ProbeGuard { breaker: self };
                let result = operation().await;
                guard.complete(result.is_ok());
                result
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self) -> Result<Admission> {
        let mut inner = self.lock();
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => {
                self.discard_stale_failures(&mut inner, now);
                Ok(Admission::Normal {
                    generation: inner.generation,
                })
            }
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|at| now.duration_since(at))
                    .unwrap_or(self.config.open_duration);

                if elapsed < self.config.open_duration {
                    metrics::record_breaker_rejection(&self.name);
                    return Err(Error::CircuitOpen {
                        retry_after: self.config.open_duration - elapsed,
                    });
                }

                self.transition(&mut inner, CircuitState::HalfOpen);
                inner.probe_in_flight = true;
                Ok(Admission::Probe)
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    metrics::record_breaker_rejection(&self.name);
                    return Err(Error::CircuitOpen {
                        retry_after: Duration::ZERO,
                    });
                }
                inner.probe_in_flight = true;
                Ok(Admission::Probe)
            }
        }
    }

    fn discard_stale_failures(&self, inner: &mut BreakerState, now: Instant) {
        if inner.state != CircuitState::Closed || inner.consecutive_failures == 0 {
            return;
        }
        let stale = inner
            .last_failure
            .is_some_and(|at| now.duration_since(at) > self.config.probe_window);
        if stale {
            tracing::debug!(
                breaker = %self.name,
                failures = inner.consecutive_failures,
                "Discarding stale failure count"
            );
            inner.consecutive_failures = 0;
        }
    }

    fn on_success(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation {
            inner.consecutive_failures = 0;
        }
    }

    fn on_failure(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }

        inner.consecutive_failures += 1;
        inner.last_failure = Some(Instant::now());
        inner.last_failure_time = Some(SystemTime::now());

        if inner.consecutive_failures >= self.config.failure_threshold {
            self.transition(&mut inner, CircuitState::Open);
        }
    }

    fn on_probe_result(&self, success: bool) {
        let mut inner = self.lock();
        inner.probe_in_flight = false;

        if success {
            inner.consecutive_failures = 0;
            self.transition(&mut inner, CircuitState::Closed);
        } else {
            inner.consecutive_failures += 1;
            inner.last_failure = Some(Instant::now());
            inner.last_failure_time = Some(SystemTime::now());
            self.transition(&mut inner, CircuitState::Open);
        }
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        if inner.state == to {
            return;
        }

        let from = inner.state;
        inner.state = to;
        inner.generation += 1;

        if to == CircuitState::Open {
            tracing::warn!(
                breaker = %self.name,
                from = %from,
                failures = inner.consecutive_failures,
                open_ms = self.config.open_duration.as_millis() as u64,
                "Circuit breaker opened"
            );
        } else {
            tracing::info!(breaker = %self.name, from = %from, to = %to, "Circuit breaker state change");
        }
        metrics::record_breaker_state(&self.name, to);
    }
}

/// Resolves the half-open probe. A probe dropped before completing (for
/// example by a cancelled caller) counts as failed.
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
}

impl ProbeGuard<'_> {
    fn complete(self, success: bool) {
        self.breaker.on_probe_result(success);
        std::mem::forget(self);
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.breaker.on_probe_result(false);
    }
}
