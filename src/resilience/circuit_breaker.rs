//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast to the fallback
//! - Half-Open: a limited number of trial requests check the upstream
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold (within the failure window)
//! Open → Half-Open: after the open duration, on the next permit request
//! Half-Open → Closed: success_threshold trial successes
//! Half-Open → Open: any trial failure (cool-down restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per upstream; breakers share nothing
//! - All state lives behind one mutex so transitions are serialized
//! - Every transition bumps a generation; outcomes from permits issued in an
//!   earlier generation are ignored
//! - A trial permit dropped without an outcome (client went away) returns its slot

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::BreakerPolicy;
use crate::observability::metrics;

/// State of the circuit breaker.
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
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

/// Result of an upstream call, as far as the breaker is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
}

/// Returned when the breaker refuses a call.
#[derive(Debug, Clone, Error)]
#[error("circuit breaker for '{upstream}' is {}", state.as_str())]
pub struct BreakerRejected {
    pub upstream: String,
    pub state: CircuitState,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    generation: u64,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    transitioned_at: Instant,
    transitioned_wall: DateTime<Utc>,
    trials_issued: u32,
    trial_successes: u32,
}

/// Point-in-time view of a breaker, for the actuator endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub upstream: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub trials_in_use: u32,
    pub half_open_trials: u32,
    pub last_transition: DateTime<Utc>,
}

/// Per-upstream circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    upstream: String,
    policy: BreakerPolicy,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(upstream: impl Into<String>, policy: BreakerPolicy) -> Self {
        let upstream = upstream.into();
        metrics::record_breaker_state(&upstream, CircuitState::Closed);
        Self {
            upstream,
            policy,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                generation: 0,
                consecutive_failures: 0,
                last_failure_at: None,
                transitioned_at: Instant::now(),
                transitioned_wall: Utc::now(),
                trials_issued: 0,
                trial_successes: 0,
            }),
        }
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    pub fn policy(&self) -> &BreakerPolicy {
        &self.policy
    }

    /// Ask to call the upstream.
    pub fn permit(self: &Arc<Self>) -> Result<BreakerPermit, BreakerRejected> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open
            && inner.transitioned_at.elapsed() >= self.policy.open_duration()
        {
            self.transition(&mut inner, CircuitState::HalfOpen);
        }

        match inner.state {
            CircuitState::Closed => Ok(BreakerPermit::new(self.clone(), inner.generation, false)),
            CircuitState::HalfOpen if inner.trials_issued < self.policy.half_open_trials => {
                inner.trials_issued += 1;
                tracing::debug!(
                    upstream = %self.upstream,
                    trial = inner.trials_issued,
                    "Circuit breaker admitted trial request"
                );
                Ok(BreakerPermit::new(self.clone(), inner.generation, true))
            }
            state => Err(BreakerRejected {
                upstream: self.upstream.clone(),
                state,
            }),
        }
    }

    /// Classify an upstream response status.
    pub fn classify_status(&self, status: StatusCode) -> CallOutcome {
        if self.policy.failure_status_codes.contains(&status.as_u16()) {
            CallOutcome::Failure
        } else {
            CallOutcome::Success
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            upstream: self.upstream.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            failure_threshold: self.policy.failure_threshold,
            trials_in_use: inner.trials_issued,
            half_open_trials: self.policy.half_open_trials,
            last_transition: inner.transitioned_wall,
        }
    }

    fn record(&self, generation: u64, outcome: CallOutcome) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            tracing::debug!(
                upstream = %self.upstream,
                outcome = ?outcome,
                "Ignoring outcome from an earlier breaker state"
            );
            return;
        }

        match (inner.state, outcome) {
            (CircuitState::Closed, CallOutcome::Success) => {
                inner.consecutive_failures = 0;
                inner.last_failure_at = None;
            }
            (CircuitState::Closed, CallOutcome::Failure) => {
                let now = Instant::now();
                let window = self.policy.failure_window();
                if inner
                    .last_failure_at
                    .is_some_and(|last| now.duration_since(last) > window)
                {
                    inner.consecutive_failures = 0;
                }
                inner.consecutive_failures += 1;
                inner.last_failure_at = Some(now);

                if inner.consecutive_failures >= self.policy.failure_threshold {
                    tracing::warn!(
                        upstream = %self.upstream,
                        failures = inner.consecutive_failures,
                        threshold = self.policy.failure_threshold,
                        "Circuit breaker opening - too many failures"
                    );
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            (CircuitState::HalfOpen, CallOutcome::Success) => {
                inner.trial_successes += 1;
                if inner.trial_successes >= self.policy.success_threshold {
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            (CircuitState::HalfOpen, CallOutcome::Failure) => {
                tracing::warn!(upstream = %self.upstream, "Circuit breaker trial failed, reopening");
                self.transition(&mut inner, CircuitState::Open);
            }
            (CircuitState::Open, _) => {}
        }
    }

    fn release_trial(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation == generation
            && inner.state == CircuitState::HalfOpen
            && inner.trials_issued > 0
        {
            inner.trials_issued -= 1;
            tracing::debug!(upstream = %self.upstream, "Trial request abandoned, slot released");
        }
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.generation += 1;
        inner.transitioned_at = Instant::now();
        inner.transitioned_wall = Utc::now();
        inner.trials_issued = 0;
        inner.trial_successes = 0;
        if to != CircuitState::Open {
            inner.consecutive_failures = 0;
            inner.last_failure_at = None;
        }

        match to {
            CircuitState::Open => tracing::warn!(
                upstream = %self.upstream,
                from = from.as_str(),
                open_for_ms = self.policy.open_duration_ms,
                "Circuit breaker OPEN"
            ),
            _ => tracing::info!(
                upstream = %self.upstream,
                from = from.as_str(),
                to = to.as_str(),
                "Circuit breaker transition"
            ),
        }
        metrics::record_breaker_state(&self.upstream, to);
    }
}

/// Permission to make one upstream call.
///
/// Settle it with [`BreakerPermit::record`]. Dropping an unsettled trial
/// permit returns the trial slot without counting an outcome.
#[derive(Debug)]
pub struct BreakerPermit {
    breaker: Arc<CircuitBreaker>,
    generation: u64,
    trial: bool,
    settled: bool,
}

impl BreakerPermit {
    fn new(breaker: Arc<CircuitBreaker>, generation: u64, trial: bool) -> Self {
        Self {
            breaker,
            generation,
            trial,
            settled: false,
        }
    }

    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// Report how the call went.
    pub fn record(mut self, outcome: CallOutcome) {
        self.settled = true;
        self.breaker.record(self.generation, outcome);
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial(self.generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn breaker(threshold: u32, trials: u32, successes: u32) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(
            "auth-service",
            BreakerPolicy {
                failure_threshold: threshold,
                failure_window_secs: 60,
                open_duration_ms: 1_000,
                half_open_trials: trials,
                success_threshold: successes,
                failure_status_codes: vec![500, 502, 503, 504],
            },
        ))
    }

    fn fail(cb: &Arc<CircuitBreaker>) {
        cb.permit().unwrap().record(CallOutcome::Failure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold() {
        let cb = breaker(3, 1, 1);
        fail(&cb);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Open);

        let rejected = cb.permit().unwrap_err();
        assert_eq!(rejected.state, CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_consecutive_failures() {
        let cb = breaker(3, 1, 1);
        fail(&cb);
        fail(&cb);
        cb.permit().unwrap().record(CallOutcome::Success);
        fail(&cb);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_outside_window_restart_count() {
        let cb = breaker(3, 1, 1);
        fail(&cb);
        fail(&cb);
        tokio::time::advance(Duration::from_secs(61)).await;
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().consecutive_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_configured_trials_only() {
        let cb = breaker(1, 1, 1);
        fail(&cb);
        assert!(cb.permit().is_err());

        tokio::time::advance(Duration::from_millis(1_000)).await;
        let trial = cb.permit().unwrap();
        assert!(trial.is_trial());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.permit().is_err(), "only one trial slot is configured");

        trial.record(CallOutcome::Success);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(!cb.permit().unwrap().is_trial());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_failure_reopens_and_restarts_cooldown() {
        let cb = breaker(1, 1, 1);
        fail(&cb);
        tokio::time::advance(Duration::from_millis(1_000)).await;

        cb.permit().unwrap().record(CallOutcome::Failure);
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(cb.permit().is_err());
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(cb.permit().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_threshold_across_trials() {
        let cb = breaker(1, 3, 2);
        fail(&cb);
        tokio::time::advance(Duration::from_millis(1_000)).await;

        let t1 = cb.permit().unwrap();
        let t2 = cb.permit().unwrap();
        let t3 = cb.permit().unwrap();
        assert!(cb.permit().is_err());

        t1.record(CallOutcome::Success);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        t2.record(CallOutcome::Success);
        assert_eq!(cb.state(), CircuitState::Closed);

        // Late outcome from the previous generation is ignored.
        t3.record(CallOutcome::Failure);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_trial_releases_slot() {
        let cb = breaker(1, 1, 1);
        fail(&cb);
        tokio::time::advance(Duration::from_millis(1_000)).await;

        let trial = cb.permit().unwrap();
        assert!(cb.permit().is_err());
        drop(trial);
        assert!(cb.permit().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_failures_open_once() {
        let cb = breaker(3, 1, 1);
        let permits: Vec<_> = (0..10).map(|_| cb.permit().unwrap()).collect();
        for permit in permits {
            permit.record(CallOutcome::Failure);
        }
        assert_eq!(cb.state(), CircuitState::Open);
        // The seven stale failures did not touch the open breaker.
        assert_eq!(cb.snapshot().consecutive_failures, 3);
    }

    #[test]
    fn test_classify_status() {
        let cb = breaker(3, 1, 1);
        assert_eq!(cb.classify_status(StatusCode::SERVICE_UNAVAILABLE), CallOutcome::Failure);
        assert_eq!(cb.classify_status(StatusCode::NOT_FOUND), CallOutcome::Success);
        assert_eq!(cb.classify_status(StatusCode::NOT_IMPLEMENTED), CallOutcome::Success);
        assert_eq!(cb.classify_status(StatusCode::OK), CallOutcome::Success);
    }
}
