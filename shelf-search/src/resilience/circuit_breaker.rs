//! Per-provider circuit breaker over a rolling window of call outcomes.
//!
//! Keeps the outcomes of the last `window_size` calls. Once at least
//! `minimum_calls` outcomes are recorded and the failure rate reaches
//! `failure_rate_threshold`, the circuit opens and every call is rejected
//! without I/O for the cooldown period. After the cooldown a limited number
//! of trial calls are let through; if all succeed the circuit closes, a
//! single failure re-opens it.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐ failure rate ≥ T ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├─────────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘                  └────────┘             └────┬─────┘
//!     │                            ▲                      │
//!     │  all trials succeed        │  any trial fails     │
//!     └────────────────────────────┴──────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Provider is healthy; all calls pass through.
    Closed,
    /// Failure rate crossed the threshold; calls are rejected until cooldown expires.
    Open,
    /// Cooldown elapsed; a few trial calls decide whether to close or re-open.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::HalfOpen => write!(f, "half_open"),
            Self::Open => write!(f, "open"),
        }
    }
}

/// Configuration for circuit breaker behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of most recent outcomes considered.
    pub window_size: u32,
    /// Outcomes required in the window before the rate is evaluated.
    pub minimum_calls: u32,
    /// Failure fraction in `(0, 1]` that trips the circuit.
    pub failure_rate_threshold: f64,
    /// Milliseconds to stay Open before allowing trial calls.
    pub cooldown_ms: u64,
    /// Trial calls permitted while HalfOpen.
    pub half_open_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::strict()
    }
}

impl CircuitBreakerConfig {
    /// Primary providers: trips early, waits longer before probing.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            window_size: 10,
            minimum_calls: 5,
            failure_rate_threshold: 0.5,
            cooldown_ms: 60_000,
            half_open_calls: 3,
        }
    }

    /// Secondary providers: tolerates more failures, recovers sooner.
    #[must_use]
    pub fn tolerant() -> Self {
        Self {
            window_size: 20,
            minimum_calls: 10,
            failure_rate_threshold: 0.7,
            cooldown_ms: 30_000,
            half_open_calls: 2,
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    /// `true` marks a failure. Oldest outcome at the front.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    trials_started: u32,
    trials_succeeded: u32,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            window: VecDeque::new(),
            opened_at: None,
            trials_started: 0,
            trials_succeeded: 0,
        }
    }
}

/// Circuit breaker guarding one provider.
///
/// One instance per provider for the process lifetime, shared by reference
/// between concurrent requests. All state sits behind a single mutex that
/// is never held across an `.await`.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState::closed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ask permission to perform a call.
    ///
    /// - Closed: always granted.
    /// - Open: granted only once the cooldown has elapsed, which moves the
    ///   circuit to HalfOpen and consumes the first trial.
    /// - HalfOpen: granted while trial permits remain.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled = inner
                    .opened_at
                    .is_none_or(|t| t.elapsed() >= self.config.cooldown());
                if cooled {
                    tracing::debug!(provider = %self.name, "circuit half-open, probing");
                    inner.state = CircuitState::HalfOpen;
                    inner.trials_started = 1;
                    inner.trials_succeeded = 0;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.trials_started < self.config.half_open_calls.max(1) {
                    inner.trials_started += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => self.push_outcome(&mut inner, false),
            CircuitState::HalfOpen => {
                inner.trials_succeeded += 1;
                if inner.trials_succeeded >= self.config.half_open_calls.max(1) {
                    tracing::info!(provider = %self.name, "circuit closed");
                    *inner = BreakerState::closed();
                }
            }
            // A call admitted before the circuit opened finished late.
            CircuitState::Open => {}
        }
    }

    /// Record a failed call, opening the circuit when the threshold is met.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                self.push_outcome(&mut inner, true);
                let len = inner.window.len() as u32;
                if len >= self.config.minimum_calls.max(1) {
                    let failures = inner.window.iter().filter(|f| **f).count() as f64;
                    let rate = failures / f64::from(len);
                    if rate >= self.config.failure_rate_threshold {
                        tracing::warn!(
                            provider = %self.name,
                            failure_rate = rate,
                            "circuit opened"
                        );
                        Self::trip(&mut inner);
                    }
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!(provider = %self.name, "trial call failed, circuit re-opened");
                Self::trip(&mut inner);
            }
            CircuitState::Open => {}
        }
    }

    fn push_outcome(&self, inner: &mut BreakerState, failed: bool) {
        inner.window.push_back(failed);
        while inner.window.len() > self.config.window_size.max(1) as usize {
            inner.window.pop_front();
        }
    }

    fn trip(inner: &mut BreakerState) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.window.clear();
        inner.trials_started = 0;
        inner.trials_succeeded = 0;
    }

    /// Current circuit state.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Failure fraction over the current window, if any outcomes are recorded.
    pub fn failure_rate(&self) -> Option<f64> {
        let inner = self.lock();
        if inner.window.is_empty() {
            return None;
        }
        let failures = inner.window.iter().filter(|f| **f).count() as f64;
        Some(failures / inner.window.len() as f64)
    }

    /// Return to Closed with an empty window.
    pub fn reset(&self) {
        *self.lock() = BreakerState::closed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_breaker(window: u32, minimum: u32, threshold: f64, cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                window_size: window,
                minimum_calls: minimum,
                failure_rate_threshold: threshold,
                cooldown_ms,
                half_open_calls: 2,
            },
        )
    }

    #[test]
    fn initial_state_is_closed() {
        let breaker = make_breaker(10, 5, 0.5, 60_000);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.try_acquire());
        assert!(breaker.failure_rate().is_none());
    }

    #[test]
    fn stays_closed_below_minimum_calls() {
        let breaker = make_breaker(10, 5, 0.5, 60_000);
        for _ in 0..4 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn trips_when_rate_reaches_threshold() {
        let breaker = make_breaker(10, 4, 0.5, 60_000);
        breaker.record_success();
        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn stays_closed_below_threshold() {
        let breaker = make_breaker(10, 4, 0.5, 60_000);
        for _ in 0..3 {
            breaker.record_success();
        }
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!((breaker.failure_rate().expect("rate") - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn window_forgets_old_outcomes() {
        let breaker = make_breaker(4, 4, 0.75, 60_000);
        breaker.record_failure();
        breaker.record_failure();
        for _ in 0..4 {
            breaker.record_success();
        }
        // Window now holds only the four successes.
        assert_eq!(breaker.failure_rate(), Some(0.0));
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn open_blocks_attempts() {
        let breaker = make_breaker(2, 2, 0.5, 600_000);
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.try_acquire());
        assert!(!breaker.try_acquire());
    }

    #[test]
    fn open_transitions_to_half_open_after_cooldown() {
        let breaker = make_breaker(2, 2, 0.5, 0);
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.try_acquire());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_limits_trial_calls() {
        let breaker = make_breaker(2, 2, 0.5, 0);
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.try_acquire());
        assert!(breaker.try_acquire());
        assert!(!breaker.try_acquire(), "only two trials permitted");
    }

    #[test]
    fn half_open_successes_close_circuit() {
        let breaker = make_breaker(2, 2, 0.5, 0);
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.try_acquire());
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.try_acquire());
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.failure_rate().is_none());
    }

    #[test]
    fn half_open_failure_retrips() {
        let breaker = make_breaker(2, 2, 0.5, 0);
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.try_acquire());
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn late_results_while_open_are_ignored() {
        let breaker = make_breaker(2, 2, 0.5, 600_000);
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn reset_clears_all_state() {
        let breaker = make_breaker(2, 2, 0.5, 600_000);
        breaker.record_failure();
        breaker.record_failure();
        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.try_acquire());
    }

    #[test]
    fn presets_differ_in_tolerance() {
        let strict = CircuitBreakerConfig::strict();
        let tolerant = CircuitBreakerConfig::tolerant();
        assert!(strict.failure_rate_threshold < tolerant.failure_rate_threshold);
        assert!(strict.minimum_calls < tolerant.minimum_calls);
    }

    #[test]
    fn circuit_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "closed");
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
        assert_eq!(CircuitState::Open.to_string(), "open");
    }
}
