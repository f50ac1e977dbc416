//! Fault isolation for external providers.
//!
//! Every provider call goes through a [`ResilienceGuard`], which layers a
//! whole-call time budget, bounded [`retry`] and a rolling-window
//! [`CircuitBreaker`] around the raw [`BookProvider`](crate::provider::BookProvider).
//! A guard never surfaces an error to its caller: failures become an empty
//! result plus a recorded health status.

pub mod circuit_breaker;
pub mod guard;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use guard::{GuardMetrics, ResilienceGuard};
pub use retry::{retry, Backoff, RetryConfig};
