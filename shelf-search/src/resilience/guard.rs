//! Per-provider guard combining timeout, retry and circuit breaking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::circuit_breaker::{CircuitBreaker, CircuitState};
use super::retry::{retry, RetryConfig};
use crate::config::{ProviderConfig, ProviderPriority};
use crate::error::{Result, SearchError};
use crate::provider::{BookProvider, ProviderRequest};
use crate::types::{BookRecord, BookSource, ProviderHealthStatus};

#[derive(Debug, Default)]
struct GuardStatus {
    last_error: Option<String>,
    disabled: bool,
}

/// Call counters for one guard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardMetrics {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    /// Calls refused without I/O (circuit open or provider disabled).
    pub rejections: u64,
}

/// Wraps one [`BookProvider`] so that its failures stay contained.
///
/// One guard per provider, shared by every request for the process
/// lifetime.
pub struct ResilienceGuard {
    provider: Arc<dyn BookProvider>,
    priority: ProviderPriority,
    call_timeout: Duration,
    retry: RetryConfig,
    breaker: CircuitBreaker,
    status: Mutex<GuardStatus>,
    calls: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
}

impl std::fmt::Debug for ResilienceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceGuard")
            .field("provider", &self.source())
            .field("priority", &self.priority)
            .field("circuit", &self.breaker.state())
            .finish()
    }
}

impl ResilienceGuard {
    /// Build a guard from the provider's configuration.
    pub fn new(provider: Arc<dyn BookProvider>, config: &ProviderConfig) -> Self {
        let name = provider.source().name();
        Self {
            provider,
            priority: config.priority,
            call_timeout: config.timeout.call(),
            retry: config.retry.clone(),
            breaker: CircuitBreaker::new(name, config.breaker.clone()),
            status: Mutex::new(GuardStatus::default()),
            calls: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> BookSource {
        self.provider.source()
    }

    pub fn name(&self) -> &'static str {
        self.provider.source().name()
    }

    pub fn priority(&self) -> ProviderPriority {
        self.priority
    }

    fn status(&self) -> MutexGuard<'_, GuardStatus> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_disabled(&self) -> bool {
        self.status().disabled
    }

    /// Run `request` against the provider.
    ///
    /// Returns the provider's records on success and an empty list on any
    /// failure, rejection or timeout. Never panics or errors.
    pub async fn call(&self, request: &ProviderRequest) -> Vec<BookRecord> {
        match self.try_call(request).await {
            Ok(records) => records,
            Err(err) => {
                tracing::debug!(
                    provider = self.name(),
                    error = %err,
                    "guarded call yielded nothing"
                );
                Vec::new()
            }
        }
    }

    /// Like [`call`](Self::call) but reports why nothing came back.
    ///
    /// # Errors
    ///
    /// [`SearchError::ProviderDisabled`] or [`SearchError::CircuitOpen`] when
    /// the call was refused without I/O; otherwise the provider's own error
    /// or [`SearchError::Timeout`]. Refusals do not count as failures.
    pub async fn try_call(&self, request: &ProviderRequest) -> Result<Vec<BookRecord>> {
        let provider = self.name();

        if self.status().disabled {
            self.rejections.fetch_add(1, Ordering::Relaxed);
            return Err(SearchError::ProviderDisabled(provider.to_owned()));
        }
        if !self.breaker.try_acquire() {
            self.rejections.fetch_add(1, Ordering::Relaxed);
            return Err(SearchError::CircuitOpen(provider.to_owned()));
        }

        self.calls.fetch_add(1, Ordering::Relaxed);
        let attempt = retry(provider, &self.retry, || {
            request.dispatch(self.provider.as_ref())
        });
        let outcome = match tokio::time::timeout(self.call_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout(format!(
                "{provider} exceeded {}ms call budget",
                self.call_timeout.as_millis()
            ))),
        };

        match outcome {
            Ok(records) => {
                self.on_success();
                tracing::debug!(provider, count = records.len(), "provider call succeeded");
                Ok(records)
            }
            Err(err) => {
                self.on_failure(&err);
                Err(err)
            }
        }
    }

    fn on_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.breaker.record_success();
        self.status().last_error = None;
    }

    fn on_failure(&self, err: &SearchError) {
        let provider = self.name();
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.breaker.record_failure();
        let mut status = self.status();
        status.last_error = Some(err.to_string());
        if err.is_misconfiguration() {
            status.disabled = true;
            tracing::error!(provider, error = %err, "provider misconfigured, disabled until reset");
        } else {
            tracing::warn!(
                provider,
                error = %err,
                failure_rate = self.breaker.failure_rate().unwrap_or_default(),
                "provider call failed"
            );
        }
    }

    /// Point-in-time health for this provider.
    pub fn health(&self) -> ProviderHealthStatus {
        let circuit_state = self.breaker.state();
        let status = self.status();
        ProviderHealthStatus {
            provider_name: self.name().to_owned(),
            healthy: !status.disabled
                && circuit_state == CircuitState::Closed
                && status.last_error.is_none(),
            last_error_message: status.last_error.clone(),
            circuit_state,
            disabled: status.disabled,
        }
    }

    /// Close the circuit, clear the last error and re-enable the provider.
    pub fn reset(&self) {
        self.breaker.reset();
        *self.status() = GuardStatus::default();
        tracing::info!(provider = self.name(), "provider guard reset");
    }

    pub fn metrics(&self) -> GuardMetrics {
        GuardMetrics {
            calls: self.calls.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
        }
    }
}
