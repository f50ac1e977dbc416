//! Bounded retry for transient provider failures.
//!
//! Only errors classified by [`SearchError::is_transient`] are retried.
//! Malformed responses and credential problems fail on the first attempt so
//! that a broken provider cannot cause a retry storm.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::SearchError;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// `delay * attempt`: 1x, 2x, 3x...
    Incremental,
}

/// Retry policy for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Base delay between attempts in milliseconds.
    pub delay_ms: u64,
    pub backoff: Backoff,
    /// Upper bound of random jitter added to each delay, in milliseconds.
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay_ms: 250,
            backoff: Backoff::Fixed,
            jitter_ms: 50,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let base = match self.backoff {
            Backoff::Fixed => self.delay_ms,
            Backoff::Incremental => self.delay_ms.saturating_mul(u64::from(attempt)),
        };
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        };
        Duration::from_millis(base.saturating_add(jitter))
    }
}

/// Run `operation` until it succeeds, fails permanently, or runs out of
/// attempts. Returns the last error on failure.
pub async fn retry<F, Fut, T>(
    provider: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, SearchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SearchError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(provider, attempt, "provider call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = config.delay_after(attempt);
                tracing::debug!(
                    provider,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient provider failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            delay_ms: 1,
            backoff: Backoff::Fixed,
            jitter_ms: 0,
        }
    }

    #[test]
    fn fixed_delay_is_constant() {
        let config = RetryConfig {
            delay_ms: 100,
            jitter_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.delay_after(1), Duration::from_millis(100));
        assert_eq!(config.delay_after(3), Duration::from_millis(100));
    }

    #[test]
    fn incremental_delay_grows() {
        let config = RetryConfig {
            delay_ms: 100,
            backoff: Backoff::Incremental,
            jitter_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.delay_after(1), Duration::from_millis(100));
        assert_eq!(config.delay_after(2), Duration::from_millis(200));
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let config = RetryConfig {
            delay_ms: 10,
            jitter_ms: 5,
            ..Default::default()
        };
        for _ in 0..50 {
            let d = config.delay_after(1);
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(15));
        }
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry("test", &quick(3), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(SearchError::Http("connection reset".into()))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.expect("third attempt succeeds"), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry("test", &quick(2), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SearchError::Timeout("slow".into()))
        })
        .await;
        assert!(matches!(result, Err(SearchError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry("test", &quick(3), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SearchError::Parse("unexpected body".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let _ = retry("test", &quick(0), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, SearchError>(())
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
