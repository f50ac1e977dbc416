//! Search configuration with sensible defaults.
//!
//! [`SearchConfig`] controls local ranking limits, cache lifetimes, the
//! dedup fallback policy and one [`ProviderConfig`] per external provider.
//! Every struct is `#[serde(default)]` so a TOML file only needs to name
//! the values it changes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SearchError;
use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use crate::types::BookSource;

/// Server-side ceiling on records per page, whatever the configuration says.
pub const LOCAL_RESULT_CEILING: usize = 100;

/// Top-level configuration for the search engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub local: LocalConfig,
    pub cache: CacheConfig,
    /// How records without a matching ISBN are recognised as duplicates.
    pub dedup: DedupPolicy,
    /// External providers, in no particular order; precedence comes from
    /// each entry's `priority`.
    pub providers: Vec<ProviderConfig>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            local: LocalConfig::default(),
            cache: CacheConfig::default(),
            dedup: DedupPolicy::default(),
            providers: vec![ProviderConfig::open_library(), ProviderConfig::google_books()],
        }
    }
}

/// Local relevance engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Maximum records on one returned page; a larger requested `size` is
    /// reduced to it. Clamped to [`LOCAL_RESULT_CEILING`]. Every local match
    /// stays reachable through later pages.
    pub max_results: usize,
    /// Below this many local matches, providers are consulted even when the
    /// caller did not ask for external results.
    pub min_local_results: usize,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            max_results: 50,
            min_local_results: 5,
        }
    }
}

impl LocalConfig {
    /// The effective page ceiling after applying the server-side limit.
    pub fn effective_max_results(&self) -> usize {
        self.max_results.clamp(1, LOCAL_RESULT_CEILING)
    }
}

/// Result cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// TTL for general searches, in seconds.
    pub general_ttl_secs: u64,
    /// TTL for single-field lookups (title, author, ISBN), in seconds.
    pub narrow_ttl_secs: u64,
    pub max_entries: u64,
    /// How often the background sweeper evicts expired entries, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            general_ttl_secs: 15 * 60,
            narrow_ttl_secs: 10 * 60,
            max_entries: 1_000,
            sweep_interval_secs: 60,
        }
    }
}

/// Duplicate detection for records that cannot be matched by ISBN.
///
/// The title-only fallback collapses distinct editions, and even different
/// books by different authors that share a title. It is kept as an explicit
/// option rather than the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// ISBN first, then normalised title + author.
    #[default]
    IsbnThenTitleAuthor,
    /// ISBN first, then normalised title alone.
    IsbnThenTitle,
    /// Only records sharing an ISBN are duplicates.
    IsbnOnly,
}

/// Precedence tier of an external provider. Local results always come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderPriority {
    Primary,
    Secondary,
}

/// Connect, per-attempt and whole-call time limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect_ms: u64,
    /// Per-attempt limit applied by the HTTP client.
    pub read_ms: u64,
    /// Budget for the whole guarded call including retries. The orchestrator
    /// never waits longer than the largest of these across providers.
    pub call_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 5_000,
            read_ms: 10_000,
            call_ms: 10_000,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    pub fn call(&self) -> Duration {
        Duration::from_millis(self.call_ms)
    }
}

/// Single parameterised configuration for one external provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: BookSource,
    pub enabled: bool,
    pub priority: ProviderPriority,
    /// API root override; the provider's public endpoint when `None`.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Treat a missing `api_key` as a permanent misconfiguration.
    pub require_api_key: bool,
    /// Results requested from the provider per call (clamped to the
    /// provider's documented maximum).
    pub max_results: usize,
    /// Custom User-Agent; a descriptive default is used when `None`.
    pub user_agent: Option<String>,
    pub timeout: TimeoutConfig,
    pub retry: RetryConfig,
    pub breaker: CircuitBreakerConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::open_library()
    }
}

impl ProviderConfig {
    /// OpenLibrary as the primary provider: strict breaker, three attempts.
    pub fn open_library() -> Self {
        Self {
            kind: BookSource::OpenLibrary,
            enabled: true,
            priority: ProviderPriority::Primary,
            base_url: None,
            api_key: None,
            require_api_key: false,
            max_results: 20,
            user_agent: None,
            timeout: TimeoutConfig {
                connect_ms: 5_000,
                read_ms: 10_000,
                call_ms: 10_000,
            },
            retry: RetryConfig {
                max_attempts: 3,
                ..RetryConfig::default()
            },
            breaker: CircuitBreakerConfig::strict(),
        }
    }

    /// Google Books as the secondary provider: tolerant breaker, longer read.
    pub fn google_books() -> Self {
        Self {
            kind: BookSource::GoogleBooks,
            enabled: true,
            priority: ProviderPriority::Secondary,
            base_url: None,
            api_key: None,
            require_api_key: false,
            max_results: 20,
            user_agent: None,
            timeout: TimeoutConfig {
                connect_ms: 5_000,
                read_ms: 15_000,
                call_ms: 15_000,
            },
            retry: RetryConfig {
                max_attempts: 2,
                backoff: crate::resilience::Backoff::Incremental,
                ..RetryConfig::default()
            },
            breaker: CircuitBreakerConfig::tolerant(),
        }
    }

    /// The API root to call, falling back to the provider's public endpoint.
    pub fn resolved_base_url(&self) -> &str {
        if let Some(url) = self.base_url.as_deref() {
            return url;
        }
        match self.kind {
            BookSource::GoogleBooks => "https://www.googleapis.com/books/v1",
            _ => "https://openlibrary.org",
        }
    }

    fn validate(&self) -> Result<(), SearchError> {
        let name = self.kind.name();
        if self.kind == BookSource::Local {
            return Err(SearchError::Config(
                "the local catalog cannot be configured as a provider".into(),
            ));
        }
        if url::Url::parse(self.resolved_base_url()).is_err() {
            return Err(SearchError::Config(format!(
                "{name}: base_url is not a valid URL"
            )));
        }
        if self.max_results == 0 {
            return Err(SearchError::Config(format!(
                "{name}: max_results must be greater than 0"
            )));
        }
        if self.timeout.connect_ms == 0 || self.timeout.read_ms == 0 || self.timeout.call_ms == 0 {
            return Err(SearchError::Config(format!(
                "{name}: timeouts must be greater than 0"
            )));
        }
        if !(1..=5).contains(&self.retry.max_attempts) {
            return Err(SearchError::Config(format!(
                "{name}: retry.max_attempts must be between 1 and 5"
            )));
        }
        let threshold = self.breaker.failure_rate_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(SearchError::Config(format!(
                "{name}: breaker.failure_rate_threshold must be in (0, 1]"
            )));
        }
        if self.breaker.window_size == 0
            || self.breaker.minimum_calls == 0
            || self.breaker.minimum_calls > self.breaker.window_size
        {
            return Err(SearchError::Config(format!(
                "{name}: breaker.minimum_calls must be between 1 and window_size"
            )));
        }
        if self.breaker.half_open_calls == 0 {
            return Err(SearchError::Config(format!(
                "{name}: breaker.half_open_calls must be greater than 0"
            )));
        }
        Ok(())
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.local.max_results == 0 {
            return Err(SearchError::Config(
                "local.max_results must be greater than 0".into(),
            ));
        }
        if self.cache.enabled
            && (self.cache.general_ttl_secs == 0 || self.cache.narrow_ttl_secs == 0)
        {
            return Err(SearchError::Config(
                "cache TTLs must be greater than 0".into(),
            ));
        }
        if self.cache.enabled && self.cache.sweep_interval_secs == 0 {
            return Err(SearchError::Config(
                "cache.sweep_interval_secs must be greater than 0".into(),
            ));
        }
        let mut seen = Vec::new();
        for provider in &self.providers {
            if seen.contains(&provider.kind) {
                return Err(SearchError::Config(format!(
                    "{} is configured more than once",
                    provider.kind
                )));
            }
            seen.push(provider.kind);
            provider.validate()?;
        }
        Ok(())
    }

    /// Look up the configuration for one provider.
    pub fn provider(&self, kind: BookSource) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.kind == kind)
    }
}
