//! Shared TTL cache for merged search results.
//!
//! Caches the deduplicated, unpaginated result set so that every page of
//! the same search is served from one entry. Keys fingerprint the
//! normalised query, the filter and sort signatures and the
//! include-external flag; nothing user-specific ever goes into a key or a
//! value, so entries are safe to share across callers.
//!
//! Expiry is per namespace: general searches live longer than narrow
//! single-field lookups. [`moka`] treats an expired entry as a miss on
//! read; the background sweeper started by [`SearchCache::spawn_sweeper`]
//! evicts entries nobody reads again.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use moka::Expiry;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::aggregate::MergedResults;
use crate::config::CacheConfig;

/// Which TTL an entry gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Free-text searches.
    General,
    Title,
    Author,
    Isbn,
}

impl CacheNamespace {
    fn is_narrow(self) -> bool {
        !matches!(self, Self::General)
    }
}

/// Composite cache key: namespace plus a fingerprint of the query shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: CacheNamespace,
    fingerprint: u64,
}

impl CacheKey {
    /// Build a deterministic key. `match_key` must already be normalised.
    pub fn new(
        namespace: CacheNamespace,
        match_key: &str,
        filter_signature: &str,
        sort_signature: &str,
        include_external: bool,
    ) -> Self {
        let mut hasher = DefaultHasher::new();
        match_key.hash(&mut hasher);
        filter_signature.hash(&mut hasher);
        sort_signature.hash(&mut hasher);
        include_external.hash(&mut hasher);
        Self {
            namespace,
            fingerprint: hasher.finish(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Arc<MergedResults>,
    ttl: Duration,
}

struct NamespaceExpiry;

impl Expiry<CacheKey, CacheEntry> for NamespaceExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Concurrent result cache, one per process.
#[derive(Clone)]
pub struct SearchCache {
    inner: Option<Cache<CacheKey, CacheEntry>>,
    general_ttl: Duration,
    narrow_ttl: Duration,
    sweep_interval: Duration,
}

impl std::fmt::Debug for SearchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchCache")
            .field("enabled", &self.inner.is_some())
            .field("general_ttl", &self.general_ttl)
            .field("narrow_ttl", &self.narrow_ttl)
            .finish()
    }
}

impl SearchCache {
    pub fn new(config: &CacheConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        let mut cache = Self::with_ttls(
            Duration::from_secs(config.general_ttl_secs),
            Duration::from_secs(config.narrow_ttl_secs),
            config.max_entries,
        );
        cache.sweep_interval = Duration::from_secs(config.sweep_interval_secs.max(1));
        cache
    }

    /// A cache with explicit TTLs.
    pub fn with_ttls(general_ttl: Duration, narrow_ttl: Duration, max_entries: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(NamespaceExpiry)
            .build();
        Self {
            inner: Some(inner),
            general_ttl,
            narrow_ttl,
            sweep_interval: Duration::from_secs(60),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            inner: None,
            general_ttl: Duration::ZERO,
            narrow_ttl: Duration::ZERO,
            sweep_interval: Duration::from_secs(60),
        }
    }

    pub fn ttl_for(&self, namespace: CacheNamespace) -> Duration {
        if namespace.is_narrow() {
            self.narrow_ttl
        } else {
            self.general_ttl
        }
    }

    /// Look up a live entry. Expired entries read as misses.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<MergedResults>> {
        let entry = self.inner.as_ref()?.get(key).await?;
        Some(entry.value)
    }

    /// Store `value` under `key` with its namespace's TTL.
    pub async fn insert(&self, key: CacheKey, value: MergedResults) -> Arc<MergedResults> {
        let value = Arc::new(value);
        if let Some(cache) = &self.inner {
            let entry = CacheEntry {
                value: Arc::clone(&value),
                ttl: self.ttl_for(key.namespace),
            };
            cache.insert(key, entry).await;
        }
        value
    }

    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
        }
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.inner.as_ref().map_or(0, |c| c.entry_count())
    }

    /// Evict expired entries now.
    pub async fn sweep(&self) {
        if let Some(cache) = &self.inner {
            cache.run_pending_tasks().await;
        }
    }

    /// Spawn the periodic sweeper. Stops when `shutdown` is cancelled.
    /// Returns `None` for a disabled cache.
    pub fn spawn_sweeper(&self, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        self.inner.as_ref()?;
        let cache = self.clone();
        let period = self.sweep_interval;

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        cache.sweep().await;
                        tracing::trace!(entries = cache.entry_count(), "cache swept");
                    }
                }
            }
            tracing::debug!("cache sweeper stopped");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BookRecord, BookSource};

    fn merged(title: &str) -> MergedResults {
        MergedResults {
            records: BookRecord::new(title, BookSource::Local).into_iter().collect(),
            total_elements: 1,
            external_search_performed: false,
        }
    }

    fn key(ns: CacheNamespace, q: &str) -> CacheKey {
        CacheKey::new(ns, q, "", "Relevance:Asc", false)
    }

    #[test]
    fn key_is_deterministic() {
        assert_eq!(key(CacheNamespace::General, "dune"), key(CacheNamespace::General, "dune"));
    }

    #[test]
    fn key_differs_per_input() {
        let base = key(CacheNamespace::General, "dune");
        assert_ne!(base, key(CacheNamespace::General, "hobbit"));
        assert_ne!(base, key(CacheNamespace::Title, "dune"));
        assert_ne!(
            base,
            CacheKey::new(CacheNamespace::General, "dune", "", "Relevance:Asc", true)
        );
        assert_ne!(
            base,
            CacheKey::new(CacheNamespace::General, "dune", "c=\"scifi\"", "Relevance:Asc", false)
        );
    }

    #[test]
    fn narrow_namespaces_use_short_ttl() {
        let cache = SearchCache::new(&CacheConfig::default());
        assert_eq!(cache.ttl_for(CacheNamespace::General), Duration::from_secs(900));
        assert_eq!(cache.ttl_for(CacheNamespace::Title), Duration::from_secs(600));
        assert_eq!(cache.ttl_for(CacheNamespace::Author), Duration::from_secs(600));
        assert_eq!(cache.ttl_for(CacheNamespace::Isbn), Duration::from_secs(600));
    }

    #[tokio::test]
    async fn insert_then_get() {
        let cache = SearchCache::new(&CacheConfig::default());
        let k = key(CacheNamespace::General, "dune");
        assert!(cache.get(&k).await.is_none());
        cache.insert(k, merged("Dune")).await;
        let hit = cache.get(&k).await.expect("hit");
        assert_eq!(hit.records[0].title(), "Dune");
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let cache = SearchCache::with_ttls(
            Duration::from_millis(300),
            Duration::from_millis(300),
            100,
        );
        let k = key(CacheNamespace::General, "dune");
        cache.insert(k, merged("Dune")).await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(cache.get(&k).await.is_some(), "still inside TTL");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(cache.get(&k).await.is_none(), "past TTL");
    }

    #[tokio::test]
    async fn namespaces_expire_independently() {
        let cache = SearchCache::with_ttls(
            Duration::from_secs(30),
            Duration::from_millis(100),
            100,
        );
        let general = key(CacheNamespace::General, "dune");
        let narrow = key(CacheNamespace::Title, "dune");
        cache.insert(general, merged("Dune")).await;
        cache.insert(narrow, merged("Dune")).await;

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(cache.get(&general).await.is_some());
        assert!(cache.get(&narrow).await.is_none());
    }

    #[tokio::test]
    async fn disabled_cache_never_hits() {
        let cache = SearchCache::disabled();
        let k = key(CacheNamespace::General, "dune");
        cache.insert(k, merged("Dune")).await;
        assert!(cache.get(&k).await.is_none());
        assert!(cache.spawn_sweeper(CancellationToken::new()).is_none());
    }

    #[tokio::test]
    async fn sweeper_evicts_and_stops() {
        let mut cache = SearchCache::with_ttls(
            Duration::from_millis(50),
            Duration::from_millis(50),
            100,
        );
        cache.sweep_interval = Duration::from_millis(20);
        cache.insert(key(CacheNamespace::General, "a"), merged("A")).await;
        cache.insert(key(CacheNamespace::General, "b"), merged("B")).await;

        let token = CancellationToken::new();
        let handle = cache.spawn_sweeper(token.clone()).expect("enabled");
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(cache.entry_count(), 0);

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper stops")
            .expect("sweeper task");
    }
}
