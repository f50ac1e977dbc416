//! Top-level search entry point.
//!
//! [`SearchOrchestrator`] is constructed once at startup and shared by
//! reference. Per request it runs:
//!
//! 1. Preprocess and validate the request
//! 2. Cache lookup; a hit is paginated and returned immediately
//! 3. Local relevance search (always)
//! 4. If external results were requested, or local coverage is below
//!    `local.min_local_results`, fan out to every provider concurrently
//!    through its [`ResilienceGuard`]
//! 5. Merge in fixed precedence and deduplicate
//! 6. Cache the merged set and return the requested page
//!
//! Provider failures never fail a search. Catalog failures always do.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::aggregate::{ProviderBatch, ResultAggregator};
use crate::cache::{CacheKey, CacheNamespace, SearchCache};
use crate::catalog::CatalogReader;
use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::isbn::canonical_isbn;
use crate::local::{LocalRelevanceEngine, LocalResults};
use crate::provider::{BookProvider, LookupKind, ProviderRequest};
use crate::providers::build_provider;
use crate::query::{preprocess, suggest_key, SearchFilters, SearchRequest};
use crate::resilience::{GuardMetrics, ResilienceGuard};
use crate::types::{AggregatedSearchResult, BookRecord, ProviderHealthStatus};

/// Suggestions returned when the caller gives no limit.
pub const DEFAULT_SUGGEST_LIMIT: usize = 10;

/// One configured provider and its per-call result count.
struct ProviderSlot {
    guard: Arc<ResilienceGuard>,
    max_results: usize,
}

pub struct SearchOrchestrator {
    local: LocalRelevanceEngine,
    min_local_results: usize,
    /// Upper bound on records per returned page.
    page_ceiling: usize,
    slots: Vec<ProviderSlot>,
    aggregator: ResultAggregator,
    cache: SearchCache,
    shutdown: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SearchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchOrchestrator")
            .field("providers", &self.slots.iter().map(|s| s.guard.name()).collect::<Vec<_>>())
            .field("cache", &self.cache)
            .finish()
    }
}

impl SearchOrchestrator {
    /// Build the orchestrator with HTTP providers for every enabled entry in
    /// `config.providers`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the configuration is invalid or a
    /// provider client cannot be built.
    pub fn from_config(config: SearchConfig, catalog: Arc<dyn CatalogReader>) -> Result<Self> {
        config.validate()?;
        let providers = config
            .providers
            .iter()
            .filter(|p| p.enabled)
            .map(build_provider)
            .collect::<Result<Vec<_>>>()?;
        Self::new(config, catalog, providers)
    }

    /// Build the orchestrator around explicit provider implementations.
    ///
    /// Each provider is paired with the `config.providers` entry of the same
    /// kind, which supplies its priority, timeouts, retry and breaker
    /// settings. A provider whose entry is missing uses that kind's preset.
    pub fn new(
        config: SearchConfig,
        catalog: Arc<dyn CatalogReader>,
        providers: Vec<Arc<dyn BookProvider>>,
    ) -> Result<Self> {
        config.validate()?;

        let mut slots: Vec<ProviderSlot> = providers
            .into_iter()
            .map(|provider| -> Result<ProviderSlot> {
                let kind = provider.source();
                let provider_config = config
                    .provider(kind)
                    .cloned()
                    .or_else(|| preset_for(kind))
                    .ok_or_else(|| {
                        SearchError::Config(format!(
                            "{kind} cannot be used as an external provider"
                        ))
                    })?;
                Ok(ProviderSlot {
                    max_results: provider.clamp_max_results(provider_config.max_results),
                    guard: Arc::new(ResilienceGuard::new(provider, &provider_config)),
                })
            })
            .collect::<Result<_>>()?;
        slots.sort_by_key(|s| s.guard.priority());

        tracing::info!(
            providers = ?slots.iter().map(|s| s.guard.name()).collect::<Vec<_>>(),
            cache = config.cache.enabled,
            dedup = ?config.dedup,
            "search orchestrator ready"
        );

        Ok(Self {
            local: LocalRelevanceEngine::new(catalog),
            min_local_results: config.local.min_local_results,
            page_ceiling: config.local.effective_max_results(),
            slots,
            aggregator: ResultAggregator::new(config.dedup),
            cache: SearchCache::new(&config.cache),
            shutdown: CancellationToken::new(),
            sweeper: Mutex::new(None),
        })
    }

    /// Replace the result cache. Intended for tuning TTLs in tests and
    /// embedding hosts.
    pub fn with_cache(mut self, cache: SearchCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &SearchCache {
        &self.cache
    }

    /// Run a full search.
    ///
    /// # Errors
    ///
    /// [`SearchError::Validation`] for bad parameters and
    /// [`SearchError::Catalog`] when the local catalog cannot be read.
    pub async fn search(&self, request: &SearchRequest) -> Result<AggregatedSearchResult> {
        let query = preprocess(request)?;
        tracing::trace!(query = %query.match_key, page = query.page, size = query.size, "search");

        let key = CacheKey::new(
            CacheNamespace::General,
            &query.match_key,
            &query.filters.signature(),
            &query.sort_signature(),
            query.include_external,
        );
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!("search cache hit");
            return Ok(hit.page(query.page, self.page_size(query.size), self.health_report()));
        }

        let local = self.local.search(&query).await?;
        let wants_external = query.include_external || local.total < self.min_local_results;
        let (batches, dispatched) = if wants_external && !query.is_empty() {
            self.fan_out(LookupKind::Query, &query.normalized_text, &query.filters)
                .await
        } else {
            (Vec::new(), false)
        };

        let merged = self.aggregator.merge(local, batches, dispatched);
        let merged = self.cache.insert(key, merged).await;
        Ok(merged.page(query.page, self.page_size(query.size), self.health_report()))
    }

    /// Requested page size, held to the configured per-page ceiling.
    fn page_size(&self, requested: usize) -> usize {
        requested.min(self.page_ceiling)
    }

    /// Title-only lookup across the catalog and every provider. Cached in
    /// the short-lived title namespace.
    pub async fn search_by_title(
        &self,
        title: &str,
        page: i64,
        size: i64,
    ) -> Result<AggregatedSearchResult> {
        let request = SearchRequest {
            title: Some(title.to_owned()),
            page: Some(page),
            size: Some(size),
            ..Default::default()
        };
        self.narrow_search(CacheNamespace::Title, LookupKind::Title, &request)
            .await
    }

    /// Author-only lookup across the catalog and every provider. Cached in
    /// the short-lived author namespace.
    pub async fn search_by_author(
        &self,
        author: &str,
        page: i64,
        size: i64,
    ) -> Result<AggregatedSearchResult> {
        let request = SearchRequest {
            author: Some(author.to_owned()),
            page: Some(page),
            size: Some(size),
            ..Default::default()
        };
        self.narrow_search(CacheNamespace::Author, LookupKind::Author, &request)
            .await
    }

    async fn narrow_search(
        &self,
        namespace: CacheNamespace,
        kind: LookupKind,
        request: &SearchRequest,
    ) -> Result<AggregatedSearchResult> {
        let query = preprocess(request)?;
        let term = match kind {
            LookupKind::Title => query.filters.title.clone(),
            _ => query.filters.author.clone(),
        }
        .ok_or_else(|| SearchError::validation(field_name(kind), "must not be empty"))?;

        let key = CacheKey::new(namespace, &term, &query.filters.signature(), "", true);
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit.page(query.page, self.page_size(query.size), self.health_report()));
        }

        let local = self.local.search(&query).await?;
        // Provider matching is authoritative for provider results.
        let (batches, dispatched) = self.fan_out(kind, &term, &SearchFilters::default()).await;
        let merged = self.aggregator.merge(local, batches, dispatched);
        let merged = self.cache.insert(key, merged).await;
        Ok(merged.page(query.page, self.page_size(query.size), self.health_report()))
    }

    /// Resolve an ISBN. The local catalog is authoritative; providers are
    /// asked only when it has no match.
    ///
    /// # Errors
    ///
    /// [`SearchError::Validation`] for a malformed ISBN,
    /// [`SearchError::NotFound`] when no source knows it.
    pub async fn lookup_isbn(&self, raw: &str) -> Result<BookRecord> {
        let isbn = canonical_isbn(raw).ok_or_else(|| {
            SearchError::validation("isbn", format!("'{raw}' is not an ISBN-10 or ISBN-13"))
        })?;

        if let Some(record) = self.local.find_by_isbn(&isbn).await? {
            return Ok(record);
        }

        let key = CacheKey::new(CacheNamespace::Isbn, &isbn, "", "", true);
        if let Some(hit) = self.cache.get(&key).await {
            if let Some(record) = hit.records.first() {
                return Ok(record.clone());
            }
        }

        let (batches, dispatched) = self
            .fan_out(LookupKind::Isbn, &isbn, &SearchFilters::default())
            .await;
        // Provider precedence decides which record answers.
        let mut merged = self
            .aggregator
            .merge(LocalResults::default(), batches, dispatched);
        let Some(record) = merged.records.first().cloned() else {
            return Err(SearchError::NotFound(format!("no book with ISBN {isbn}")));
        };
        merged.records.truncate(1);
        merged.total_elements = 1;
        self.cache.insert(key, merged).await;
        Ok(record)
    }

    /// Direct lookup of a local record by id.
    pub async fn book_by_id(&self, id: &str) -> Result<BookRecord> {
        self.local
            .find_by_id(id)
            .await?
            .ok_or_else(|| SearchError::NotFound(format!("no book with id {id}")))
    }

    /// Local-only autosuggest. Fragments shorter than two characters get no
    /// suggestions.
    pub async fn suggest(&self, partial: &str, limit: Option<usize>) -> Result<Vec<String>> {
        let Some(fragment) = suggest_key(partial) else {
            return Ok(Vec::new());
        };
        self.local
            .suggest(&fragment, limit.unwrap_or(DEFAULT_SUGGEST_LIMIT))
            .await
    }

    /// Health of one provider, looked up by name (case and separators are
    /// ignored: `OpenLibrary`, `open_library` and `OPEN-LIBRARY` all match).
    pub fn provider_health(&self, name: &str) -> Result<ProviderHealthStatus> {
        Ok(self.find_guard(name)?.health())
    }

    /// Health of every configured provider, keyed by provider name.
    pub fn health_report(&self) -> BTreeMap<String, ProviderHealthStatus> {
        self.slots
            .iter()
            .map(|s| (s.guard.name().to_owned(), s.guard.health()))
            .collect()
    }

    pub fn provider_metrics(&self) -> BTreeMap<String, GuardMetrics> {
        self.slots
            .iter()
            .map(|s| (s.guard.name().to_owned(), s.guard.metrics()))
            .collect()
    }

    /// Close a provider's circuit and re-enable it after a configuration fix.
    ///
    /// Cached results are dropped too, since they may have been built while
    /// the provider was failing.
    pub fn reset_provider(&self, name: &str) -> Result<()> {
        self.find_guard(name)?.reset();
        self.cache.invalidate_all();
        Ok(())
    }

    fn find_guard(&self, name: &str) -> Result<&ResilienceGuard> {
        let wanted = compact_name(name);
        self.slots
            .iter()
            .map(|s| s.guard.as_ref())
            .find(|g| compact_name(g.name()) == wanted)
            .ok_or_else(|| SearchError::NotFound(format!("provider {name}")))
    }

    /// Call every available provider concurrently. Returns the batches in
    /// configured priority order and whether any call was dispatched.
    ///
    /// Each call is bounded by its guard's budget, so this never waits
    /// longer than the largest single provider timeout.
    async fn fan_out(
        &self,
        kind: LookupKind,
        term: &str,
        filters: &SearchFilters,
    ) -> (Vec<ProviderBatch>, bool) {
        let active: Vec<&ProviderSlot> = self
            .slots
            .iter()
            .filter(|s| !s.guard.is_disabled())
            .collect();
        if active.is_empty() {
            return (Vec::new(), false);
        }

        let calls = active.iter().map(|slot| async move {
            let request = ProviderRequest {
                kind,
                term: term.to_owned(),
                max_results: if kind == LookupKind::Isbn { 1 } else { slot.max_results },
            };
            let mut records = slot.guard.call(&request).await;
            if !filters.is_empty() {
                records.retain(|r| filters.matches(r));
            }
            ProviderBatch {
                source: slot.guard.source(),
                priority: slot.guard.priority(),
                records,
            }
        });
        let batches = join_all(calls).await;

        for batch in &batches {
            tracing::debug!(
                provider = %batch.source,
                count = batch.records.len(),
                "provider batch"
            );
        }
        (batches, true)
    }

    /// Start the periodic cache sweeper. Idempotent.
    pub fn start_background_tasks(&self) {
        let mut sweeper = self.sweeper.lock().unwrap_or_else(|p| p.into_inner());
        if sweeper.is_none() {
            *sweeper = self.cache.spawn_sweeper(self.shutdown.child_token());
        }
    }

    /// Stop background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "cache sweeper ended abnormally");
            }
        }
        tracing::info!("search orchestrator shut down");
    }
}

impl Drop for SearchOrchestrator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn preset_for(kind: crate::types::BookSource) -> Option<crate::config::ProviderConfig> {
    use crate::config::ProviderConfig;
    use crate::types::BookSource;
    match kind {
        BookSource::OpenLibrary => Some(ProviderConfig::open_library()),
        BookSource::GoogleBooks => Some(ProviderConfig::google_books()),
        BookSource::Local => None,
    }
}

fn field_name(kind: LookupKind) -> &'static str {
    match kind {
        LookupKind::Title => "title",
        LookupKind::Author => "author",
        LookupKind::Isbn => "isbn",
        LookupKind::Query => "query",
    }
}

fn compact_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
