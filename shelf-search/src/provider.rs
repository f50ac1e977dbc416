//! Trait definition for external bibliographic providers.
//!
//! Each provider (OpenLibrary, Google Books) implements [`BookProvider`] to
//! translate its own wire format into [`BookRecord`]s. Providers only talk
//! HTTP and map JSON; timeouts beyond the HTTP client's, retries and circuit
//! breaking live in [`crate::resilience::ResilienceGuard`].

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{BookRecord, BookSource};

/// An external source of book metadata.
///
/// Implementations must be `Send + Sync`; one instance serves every
/// concurrent request for the process lifetime.
#[async_trait]
pub trait BookProvider: Send + Sync {
    /// Which [`BookSource`] this implementation represents.
    fn source(&self) -> BookSource;

    /// The provider's documented per-request maximum. Requests above it
    /// are clamped.
    fn max_results_limit(&self) -> usize;

    /// Free-text search.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<BookRecord>>;

    /// Exact ISBN lookup. `isbn` is already normalised.
    async fn search_by_isbn(&self, isbn: &str) -> Result<Vec<BookRecord>>;

    async fn search_by_title(&self, title: &str, max_results: usize) -> Result<Vec<BookRecord>>;

    async fn search_by_author(&self, author: &str, max_results: usize) -> Result<Vec<BookRecord>>;

    /// Clamp a requested result count into `1..=max_results_limit()`.
    fn clamp_max_results(&self, requested: usize) -> usize {
        requested.clamp(1, self.max_results_limit().max(1))
    }
}

/// Which provider operation a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Query,
    Isbn,
    Title,
    Author,
}

/// An owned provider request, replayable across retry attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub kind: LookupKind,
    pub term: String,
    pub max_results: usize,
}

impl ProviderRequest {
    pub fn query(term: impl Into<String>, max_results: usize) -> Self {
        Self {
            kind: LookupKind::Query,
            term: term.into(),
            max_results,
        }
    }

    pub fn isbn(isbn: impl Into<String>) -> Self {
        Self {
            kind: LookupKind::Isbn,
            term: isbn.into(),
            max_results: 1,
        }
    }

    pub fn title(term: impl Into<String>, max_results: usize) -> Self {
        Self {
            kind: LookupKind::Title,
            term: term.into(),
            max_results,
        }
    }

    pub fn author(term: impl Into<String>, max_results: usize) -> Self {
        Self {
            kind: LookupKind::Author,
            term: term.into(),
            max_results,
        }
    }

    /// Route this request to the matching provider operation.
    pub async fn dispatch(&self, provider: &dyn BookProvider) -> Result<Vec<BookRecord>> {
        match self.kind {
            LookupKind::Query => provider.search(&self.term, self.max_results).await,
            LookupKind::Isbn => provider.search_by_isbn(&self.term).await,
            LookupKind::Title => provider.search_by_title(&self.term, self.max_results).await,
            LookupKind::Author => provider.search_by_author(&self.term, self.max_results).await,
        }
    }
}
