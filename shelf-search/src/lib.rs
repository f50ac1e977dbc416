//! # shelf-search
//!
//! Book search and discovery for Shelf.
//!
//! Every search runs against the local catalog first and is ranked by a
//! weighted relevance score. When the caller asks for it, or when local
//! coverage is thin, OpenLibrary and Google Books are queried concurrently
//! and their results are merged behind the local ones.
//!
//! ## Design
//!
//! - Local matches are authoritative and always come first
//! - Each external provider sits behind its own resilience guard: a call
//!   budget, bounded retry and a rolling-window circuit breaker
//! - A provider failure degrades the result (reported in `provider_health`)
//!   but never fails the search
//! - Results are deduplicated by ISBN, then by a configurable fallback key
//! - Merged result sets are cached with per-namespace TTLs, so every page
//!   of a search is served from one entry
//!
//! ## Security
//!
//! - API keys are read from configuration and never logged
//! - Search text is logged only at trace level
//! - No network listeners: this is a library, not a server
//!
//! ## Example
//!
//! ```no_run
//! # async fn example() -> shelf_search::Result<()> {
//! use std::sync::Arc;
//! use shelf_search::{InMemoryCatalog, SearchConfig, SearchOrchestrator, SearchRequest};
//!
//! let catalog = Arc::new(InMemoryCatalog::from_json_file("catalog.json".as_ref())?);
//! let orchestrator = SearchOrchestrator::from_config(SearchConfig::default(), catalog)?;
//! let page = orchestrator.search(&SearchRequest::text("dune")).await?;
//! for book in &page.content {
//!     println!("{} ({})", book.title(), book.source());
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod isbn;
pub mod local;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod query;
pub mod resilience;
pub mod types;

pub use cache::SearchCache;
pub use catalog::{CatalogQuery, CatalogReader, InMemoryCatalog};
pub use config::{
    CacheConfig, DedupPolicy, LocalConfig, ProviderConfig, ProviderPriority, SearchConfig,
    TimeoutConfig,
};
pub use error::{Result, SearchError};
pub use orchestrator::SearchOrchestrator;
pub use provider::BookProvider;
pub use query::SearchRequest;
pub use resilience::{CircuitBreakerConfig, CircuitState, GuardMetrics, RetryConfig};
pub use types::{
    AggregatedSearchResult, BookRecord, BookSource, ProviderHealthStatus, SortDirection,
    SortField,
};
