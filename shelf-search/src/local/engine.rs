//! Relevance-ranked search over the local catalog.

use std::sync::Arc;

use crate::catalog::{CatalogQuery, CatalogReader};
use crate::error::Result;
use crate::query::SearchQuery;
use crate::types::{BookRecord, SortField};

use super::scoring::{by_field, by_relevance, score_record};

/// Hard limit on suggestions per request.
pub const MAX_SUGGESTIONS: usize = 20;

/// Every ranked local match plus the catalog's own match count.
#[derive(Debug, Clone, Default)]
pub struct LocalResults {
    pub records: Vec<BookRecord>,
    /// Count of every matching record, from the catalog's count query.
    pub total: usize,
}

pub struct LocalRelevanceEngine {
    catalog: Arc<dyn CatalogReader>,
}

impl LocalRelevanceEngine {
    pub fn new(catalog: Arc<dyn CatalogReader>) -> Self {
        Self { catalog }
    }

    fn catalog_query(query: &SearchQuery) -> CatalogQuery {
        CatalogQuery {
            terms: query.terms(),
            isbn: query.isbn(),
            filters: query.filters.clone(),
        }
    }

    /// Rank every local match for `query`.
    ///
    /// The list is not truncated: it is cached whole and sliced into pages
    /// later, so every page that `total` implies can be served.
    ///
    /// # Errors
    ///
    /// Propagates catalog failures; local data has no fallback.
    pub async fn search(&self, query: &SearchQuery) -> Result<LocalResults> {
        let catalog_query = Self::catalog_query(query);
        let candidates = self.catalog.search(&catalog_query).await?;
        let total = self.catalog.count(&catalog_query).await?;

        let isbn = catalog_query.isbn.as_deref();
        let mut scored: Vec<_> = candidates
            .into_iter()
            .filter_map(|record| score_record(record, &catalog_query.terms, isbn))
            .collect();

        let records: Vec<BookRecord> = if query.sort == SortField::Relevance {
            scored.sort_by(by_relevance);
            scored.into_iter().map(|s| s.record).collect()
        } else {
            let mut records: Vec<_> = scored.into_iter().map(|s| s.record).collect();
            records.sort_by(|a, b| by_field(query.sort, query.direction, a, b));
            records
        };

        tracing::debug!(ranked = records.len(), total, "local search complete");
        Ok(LocalResults { records, total })
    }

    /// Titles and authors containing `fragment`, prefix matches first.
    ///
    /// `fragment` must already be a normalised, lower-cased suggest key.
    pub async fn suggest(&self, fragment: &str, limit: usize) -> Result<Vec<String>> {
        let limit = limit.clamp(1, MAX_SUGGESTIONS);
        let query = CatalogQuery {
            terms: vec![fragment.to_owned()],
            ..Default::default()
        };
        let candidates = self.catalog.search(&query).await?;

        let mut hits: Vec<(bool, String)> = Vec::new();
        for record in &candidates {
            let names = std::iter::once(record.title()).chain(record.author());
            for name in names {
                let folded = crate::query::fold(name);
                if folded.contains(fragment) {
                    hits.push((folded.starts_with(fragment), name.to_owned()));
                }
            }
        }
        hits.sort_by(|(a_prefix, a), (b_prefix, b)| {
            b_prefix
                .cmp(a_prefix)
                .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
                .then_with(|| a.cmp(b))
        });

        let mut suggestions: Vec<String> = Vec::with_capacity(limit);
        for (_, name) in hits {
            if !suggestions.iter().any(|s| s.eq_ignore_ascii_case(&name)) {
                suggestions.push(name);
            }
            if suggestions.len() == limit {
                break;
            }
        }
        Ok(suggestions)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<BookRecord>> {
        self.catalog.find_by_id(id).await
    }

    pub async fn find_by_isbn(&self, isbn: &str) -> Result<Option<BookRecord>> {
        self.catalog.find_by_isbn(isbn).await
    }
}
