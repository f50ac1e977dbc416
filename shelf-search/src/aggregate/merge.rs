//! Merging local and provider results into one ordered, deduplicated set,
//! and slicing that set into pages.

use std::collections::BTreeMap;

use crate::config::{DedupPolicy, ProviderPriority};
use crate::local::LocalResults;
use crate::types::{AggregatedSearchResult, BookRecord, BookSource, ProviderHealthStatus};

use super::dedup::deduplicate;

/// Records returned by one provider call.
#[derive(Debug, Clone)]
pub struct ProviderBatch {
    pub source: BookSource,
    pub priority: ProviderPriority,
    pub records: Vec<BookRecord>,
}

/// The full deduplicated result set before pagination. This is what the
/// cache stores.
#[derive(Debug, Clone, Default)]
pub struct MergedResults {
    pub records: Vec<BookRecord>,
    /// Deduplicated record count; every counted record is reachable by
    /// some page.
    pub total_elements: usize,
    pub external_search_performed: bool,
}

impl MergedResults {
    /// Slice out one page and attach the given health snapshot.
    ///
    /// `size` must already be clamped. Pages past the end are empty.
    pub fn page(
        &self,
        page: usize,
        size: usize,
        provider_health: BTreeMap<String, ProviderHealthStatus>,
    ) -> AggregatedSearchResult {
        let size = size.max(1);
        let start = page.saturating_mul(size).min(self.records.len());
        let end = start.saturating_add(size).min(self.records.len());
        AggregatedSearchResult {
            content: self.records[start..end].to_vec(),
            total_elements: self.total_elements,
            total_pages: self.total_elements.div_ceil(size),
            page,
            size,
            external_search_performed: self.external_search_performed,
            provider_health,
        }
    }
}

/// Merges result lists in fixed precedence: local, then primary providers,
/// then secondary providers. Arrival order never matters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator {
    policy: DedupPolicy,
}

impl ResultAggregator {
    pub fn new(policy: DedupPolicy) -> Self {
        Self { policy }
    }

    pub fn merge(
        &self,
        local: LocalResults,
        mut batches: Vec<ProviderBatch>,
        external_search_performed: bool,
    ) -> MergedResults {
        let local_total = local.total;
        batches.sort_by_key(|b| b.priority);

        let ordered = local
            .records
            .into_iter()
            .chain(batches.into_iter().flat_map(|b| b.records));
        let records = deduplicate(ordered, self.policy);

        tracing::debug!(
            merged = records.len(),
            local_total,
            external = external_search_performed,
            "results merged"
        );
        MergedResults {
            total_elements: records.len(),
            records,
            external_search_performed,
        }
    }
}
