//! Result aggregation: priority-ordered merge, dedup and pagination.

pub mod dedup;
pub mod merge;

pub use dedup::{deduplicate, Deduplicator};
pub use merge::{MergedResults, ProviderBatch, ResultAggregator};
