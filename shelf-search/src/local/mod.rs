//! Local catalog search: weighted scoring and the ranking engine.

pub mod engine;
pub mod scoring;

pub use engine::{LocalRelevanceEngine, LocalResults, MAX_SUGGESTIONS};
pub use scoring::{ScoredRecord, AUTHOR_WEIGHT, CATEGORY_WEIGHT, DESCRIPTION_WEIGHT, TITLE_WEIGHT};
