//! Read-only interface to the local book catalog.
//!
//! The persistence layer lives outside this crate; the search engine only
//! needs to find candidate records, count them, and fetch single records by
//! id or ISBN. [`InMemoryCatalog`] implements the interface over a fixed
//! record set loaded from JSON, for the host binary and for tests.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Result, SearchError};
use crate::isbn::canonical_isbn;
use crate::query::{fold, SearchFilters};
use crate::types::{BookRecord, BookSource};

/// Catalog predicate: every term must appear in at least one searchable
/// field (title, author, category, description), or the record's ISBN must
/// equal `isbn`. Filters apply in both cases.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogQuery {
    /// Lower-cased terms. Empty matches everything.
    pub terms: Vec<String>,
    /// Normalised ISBN to match exactly.
    pub isbn: Option<String>,
    pub filters: SearchFilters,
}

impl CatalogQuery {
    /// Whether `record` satisfies this query.
    pub fn matches(&self, record: &BookRecord) -> bool {
        if !self.filters.matches(record) {
            return false;
        }
        if self.isbn.is_some() && record.isbn() == self.isbn.as_deref() {
            return true;
        }
        let fields = searchable_fields(record);
        self.terms
            .iter()
            .all(|term| fields.iter().any(|field| field.contains(term.as_str())))
    }
}

/// Folded searchable fields of a record, in weight order: title, author,
/// category, description. Missing fields are empty strings.
pub fn searchable_fields(record: &BookRecord) -> [String; 4] {
    [
        fold(record.title()),
        record.author().map(fold).unwrap_or_default(),
        record.category_name().map(fold).unwrap_or_default(),
        record.description().map(fold).unwrap_or_default(),
    ]
}

/// Read-only catalog collaborator.
///
/// Any error returned here is fatal for the request: there is no fallback
/// for authoritative local data.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Every record matching `query`, in no particular order.
    async fn search(&self, query: &CatalogQuery) -> Result<Vec<BookRecord>>;

    /// Number of records matching `query`, independent of any result cap.
    async fn count(&self, query: &CatalogQuery) -> Result<usize>;

    async fn find_by_id(&self, id: &str) -> Result<Option<BookRecord>>;

    /// Exact lookup by normalised ISBN.
    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<BookRecord>>;
}

/// One entry of a catalog JSON file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CatalogEntry {
    id: Option<String>,
    title: Option<String>,
    author: Option<String>,
    isbn: Option<String>,
    publication_year: Option<i32>,
    publisher: Option<String>,
    page_count: Option<u32>,
    description: Option<String>,
    cover_image_url: Option<String>,
    category_name: Option<String>,
    average_rating: Option<f64>,
    rating_count: Option<u32>,
}

impl CatalogEntry {
    fn into_record(self) -> Option<BookRecord> {
        let mut record = BookRecord::new(self.title.as_deref()?, BookSource::Local)?;
        if let Some(id) = self.id {
            record = record.with_id(id);
        }
        if let Some(author) = self.author {
            record = record.with_author(author);
        }
        if let Some(isbn) = self.isbn.as_deref() {
            record = record.with_isbn(isbn);
        }
        if let Some(year) = self.publication_year {
            record = record.with_publication_year(year);
        }
        if let Some(publisher) = self.publisher {
            record = record.with_publisher(publisher);
        }
        if let Some(pages) = self.page_count {
            record = record.with_page_count(pages);
        }
        if let Some(description) = self.description {
            record = record.with_description(description);
        }
        if let Some(url) = self.cover_image_url {
            record = record.with_cover_image_url(url);
        }
        if let Some(category) = self.category_name {
            record = record.with_category(category);
        }
        if let Some(average) = self.average_rating {
            record = record.with_rating(average, self.rating_count.unwrap_or(0));
        }
        Some(record)
    }
}

/// A fixed, in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    records: Vec<BookRecord>,
}

impl InMemoryCatalog {
    /// Wrap an existing record set.
    pub fn new(records: Vec<BookRecord>) -> Self {
        Self { records }
    }

    /// Parse a JSON array of catalog entries. Untitled entries are skipped.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)
            .map_err(|e| SearchError::Catalog(format!("invalid catalog JSON: {e}")))?;
        let total = entries.len();
        let records: Vec<BookRecord> = entries
            .into_iter()
            .filter_map(CatalogEntry::into_record)
            .collect();
        if records.len() < total {
            tracing::warn!(
                skipped = total - records.len(),
                "catalog entries without a title skipped"
            );
        }
        Ok(Self::new(records))
    }

    /// Load a catalog JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            SearchError::Catalog(format!("failed to read {}: {e}", path.display()))
        })?;
        let catalog = Self::from_json_str(&json)?;
        tracing::info!(path = %path.display(), records = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CatalogReader for InMemoryCatalog {
    async fn search(&self, query: &CatalogQuery) -> Result<Vec<BookRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect())
    }

    async fn count(&self, query: &CatalogQuery) -> Result<usize> {
        Ok(self.records.iter().filter(|r| query.matches(r)).count())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<BookRecord>> {
        Ok(self.records.iter().find(|r| r.id() == Some(id)).cloned())
    }

    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<BookRecord>> {
        let Some(isbn) = canonical_isbn(isbn) else {
            return Ok(None);
        };
        Ok(self
            .records
            .iter()
            .find(|r| r.isbn() == Some(isbn.as_str()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"id": "1", "title": "Dune", "author": "Frank Herbert", "isbn": "978-0-441-01359-3",
         "publicationYear": 1965, "categoryName": "Science Fiction", "averageRating": 4.3, "ratingCount": 12},
        {"id": "2", "title": "The Hobbit", "author": "J.R.R. Tolkien", "categoryName": "Fantasy",
         "description": "A hobbit goes there and back again."},
        {"id": "3", "title": "  "}
    ]"#;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::from_json_str(SAMPLE).expect("catalog")
    }

    #[test]
    fn loader_skips_untitled_entries_and_normalises() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.records[0].isbn(), Some("9780441013593"));
        assert_eq!(catalog.records[0].source(), BookSource::Local);
    }

    #[test]
    fn malformed_json_is_catalog_error() {
        let err = InMemoryCatalog::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, SearchError::Catalog(_)));
    }

    #[tokio::test]
    async fn all_terms_must_match_some_field() {
        let catalog = catalog();
        let query = CatalogQuery {
            terms: vec!["hobbit".into(), "again".into()],
            ..Default::default()
        };
        let hits = catalog.search(&query).await.expect("search");
        assert_eq!(hits.len(), 1);

        let query = CatalogQuery {
            terms: vec!["hobbit".into(), "herbert".into()],
            ..Default::default()
        };
        assert!(catalog.search(&query).await.expect("search").is_empty());
    }

    #[tokio::test]
    async fn empty_query_matches_everything() {
        let catalog = catalog();
        let query = CatalogQuery::default();
        assert_eq!(catalog.count(&query).await.expect("count"), 2);
    }

    #[tokio::test]
    async fn isbn_matches_without_terms_matching() {
        let catalog = catalog();
        let query = CatalogQuery {
            terms: vec!["9780441013593".into()],
            isbn: Some("9780441013593".into()),
            ..Default::default()
        };
        let hits = catalog.search(&query).await.expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title(), "Dune");
    }

    #[tokio::test]
    async fn direct_lookups() {
        let catalog = catalog();
        assert!(catalog.find_by_id("2").await.expect("lookup").is_some());
        assert!(catalog.find_by_id("99").await.expect("lookup").is_none());
        let dune = catalog.find_by_isbn("0441013597").await.expect("lookup");
        assert_eq!(dune.and_then(|r| r.id().map(str::to_owned)).as_deref(), Some("1"));
        let dune = catalog.find_by_isbn("978 0441013593").await.expect("lookup");
        assert_eq!(dune.map(|r| r.title().to_owned()).as_deref(), Some("Dune"));
    }
}
