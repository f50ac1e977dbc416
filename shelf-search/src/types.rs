//! Core types: the canonical book record, its provenance, and the
//! aggregated response shape handed to callers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::isbn::{canonical_isbn, prefer_isbn13};
use crate::resilience::CircuitState;

/// Earliest publication year accepted from any source.
pub const MIN_PUBLICATION_YEAR: i32 = 1400;
/// Latest publication year accepted from any source.
pub const MAX_PUBLICATION_YEAR: i32 = 2030;

/// Where a [`BookRecord`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookSource {
    /// The locally held catalog.
    Local,
    /// openlibrary.org search API.
    OpenLibrary,
    /// Google Books volumes API.
    GoogleBooks,
}

impl BookSource {
    /// Returns the human-readable name of this source.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Local => "Local",
            Self::OpenLibrary => "OpenLibrary",
            Self::GoogleBooks => "GoogleBooks",
        }
    }
}

impl fmt::Display for BookSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The unified in-memory representation of a book.
///
/// Built once through [`BookRecord::new`] and the `with_*` builders, which
/// apply the shared mapping rules (title required, ISBN normalised with
/// ISBN-13 preferred, implausible years dropped). There are no setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    id: Option<String>,
    title: String,
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
    source: BookSource,
}

impl BookRecord {
    /// Start a record. Returns `None` when the title is missing or blank,
    /// which drops the record entirely.
    pub fn new(title: impl AsRef<str>, source: BookSource) -> Option<Self> {
        let title = title.as_ref().trim();
        if title.is_empty() {
            return None;
        }
        Some(Self {
            id: None,
            title: title.to_owned(),
            author: None,
            isbn: None,
            publication_year: None,
            publisher: None,
            page_count: None,
            description: None,
            cover_image_url: None,
            category_name: None,
            average_rating: None,
            rating_count: None,
            source,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = non_blank(id.into());
        self
    }

    /// Single author string, used as-is after trimming.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = non_blank(author.into());
        self
    }

    /// Multiple authors, joined with `", "`. Blank names are skipped.
    pub fn with_authors<S: AsRef<str>>(mut self, authors: &[S]) -> Self {
        let joined = authors
            .iter()
            .map(|a| a.as_ref().trim())
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        self.author = non_blank(joined);
        self
    }

    /// A single ISBN, stored in ISBN-13 form; dropped when it does not
    /// normalise.
    pub fn with_isbn(mut self, raw: &str) -> Self {
        self.isbn = canonical_isbn(raw);
        self
    }

    /// Several ISBN candidates; the first ISBN-13 wins over any ISBN-10.
    pub fn with_isbn_candidates<'a, I>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.isbn = prefer_isbn13(candidates).and_then(|isbn| canonical_isbn(&isbn));
        self
    }

    /// Publication year; values outside 1400..=2030 are nulled.
    pub fn with_publication_year(mut self, year: i32) -> Self {
        self.publication_year =
            (MIN_PUBLICATION_YEAR..=MAX_PUBLICATION_YEAR).contains(&year).then_some(year);
        self
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = non_blank(publisher.into());
        self
    }

    pub fn with_page_count(mut self, pages: u32) -> Self {
        self.page_count = (pages > 0).then_some(pages);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = non_blank(description.into());
        self
    }

    pub fn with_cover_image_url(mut self, url: impl Into<String>) -> Self {
        self.cover_image_url = non_blank(url.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category_name = non_blank(category.into());
        self
    }

    /// Average rating and the number of ratings behind it.
    pub fn with_rating(mut self, average: f64, count: u32) -> Self {
        if average.is_finite() && average >= 0.0 {
            self.average_rating = Some(average);
            self.rating_count = Some(count);
        }
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn isbn(&self) -> Option<&str> {
        self.isbn.as_deref()
    }

    pub fn publication_year(&self) -> Option<i32> {
        self.publication_year
    }

    pub fn publisher(&self) -> Option<&str> {
        self.publisher.as_deref()
    }

    pub fn page_count(&self) -> Option<u32> {
        self.page_count
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn cover_image_url(&self) -> Option<&str> {
        self.cover_image_url.as_deref()
    }

    pub fn category_name(&self) -> Option<&str> {
        self.category_name.as_deref()
    }

    pub fn average_rating(&self) -> Option<f64> {
        self.average_rating
    }

    pub fn rating_count(&self) -> Option<u32> {
        self.rating_count
    }

    pub fn source(&self) -> BookSource {
        self.source
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_owned())
    }
}

/// Field used to order local results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    /// Weighted relevance score (the default).
    #[default]
    Relevance,
    Title,
    Author,
    PublicationYear,
    AverageRating,
}

impl SortField {
    /// Parse a request parameter; unknown values are rejected by the caller.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "relevance" | "score" => Some(Self::Relevance),
            "title" => Some(Self::Title),
            "author" => Some(Self::Author),
            "year" | "publicationyear" | "publication_year" => Some(Self::PublicationYear),
            "rating" | "averagerating" | "average_rating" => Some(Self::AverageRating),
            _ => None,
        }
    }
}

/// Sort direction for non-relevance sorts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Health snapshot for one external provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealthStatus {
    pub provider_name: String,
    pub healthy: bool,
    /// Last recorded failure, cleared by the next success.
    #[serde(rename = "message")]
    pub last_error_message: Option<String>,
    pub circuit_state: CircuitState,
    /// Set when a permanent misconfiguration took the provider out of rotation.
    pub disabled: bool,
}

/// One page of merged search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedSearchResult {
    pub content: Vec<BookRecord>,
    /// Size of the deduplicated result set before pagination.
    pub total_elements: usize,
    pub total_pages: usize,
    pub page: usize,
    pub size: usize,
    /// True iff at least one provider call was dispatched.
    pub external_search_performed: bool,
    pub provider_health: BTreeMap<String, ProviderHealthStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_title_drops_record() {
        assert!(BookRecord::new("", BookSource::OpenLibrary).is_none());
        assert!(BookRecord::new("   ", BookSource::GoogleBooks).is_none());
    }

    #[test]
    fn title_is_trimmed() {
        let record = BookRecord::new("  Dune ", BookSource::Local).expect("title");
        assert_eq!(record.title(), "Dune");
        assert_eq!(record.source(), BookSource::Local);
    }

    #[test]
    fn authors_joined_with_comma_space() {
        let record = BookRecord::new("Good Omens", BookSource::OpenLibrary)
            .expect("title")
            .with_authors(&["Terry Pratchett", " ", "Neil Gaiman"]);
        assert_eq!(record.author(), Some("Terry Pratchett, Neil Gaiman"));
    }

    #[test]
    fn empty_author_list_is_none() {
        let record = BookRecord::new("Anonymous", BookSource::OpenLibrary)
            .expect("title")
            .with_authors::<&str>(&[]);
        assert!(record.author().is_none());
    }

    #[test]
    fn implausible_years_are_nulled() {
        let base = BookRecord::new("X", BookSource::GoogleBooks).expect("title");
        assert_eq!(base.clone().with_publication_year(1400).publication_year(), Some(1400));
        assert_eq!(base.clone().with_publication_year(2030).publication_year(), Some(2030));
        assert!(base.clone().with_publication_year(1399).publication_year().is_none());
        assert!(base.with_publication_year(2031).publication_year().is_none());
    }

    #[test]
    fn isbn_candidates_prefer_13() {
        let record = BookRecord::new("Clean Code", BookSource::OpenLibrary)
            .expect("title")
            .with_isbn_candidates(["0132350882", "978-0132350884"]);
        assert_eq!(record.isbn(), Some("9780132350884"));
    }

    #[test]
    fn invalid_rating_ignored() {
        let record = BookRecord::new("X", BookSource::Local)
            .expect("title")
            .with_rating(f64::NAN, 3);
        assert!(record.average_rating().is_none());
        assert!(record.rating_count().is_none());
    }

    #[test]
    fn record_serializes_camel_case() {
        let record = BookRecord::new("Dune", BookSource::OpenLibrary)
            .expect("title")
            .with_publication_year(1965);
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["publicationYear"], 1965);
        assert_eq!(json["source"], "OPEN_LIBRARY");
    }

    #[test]
    fn sort_field_parsing() {
        assert_eq!(SortField::parse(""), Some(SortField::Relevance));
        assert_eq!(SortField::parse("Title"), Some(SortField::Title));
        assert_eq!(SortField::parse("year"), Some(SortField::PublicationYear));
        assert_eq!(SortField::parse("rating"), Some(SortField::AverageRating));
        assert_eq!(SortField::parse("price"), None);
        assert_eq!(SortDirection::parse("DESC"), Some(SortDirection::Desc));
        assert_eq!(SortDirection::parse("sideways"), None);
    }
}
