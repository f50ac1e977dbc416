//! Query preprocessing and validation.
//!
//! Turns a raw [`SearchRequest`] (as it arrives from a caller) into a
//! validated [`SearchQuery`]:
//!
//! - trims the text, strips quote characters and collapses whitespace
//! - truncates to [`MAX_QUERY_CHARS`] characters instead of rejecting
//! - derives a lower-cased matching key
//! - rejects negative pages and inverted or out-of-range filter bounds
//! - clamps `size` into `1..=MAX_PAGE_SIZE`
//!
//! An empty query is valid and means "list everything".

use serde::Deserialize;

use crate::error::{Result, SearchError};
use crate::isbn::canonical_isbn;
use crate::types::{BookRecord, SortDirection, SortField};

/// Longest query text kept after normalisation.
pub const MAX_QUERY_CHARS: usize = 100;
/// Shortest fragment eligible for autosuggest.
pub const MIN_SUGGEST_CHARS: usize = 2;
pub const MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_PAGE_SIZE: usize = 20;

const QUOTE_CHARS: [char; 7] = ['"', '\'', '`', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

/// Raw search parameters, as received.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(alias = "q")]
    pub query: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub rating_from: Option<f64>,
    pub rating_to: Option<f64>,
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub sort: Option<String>,
    pub direction: Option<String>,
    pub include_external: bool,
}

impl SearchRequest {
    /// A request for `text` with every other parameter at its default.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            query: Some(text.into()),
            ..Default::default()
        }
    }
}

/// Validated catalog predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    /// Lower-cased title fragment.
    pub title: Option<String>,
    /// Lower-cased category fragment.
    pub category: Option<String>,
    /// Lower-cased author fragment.
    pub author: Option<String>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub rating_from: Option<f64>,
    pub rating_to: Option<f64>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Deterministic textual form used in cache keys.
    pub fn signature(&self) -> String {
        fn opt<T: std::fmt::Debug>(v: &Option<T>) -> String {
            v.as_ref().map(|v| format!("{v:?}")).unwrap_or_default()
        }
        format!(
            "t={};c={};a={};y={}..{};r={}..{}",
            opt(&self.title),
            opt(&self.category),
            opt(&self.author),
            opt(&self.year_from),
            opt(&self.year_to),
            opt(&self.rating_from),
            opt(&self.rating_to),
        )
    }

    /// Whether `record` satisfies every predicate. A bounded field that the
    /// record lacks fails the predicate.
    pub fn matches(&self, record: &BookRecord) -> bool {
        if let Some(title) = &self.title {
            if !fold(record.title()).contains(title.as_str()) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if !record.category_name().is_some_and(|c| fold(c).contains(category.as_str())) {
                return false;
            }
        }
        if let Some(author) = &self.author {
            if !record.author().is_some_and(|a| fold(a).contains(author.as_str())) {
                return false;
            }
        }
        if self.year_from.is_some() || self.year_to.is_some() {
            let Some(year) = record.publication_year() else {
                return false;
            };
            if self.year_from.is_some_and(|from| year < from)
                || self.year_to.is_some_and(|to| year > to)
            {
                return false;
            }
        }
        if self.rating_from.is_some() || self.rating_to.is_some() {
            let Some(rating) = record.average_rating() else {
                return false;
            };
            if self.rating_from.is_some_and(|from| rating < from)
                || self.rating_to.is_some_and(|to| rating > to)
            {
                return false;
            }
        }
        true
    }
}

/// A validated, normalised search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub raw_text: String,
    pub normalized_text: String,
    /// Lower-cased `normalized_text`; what matching and cache keys use.
    pub match_key: String,
    pub filters: SearchFilters,
    pub page: usize,
    pub size: usize,
    pub sort: SortField,
    pub direction: SortDirection,
    pub include_external: bool,
}

impl SearchQuery {
    /// Whitespace-separated matching terms. Empty for a "list everything"
    /// query.
    pub fn terms(&self) -> Vec<String> {
        self.match_key.split_whitespace().map(str::to_owned).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.match_key.is_empty()
    }

    /// The query as a canonical ISBN-13, if it looks like any ISBN.
    pub fn isbn(&self) -> Option<String> {
        canonical_isbn(&self.normalized_text)
    }

    /// Deterministic textual form of the sort options, used in cache keys.
    pub fn sort_signature(&self) -> String {
        format!("{:?}:{:?}", self.sort, self.direction)
    }
}

/// Lower-case `text` and drop quote characters so catalog fields compare
/// the same way queries do.
pub fn fold(text: &str) -> String {
    text.chars()
        .filter(|c| !QUOTE_CHARS.contains(c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Trim, strip quotes, collapse whitespace and cap the length.
pub fn normalize_text(raw: &str) -> String {
    let unquoted: String = raw.chars().filter(|c| !QUOTE_CHARS.contains(c)).collect();
    let collapsed = unquoted.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_QUERY_CHARS {
        return collapsed;
    }
    let truncated: String = collapsed.chars().take(MAX_QUERY_CHARS).collect();
    truncated.trim_end().to_owned()
}

/// Normalised, lower-cased suggest fragment, or `None` when it is too short
/// to be worth suggesting for.
pub fn suggest_key(raw: &str) -> Option<String> {
    let key = normalize_text(raw).to_lowercase();
    (key.chars().count() >= MIN_SUGGEST_CHARS).then_some(key)
}

fn lowered(value: Option<&str>) -> Option<String> {
    value
        .map(|v| normalize_text(v).to_lowercase())
        .filter(|v| !v.is_empty())
}

fn check_rating(field: &'static str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !(0.0..=5.0).contains(&v) => Err(SearchError::validation(
            field,
            format!("must be between 0 and 5, got {v}"),
        )),
        _ => Ok(()),
    }
}

/// Validate and normalise a raw request.
///
/// # Errors
///
/// [`SearchError::Validation`] naming the offending field for a negative
/// page, an unknown sort or direction, an inverted year or rating range, or
/// a rating outside `0..=5`.
pub fn preprocess(request: &SearchRequest) -> Result<SearchQuery> {
    let page = match request.page {
        None => 0,
        Some(p) if p < 0 => {
            return Err(SearchError::validation("page", format!("must be >= 0, got {p}")))
        }
        Some(p) => usize::try_from(p).unwrap_or(usize::MAX),
    };
    let size = match request.size {
        None => DEFAULT_PAGE_SIZE,
        Some(s) => s.clamp(1, MAX_PAGE_SIZE as i64) as usize,
    };

    let sort = match request.sort.as_deref() {
        None => SortField::default(),
        Some(raw) => SortField::parse(raw)
            .ok_or_else(|| SearchError::validation("sort", format!("unknown sort field '{raw}'")))?,
    };
    let direction = match request.direction.as_deref() {
        None => SortDirection::default(),
        Some(raw) => SortDirection::parse(raw).ok_or_else(|| {
            SearchError::validation("direction", format!("expected asc or desc, got '{raw}'"))
        })?,
    };

    if let (Some(from), Some(to)) = (request.year_from, request.year_to) {
        if from > to {
            return Err(SearchError::validation(
                "yearFrom",
                format!("{from} is after yearTo {to}"),
            ));
        }
    }
    check_rating("ratingFrom", request.rating_from)?;
    check_rating("ratingTo", request.rating_to)?;
    if let (Some(from), Some(to)) = (request.rating_from, request.rating_to) {
        if from > to {
            return Err(SearchError::validation(
                "ratingFrom",
                format!("{from} is above ratingTo {to}"),
            ));
        }
    }

    let raw_text = request.query.clone().unwrap_or_default();
    let normalized_text = normalize_text(&raw_text);
    let match_key = normalized_text.to_lowercase();

    Ok(SearchQuery {
        raw_text,
        normalized_text,
        match_key,
        filters: SearchFilters {
            title: lowered(request.title.as_deref()),
            category: lowered(request.category.as_deref()),
            author: lowered(request.author.as_deref()),
            year_from: request.year_from,
            year_to: request.year_to,
            rating_from: request.rating_from,
            rating_to: request.rating_to,
        },
        page,
        size,
        sort,
        direction,
        include_external: request.include_external,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BookSource;

    #[test]
    fn normalizes_quotes_and_whitespace() {
        assert_eq!(normalize_text("  \"The   Hobbit\"  "), "The Hobbit");
        assert_eq!(normalize_text("\u{201C}Dune\u{201D}\tMessiah"), "Dune Messiah");
    }

    #[test]
    fn long_query_is_truncated_not_rejected() {
        let long = "a".repeat(250);
        let query = preprocess(&SearchRequest::text(long)).expect("valid");
        assert_eq!(query.normalized_text.chars().count(), MAX_QUERY_CHARS);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(150);
        assert_eq!(normalize_text(&long).chars().count(), MAX_QUERY_CHARS);
    }

    #[test]
    fn empty_query_is_valid() {
        let query = preprocess(&SearchRequest::default()).expect("valid");
        assert!(query.is_empty());
        assert!(query.terms().is_empty());
        assert_eq!(query.page, 0);
        assert_eq!(query.size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn match_key_is_lower_cased() {
        let query = preprocess(&SearchRequest::text("Le Guin EARTHSEA")).expect("valid");
        assert_eq!(query.normalized_text, "Le Guin EARTHSEA");
        assert_eq!(query.terms(), vec!["le", "guin", "earthsea"]);
    }

    #[test]
    fn negative_page_rejected() {
        let request = SearchRequest {
            page: Some(-1),
            ..Default::default()
        };
        let err = preprocess(&request).unwrap_err();
        assert!(matches!(err, SearchError::Validation { field: "page", .. }));
    }

    #[test]
    fn size_is_clamped() {
        let cases = [(0, 1), (-5, 1), (1, 1), (50, 50), (100, 100), (101, 100), (10_000, 100)];
        for (raw, expected) in cases {
            let request = SearchRequest {
                size: Some(raw),
                ..Default::default()
            };
            assert_eq!(preprocess(&request).expect("valid").size, expected, "size {raw}");
        }
    }

    #[test]
    fn inverted_year_range_rejected() {
        let request = SearchRequest {
            year_from: Some(2000),
            year_to: Some(1990),
            ..Default::default()
        };
        assert!(matches!(
            preprocess(&request),
            Err(SearchError::Validation { field: "yearFrom", .. })
        ));
    }

    #[test]
    fn rating_bounds_checked() {
        let request = SearchRequest {
            rating_to: Some(7.0),
            ..Default::default()
        };
        assert!(matches!(
            preprocess(&request),
            Err(SearchError::Validation { field: "ratingTo", .. })
        ));
    }

    #[test]
    fn unknown_sort_rejected() {
        let request = SearchRequest {
            sort: Some("popularity".into()),
            ..Default::default()
        };
        assert!(matches!(
            preprocess(&request),
            Err(SearchError::Validation { field: "sort", .. })
        ));
    }

    #[test]
    fn suggest_requires_two_chars() {
        assert_eq!(suggest_key("a"), None);
        assert_eq!(suggest_key("  \"a\" "), None);
        assert_eq!(suggest_key("Du"), Some("du".to_string()));
    }

    #[test]
    fn isbn_query_detected() {
        let query = preprocess(&SearchRequest::text("978-0-441-01359-3")).expect("valid");
        assert_eq!(query.isbn().as_deref(), Some("9780441013593"));
        let query = preprocess(&SearchRequest::text("0441013597")).expect("valid");
        assert_eq!(query.isbn().as_deref(), Some("9780441013593"));
        let query = preprocess(&SearchRequest::text("dune")).expect("valid");
        assert_eq!(query.isbn(), None);
    }

    #[test]
    fn filter_signature_differs_per_filter() {
        let a = SearchFilters {
            category: Some("fantasy".into()),
            ..Default::default()
        };
        let b = SearchFilters {
            author: Some("fantasy".into()),
            ..Default::default()
        };
        assert_ne!(a.signature(), b.signature());
        assert_eq!(a.signature(), a.clone().signature());
    }

    #[test]
    fn filters_match_records() {
        let record = BookRecord::new("Dune", BookSource::Local)
            .expect("record")
            .with_author("Frank Herbert")
            .with_category("Science Fiction")
            .with_publication_year(1965)
            .with_rating(4.3, 10);

        let filters = SearchFilters {
            category: Some("science".into()),
            year_from: Some(1960),
            year_to: Some(1970),
            rating_from: Some(4.0),
            ..Default::default()
        };
        assert!(filters.matches(&record));

        let filters = SearchFilters {
            author: Some("tolkien".into()),
            ..Default::default()
        };
        assert!(!filters.matches(&record));

        let undated = BookRecord::new("Undated", BookSource::Local).expect("record");
        let filters = SearchFilters {
            year_from: Some(1900),
            ..Default::default()
        };
        assert!(!filters.matches(&undated));
    }

    #[test]
    fn request_deserializes_from_camel_case() {
        let request: SearchRequest = serde_json::from_str(
            r#"{"q": "dune", "yearFrom": 1960, "includeExternal": true, "size": 5}"#,
        )
        .expect("deserialize");
        assert_eq!(request.query.as_deref(), Some("dune"));
        assert_eq!(request.year_from, Some(1960));
        assert!(request.include_external);
        assert_eq!(request.size, Some(5));
    }
}
