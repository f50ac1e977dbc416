//! OpenLibrary search API client.
//!
//! Calls `GET {base}/search.json` and maps each entry of `docs` into a
//! [`BookRecord`]. No credential is required.

use async_trait::async_trait;
use serde::Deserialize;

use super::endpoint;
use crate::config::ProviderConfig;
use crate::error::Result;
use crate::http::{build_client, get_json};
use crate::provider::BookProvider;
use crate::types::{BookRecord, BookSource};

/// Documented maximum for the `limit` parameter.
pub const MAX_RESULTS: usize = 100;

/// Fields requested from the search endpoint; keeps responses small.
const FIELDS: &str = "key,title,author_name,isbn,first_publish_year,publisher,\
number_of_pages_median,cover_i,subject,ratings_average,ratings_count";

const COVER_URL_TEMPLATE: &str = "https://covers.openlibrary.org/b/id/{id}-M.jpg";

/// Response body of `/search.json`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub docs: Vec<Doc>,
}

/// One search hit.
#[derive(Debug, Default, Deserialize)]
pub struct Doc {
    pub key: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub author_name: Vec<String>,
    #[serde(default)]
    pub isbn: Vec<String>,
    pub first_publish_year: Option<i32>,
    #[serde(default)]
    pub publisher: Vec<String>,
    pub number_of_pages_median: Option<u32>,
    pub cover_i: Option<i64>,
    #[serde(default)]
    pub subject: Vec<String>,
    pub ratings_average: Option<f64>,
    pub ratings_count: Option<u32>,
}

/// Map one OpenLibrary doc. Returns `None` when the title is missing.
pub fn map_doc(doc: Doc) -> Option<BookRecord> {
    let mut record = BookRecord::new(doc.title.as_deref()?, BookSource::OpenLibrary)?
        .with_authors(&doc.author_name)
        .with_isbn_candidates(doc.isbn.iter().map(String::as_str));

    if let Some(key) = doc.key {
        record = record.with_id(key.trim_start_matches("/works/"));
    }
    if let Some(year) = doc.first_publish_year {
        record = record.with_publication_year(year);
    }
    if let Some(publisher) = doc.publisher.into_iter().next() {
        record = record.with_publisher(publisher);
    }
    if let Some(pages) = doc.number_of_pages_median {
        record = record.with_page_count(pages);
    }
    if let Some(cover) = doc.cover_i.filter(|id| *id > 0) {
        record =
            record.with_cover_image_url(COVER_URL_TEMPLATE.replace("{id}", &cover.to_string()));
    }
    if let Some(subject) = doc.subject.into_iter().next() {
        record = record.with_category(subject);
    }
    if let Some(average) = doc.ratings_average {
        record = record.with_rating(average, doc.ratings_count.unwrap_or(0));
    }
    Some(record)
}

/// Map a whole response, dropping untitled docs.
pub fn map_response(response: SearchResponse) -> Vec<BookRecord> {
    response.docs.into_iter().filter_map(map_doc).collect()
}

/// OpenLibrary provider.
#[derive(Debug, Clone)]
pub struct OpenLibraryProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OpenLibraryProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.resolved_base_url().to_owned(),
        })
    }

    async fn fetch(&self, param: &str, value: &str, max_results: usize) -> Result<Vec<BookRecord>> {
        let limit = self.clamp_max_results(max_results).to_string();
        let url = endpoint(
            &self.base_url,
            "search.json",
            &[(param, value), ("limit", &limit), ("fields", FIELDS)],
        )?;
        tracing::trace!(param, value, limit = %limit, "querying OpenLibrary");
        let response: SearchResponse = get_json(&self.client, "OpenLibrary", url).await?;
        let records = map_response(response);
        tracing::debug!(count = records.len(), "OpenLibrary returned results");
        Ok(records)
    }
}

#[async_trait]
impl BookProvider for OpenLibraryProvider {
    fn source(&self) -> BookSource {
        BookSource::OpenLibrary
    }

    fn max_results_limit(&self) -> usize {
        MAX_RESULTS
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<BookRecord>> {
        self.fetch("q", query, max_results).await
    }

    async fn search_by_isbn(&self, isbn: &str) -> Result<Vec<BookRecord>> {
        self.fetch("isbn", isbn, 1).await
    }

    async fn search_by_title(&self, title: &str, max_results: usize) -> Result<Vec<BookRecord>> {
        self.fetch("title", title, max_results).await
    }

    async fn search_by_author(&self, author: &str, max_results: usize) -> Result<Vec<BookRecord>> {
        self.fetch("author", author, max_results).await
    }
}
