//! Google Books volumes API client.
//!
//! Calls `GET {base}/volumes?q=...` using the `intitle:`, `inauthor:` and
//! `isbn:` search operators for field lookups. An API key is optional unless
//! `require_api_key` is set, in which case a missing key is reported as a
//! credential error so the guard takes the provider out of rotation.

use async_trait::async_trait;
use serde::Deserialize;

use super::endpoint;
use crate::config::ProviderConfig;
use crate::error::{Result, SearchError};
use crate::http::{build_client, get_json};
use crate::provider::BookProvider;
use crate::types::{BookRecord, BookSource};

/// Documented maximum for `maxResults`.
pub const MAX_RESULTS: usize = 40;

const COVER_URL_TEMPLATE: &str =
    "https://books.google.com/books/content?id={id}&printsec=frontcover&img=1&zoom=1";

#[derive(Debug, Default, Deserialize)]
pub struct VolumesResponse {
    #[serde(default)]
    pub items: Vec<Volume>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub id: Option<String>,
    pub volume_info: Option<VolumeInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    /// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
    pub published_date: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub industry_identifiers: Vec<IndustryIdentifier>,
    pub page_count: Option<u32>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IndustryIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
}

fn published_year(date: &str) -> Option<i32> {
    date.get(..4)?.parse().ok()
}

/// Map one volume. Returns `None` when `volumeInfo` or its title is missing.
pub fn map_volume(volume: Volume) -> Option<BookRecord> {
    let info = volume.volume_info?;
    let isbns = info
        .industry_identifiers
        .iter()
        .filter(|i| i.kind.starts_with("ISBN"))
        .map(|i| i.identifier.as_str());

    let mut record = BookRecord::new(info.title.as_deref()?, BookSource::GoogleBooks)?
        .with_authors(&info.authors)
        .with_isbn_candidates(isbns);

    if let Some(id) = volume.id {
        record = record
            .with_cover_image_url(COVER_URL_TEMPLATE.replace("{id}", &id))
            .with_id(id);
    }
    if let Some(year) = info.published_date.as_deref().and_then(published_year) {
        record = record.with_publication_year(year);
    }
    if let Some(publisher) = info.publisher {
        record = record.with_publisher(publisher);
    }
    if let Some(description) = info.description {
        record = record.with_description(description);
    }
    if let Some(pages) = info.page_count {
        record = record.with_page_count(pages);
    }
    if let Some(category) = info.categories.into_iter().next() {
        record = record.with_category(category);
    }
    if let Some(average) = info.average_rating {
        record = record.with_rating(average, info.ratings_count.unwrap_or(0));
    }
    Some(record)
}

pub fn map_response(response: VolumesResponse) -> Vec<BookRecord> {
    response.items.into_iter().filter_map(map_volume).collect()
}

/// Google Books provider.
#[derive(Clone)]
pub struct GoogleBooksProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    require_api_key: bool,
}

impl std::fmt::Debug for GoogleBooksProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleBooksProvider")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl GoogleBooksProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.resolved_base_url().to_owned(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            require_api_key: config.require_api_key,
        })
    }

    async fn fetch(&self, q: &str, max_results: usize) -> Result<Vec<BookRecord>> {
        if self.require_api_key && self.api_key.is_none() {
            return Err(SearchError::Auth(
                "GoogleBooks API key is required but not configured".into(),
            ));
        }
        let max = self.clamp_max_results(max_results).to_string();
        let mut params = vec![("q", q), ("maxResults", max.as_str()), ("printType", "books")];
        if let Some(key) = self.api_key.as_deref() {
            params.push(("key", key));
        }
        let url = endpoint(&self.base_url, "volumes", &params)?;
        tracing::trace!(q, max_results = %max, "querying GoogleBooks");
        let response: VolumesResponse = get_json(&self.client, "GoogleBooks", url).await?;
        let records = map_response(response);
        tracing::debug!(count = records.len(), "GoogleBooks returned results");
        Ok(records)
    }
}

#[async_trait]
impl BookProvider for GoogleBooksProvider {
    fn source(&self) -> BookSource {
        BookSource::GoogleBooks
    }

    fn max_results_limit(&self) -> usize {
        MAX_RESULTS
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<BookRecord>> {
        self.fetch(query, max_results).await
    }

    async fn search_by_isbn(&self, isbn: &str) -> Result<Vec<BookRecord>> {
        self.fetch(&format!("isbn:{isbn}"), 1).await
    }

    async fn search_by_title(&self, title: &str, max_results: usize) -> Result<Vec<BookRecord>> {
        self.fetch(&format!("intitle:{title}"), max_results).await
    }

    async fn search_by_author(&self, author: &str, max_results: usize) -> Result<Vec<BookRecord>> {
        self.fetch(&format!("inauthor:{author}"), max_results).await
    }
}
