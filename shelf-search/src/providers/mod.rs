//! External bibliographic provider implementations.
//!
//! Each provider is a thin HTTP client plus one pure mapping function from
//! its wire schema to [`BookRecord`](crate::types::BookRecord).

pub mod google_books;
pub mod open_library;

use std::sync::Arc;

pub use google_books::GoogleBooksProvider;
pub use open_library::OpenLibraryProvider;

use crate::config::ProviderConfig;
use crate::error::{Result, SearchError};
use crate::provider::BookProvider;
use crate::types::BookSource;

/// Construct the provider named by `config.kind`.
///
/// # Errors
///
/// Returns [`SearchError::Config`] for [`BookSource::Local`] or when the
/// HTTP client cannot be built.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn BookProvider>> {
    match config.kind {
        BookSource::OpenLibrary => Ok(Arc::new(OpenLibraryProvider::new(config)?)),
        BookSource::GoogleBooks => Ok(Arc::new(GoogleBooksProvider::new(config)?)),
        BookSource::Local => Err(SearchError::Config(
            "the local catalog is not an external provider".into(),
        )),
    }
}

/// Build `{base}/{path}` with the given query parameters.
pub(crate) fn endpoint(base: &str, path: &str, params: &[(&str, &str)]) -> Result<url::Url> {
    let raw = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    let mut url = url::Url::parse(&raw)
        .map_err(|e| SearchError::Config(format!("invalid provider URL {raw}: {e}")))?;
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_each_external_kind() {
        let ol = build_provider(&ProviderConfig::open_library()).expect("ol");
        assert_eq!(ol.source(), BookSource::OpenLibrary);
        let gb = build_provider(&ProviderConfig::google_books()).expect("gb");
        assert_eq!(gb.source(), BookSource::GoogleBooks);
    }

    #[test]
    fn local_kind_rejected() {
        let config = ProviderConfig {
            kind: BookSource::Local,
            ..ProviderConfig::open_library()
        };
        assert!(build_provider(&config).is_err());
    }

    #[test]
    fn endpoint_joins_and_encodes() {
        let url = endpoint("http://localhost:9000/", "/search.json", &[("q", "the hobbit")])
            .expect("url");
        assert_eq!(url.path(), "/search.json");
        assert_eq!(url.query(), Some("q=the+hobbit"));
    }
}
