//! Shared HTTP plumbing for provider requests.
//!
//! Provides a [`reqwest::Client`] configured from a provider's
//! [`TimeoutConfig`](crate::config::TimeoutConfig) and a helper that turns a
//! response into a decoded JSON body or a classified [`SearchError`].

use serde::de::DeserializeOwned;

use crate::config::ProviderConfig;
use crate::error::SearchError;

/// Default User-Agent sent to providers. OpenLibrary asks API consumers to
/// identify themselves.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "shelf-search/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/saorsa-labs/shelf)"
);

/// Build a [`reqwest::Client`] for one provider.
///
/// The client has:
/// - Connect timeout and per-request (read) timeout from config
/// - Custom User-Agent if configured, otherwise [`DEFAULT_USER_AGENT`]
/// - gzip decompression
///
/// # Errors
///
/// Returns [`SearchError::Config`] if the client cannot be constructed.
pub fn build_client(config: &ProviderConfig) -> Result<reqwest::Client, SearchError> {
    let ua = config
        .user_agent
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned());

    reqwest::Client::builder()
        .connect_timeout(config.timeout.connect())
        .timeout(config.timeout.read())
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| SearchError::Config(format!("failed to build HTTP client: {e}")))
}

/// Send a GET request and decode the JSON body.
///
/// Status mapping: 401/403 become [`SearchError::Auth`] (the provider is
/// misconfigured), other non-success codes become [`SearchError::Status`].
/// Transport timeouts map to [`SearchError::Timeout`], other transport
/// failures to [`SearchError::Http`], undecodable bodies to
/// [`SearchError::Parse`].
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    provider: &'static str,
    url: url::Url,
) -> Result<T, SearchError> {
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| transport_error(provider, e))?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(SearchError::Auth(format!(
            "{provider} rejected credentials (HTTP {})",
            status.as_u16()
        )));
    }
    if !status.is_success() {
        return Err(SearchError::Status {
            provider,
            code: status.as_u16(),
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(provider, e))?;
    tracing::trace!(provider, bytes = body.len(), "provider response received");

    serde_json::from_slice(&body)
        .map_err(|e| SearchError::Parse(format!("{provider} response body: {e}")))
}

fn transport_error(provider: &'static str, err: reqwest::Error) -> SearchError {
    if err.is_timeout() {
        SearchError::Timeout(format!("{provider} request timed out"))
    } else {
        SearchError::Http(format!("{provider} request failed: {err}"))
    }
}
