//! Error types for the shelf-search crate.
//!
//! All errors use stable string messages suitable for display to users
//! and programmatic handling. No API keys or sensitive data appear in
//! error messages.

/// Errors that can occur during book search operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// A request parameter is out of bounds.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Name of the offending request field.
        field: &'static str,
        /// Human-readable reason.
        message: String,
    },

    /// A direct lookup referenced something that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The local catalog could not be read. Fatal for the request.
    #[error("catalog unavailable: {0}")]
    Catalog(String),

    /// A provider call exceeded its time budget.
    #[error("provider timed out: {0}")]
    Timeout(String),

    /// A provider request failed at the transport level.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A provider answered with a non-success status.
    #[error("{provider} returned HTTP {code}")]
    Status {
        /// Provider display name.
        provider: &'static str,
        /// HTTP status code.
        code: u16,
    },

    /// A provider response body could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// A provider rejected our credentials or they are missing.
    #[error("credential error: {0}")]
    Auth(String),

    /// The provider's circuit breaker is open.
    #[error("circuit open for {0}")]
    CircuitOpen(String),

    /// The provider was disabled after a permanent failure.
    #[error("provider disabled: {0}")]
    ProviderDisabled(String),

    /// Invalid search configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl SearchError {
    /// Shorthand for a [`SearchError::Validation`].
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Network failures, timeouts, throttling and server errors are
    /// transient. Malformed bodies, credential problems and client errors
    /// are permanent and never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Http(_) => true,
            Self::Status { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }

    /// Whether the failure means the provider is misconfigured and should be
    /// taken out of rotation until its configuration changes.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Convenience type alias for shelf-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
