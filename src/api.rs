//! HTTP API over the search orchestrator.
//!
//! ## Endpoints
//!
//! - `GET /api/books/search`: full search; query parameters mirror
//!   [`SearchRequest`] (`q`, `title`, `category`, `author`, `yearFrom`,
//!   `yearTo`, `ratingFrom`, `ratingTo`, `page`, `size`, `sort`,
//!   `direction`, `includeExternal`)
//! - `GET /api/books/suggest?q=..&limit=..`: local autosuggest
//! - `GET /api/books/isbn/{isbn}`: ISBN lookup, local first
//! - `GET /api/books/{id}`: local record by id
//! - `GET /api/providers/health`: health of every provider
//! - `GET /api/providers/{name}/health`: health and call counters of one provider
//! - `POST /api/providers/{name}/reset`: close the circuit and re-enable
//!
//! Errors are JSON bodies `{ "error": kind, "message": .., "field": .. }`.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use shelf_search::{
    AggregatedSearchResult, BookRecord, GuardMetrics, ProviderHealthStatus, SearchError,
    SearchOrchestrator, SearchRequest,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::{AppError, Result};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable error kind (`validation`, `not_found`, `catalog_unavailable`, ...).
    pub error: String,
    pub message: String,
    /// Offending parameter for validation errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct SuggestParams {
    q: String,
    limit: Option<usize>,
}

/// One provider's health together with its call counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDiagnostics {
    #[serde(flatten)]
    pub health: ProviderHealthStatus,
    pub metrics: Option<GuardMetrics>,
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// A [`SearchError`] on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError(SearchError);

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        Self(err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(SearchError::validation("query", rejection.body_text()))
    }
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            SearchError::Validation { .. } => (StatusCode::BAD_REQUEST, "validation"),
            SearchError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            SearchError::Catalog(_) => (StatusCode::SERVICE_UNAVAILABLE, "catalog_unavailable"),
            SearchError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            _ => (StatusCode::BAD_GATEWAY, "upstream"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let field = match &self.0 {
            SearchError::Validation { field, .. } => Some((*field).to_owned()),
            _ => None,
        };
        let body = ErrorBody {
            error: kind.to_owned(),
            message: self.0.to_string(),
            field,
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<SearchOrchestrator>,
}

/// Build the API router.
pub fn router(orchestrator: Arc<SearchOrchestrator>) -> Router {
    Router::new()
        .route("/api/books/search", get(handle_search))
        .route("/api/books/suggest", get(handle_suggest))
        .route("/api/books/isbn/{isbn}", get(handle_isbn))
        .route("/api/books/{id}", get(handle_book))
        .route("/api/providers/health", get(handle_all_health))
        .route("/api/providers/{name}/health", get(handle_provider_health))
        .route("/api/providers/{name}/reset", post(handle_reset))
        .with_state(AppState { orchestrator })
}

/// A running API listener.
pub struct ApiServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ApiServer {
    /// Bind `bind_addr` and serve the API in a background task.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Server`] if the address cannot be bound.
    pub async fn start(orchestrator: Arc<SearchOrchestrator>, bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| AppError::Server(format!("bind {bind_addr} failed: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| AppError::Server(format!("failed to get local addr: {e}")))?;

        info!("shelf API listening on http://{addr}/api");

        let app = router(orchestrator);
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("API server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

async fn handle_search(
    State(state): State<AppState>,
    query: std::result::Result<Query<SearchRequest>, QueryRejection>,
) -> ApiResult<AggregatedSearchResult> {
    let Query(request) = query?;
    Ok(Json(state.orchestrator.search(&request).await?))
}

async fn handle_suggest(
    State(state): State<AppState>,
    query: std::result::Result<Query<SuggestParams>, QueryRejection>,
) -> ApiResult<Vec<String>> {
    let Query(params) = query?;
    Ok(Json(state.orchestrator.suggest(&params.q, params.limit).await?))
}

async fn handle_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<BookRecord> {
    Ok(Json(state.orchestrator.book_by_id(&id).await?))
}

async fn handle_isbn(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
) -> ApiResult<BookRecord> {
    Ok(Json(state.orchestrator.lookup_isbn(&isbn).await?))
}

async fn handle_all_health(
    State(state): State<AppState>,
) -> Json<BTreeMap<String, ProviderHealthStatus>> {
    Json(state.orchestrator.health_report())
}

async fn handle_provider_health(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<ProviderDiagnostics> {
    let health = state.orchestrator.provider_health(&name)?;
    let metrics = state
        .orchestrator
        .provider_metrics()
        .remove(&health.provider_name);
    Ok(Json(ProviderDiagnostics { health, metrics }))
}

async fn handle_reset(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> std::result::Result<StatusCode, ApiError> {
    state.orchestrator.reset_provider(&name)?;
    info!(provider = %name, "provider reset via API");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn validation_maps_to_400_with_field() {
        let err = ApiError::from(SearchError::validation("page", "must be >= 0"));
        assert_eq!(err.status_and_kind(), (StatusCode::BAD_REQUEST, "validation"));
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = ApiError::from(SearchError::NotFound("book 9".into()));
        assert_eq!(err.status_and_kind().0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn catalog_failure_maps_to_503() {
        let err = ApiError::from(SearchError::Catalog("disk gone".into()));
        assert_eq!(err.status_and_kind().0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn error_body_omits_absent_field() {
        let body = ErrorBody {
            error: "not_found".into(),
            message: "not found: book 9".into(),
            field: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("field").is_none());
    }
}
