//! Shelf: book search and discovery service.
//!
//! This crate hosts the [`shelf_search`] engine behind an HTTP API:
//!
//! # Architecture
//!
//! - **Config**: TOML file plus environment overrides ([`config::ShelfConfig`])
//! - **Startup**: loads the JSON catalog and builds the orchestrator
//! - **API**: axum routes mapping engine errors onto HTTP status codes
//!
//! All search semantics (ranking, provider fan-out, resilience, dedup,
//! caching) live in `shelf-search`.

pub mod api;
pub mod config;
pub mod error;
pub mod startup;

pub use api::ApiServer;
pub use config::ShelfConfig;
pub use error::{AppError, Result};
pub use startup::build_orchestrator;
