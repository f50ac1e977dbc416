//! Startup initialization: load the catalog and build the search engine.

use std::sync::Arc;

use shelf_search::{InMemoryCatalog, SearchOrchestrator};
use tracing::info;

use crate::config::ShelfConfig;
use crate::error::Result;

/// Validate `config`, load the catalog file and build the orchestrator.
///
/// Background tasks are not started; call
/// [`SearchOrchestrator::start_background_tasks`] once a runtime is up.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the catalog cannot
/// be read.
pub fn build_orchestrator(config: &ShelfConfig) -> Result<Arc<SearchOrchestrator>> {
    config.validate()?;
    let catalog = InMemoryCatalog::from_json_file(&config.catalog_path)?;
    info!(
        catalog = %config.catalog_path.display(),
        books = catalog.len(),
        "catalog ready"
    );
    let orchestrator = SearchOrchestrator::from_config(config.search.clone(), Arc::new(catalog))?;
    Ok(Arc::new(orchestrator))
}
