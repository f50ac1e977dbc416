//! Shelf host binary: serves the book search API over HTTP.
//!
//! Configuration is read from `$SHELF_CONFIG` or the platform config
//! directory; see [`shelf::ShelfConfig`]. Tracing goes to stderr, filtered
//! by `RUST_LOG` (default `info`).

use shelf::{ApiServer, ShelfConfig, build_orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = ShelfConfig::resolve_path();
    let mut config = ShelfConfig::load_or_default(&config_path)?;
    config.apply_env();
    tracing::info!(config = %config_path.display(), "shelf-host starting");

    let orchestrator = build_orchestrator(&config).map_err(|e| {
        tracing::error!(error = %e, "startup failed");
        anyhow::anyhow!("shelf-host failed to start: {e}")
    })?;
    orchestrator.start_background_tasks();

    let server = ApiServer::start(orchestrator.clone(), &config.bind_addr).await?;
    tracing::info!(addr = %server.addr(), "shelf-host ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");

    server.shutdown();
    orchestrator.shutdown().await;
    tracing::info!("shelf-host shut down cleanly");
    Ok(())
}
