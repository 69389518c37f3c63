// Main entry point for the export API server

use std::sync::Arc;

use anyhow::{Context, Result};
use effi_driver::{WebDriverLauncher, XlsxGuideDecoder};
use server_core::kernel::{start_scheduler, GuideCache, JobManager, ServerDeps};
use server_core::server::build_app;
use server_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Effi export API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(stores = config.stores.len(), "Configuration loaded");

    // Working directories for artifacts and cache snapshots
    std::fs::create_dir_all(&config.work_dir).context("Failed to create working directory")?;
    std::fs::create_dir_all(config.cache_dir()).context("Failed to create cache directory")?;
    std::fs::create_dir_all(config.download_dir())
        .context("Failed to create download directory")?;

    // Restore cached datasets persisted by a previous process
    let cache = Arc::new(GuideCache::new(config.cache_dir()));
    let restored = cache.restore().context("Failed to restore cache from disk")?;
    tracing::info!(stores = restored, "Cache restored from disk");

    let launcher = Arc::new(WebDriverLauncher::new(
        config.webdriver_url.clone(),
        config.headless,
        config.download_dir(),
    ));
    let decoder = Arc::new(XlsxGuideDecoder::new());

    let port = config.port;
    let deps = Arc::new(ServerDeps::new(
        Arc::new(config),
        launcher,
        decoder,
        cache.clone(),
    ));
    let jobs = Arc::new(JobManager::new(deps.clone()));

    // Periodic cache sweep
    let mut scheduler = start_scheduler(cache)
        .await
        .context("Failed to start scheduled tasks")?;

    // Build application
    let app = build_app(deps, jobs);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // In-flight jobs are abandoned on shutdown; their browser sessions die
    // with the WebDriver connection.
    scheduler.shutdown().await.ok();
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
