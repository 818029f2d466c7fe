//! # JarBundle Server
//!
//! Downloads lists of plugin files, packs them into one ZIP and caches the
//! archive under a key derived from the requested file set.

mod api;
mod bundle;
mod services;
mod workers;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use bundle::fetch::HttpFileSource;
use bundle::{BundleService, Validator};
use jb_common::config::CacheBackend;
use services::bundle_cache::{BundleCache, MemoryBundleCache};
use services::redis_cache::RedisBundleCache;
use workers::TaskRunner;

/// How long shutdown waits for detached cache writes.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state available to all handlers.
pub struct AppState {
    pub config: jb_common::AppConfig,
    pub validator: Validator,
    pub bundles: BundleService,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Load configuration
    let config = jb_common::AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .json()
        .init();

    tracing::info!("Starting JarBundle server...");

    let cache = connect_cache(&config).await?;
    let source = Arc::new(HttpFileSource::new(&config.fetch)?);
    let tasks = TaskRunner::new();

    tracing::info!(
        prefixes = config.fetch.allowed_prefixes.len(),
        timeout_secs = config.fetch.timeout_secs,
        "Origin fetcher ready"
    );

    // Build shared state
    let state = Arc::new(AppState {
        validator: Validator::new(&config),
        bundles: BundleService::new(cache, source, tasks.clone()),
        config: config.clone(),
    });

    // Build router
    let app = api::router(state).layer(TraceLayer::new_for_http());

    // Start server
    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.api_port))
            .await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if !tasks.drain(DRAIN_TIMEOUT).await {
        tracing::warn!(pending = tasks.pending(), "Shutting down with cache writes still pending");
    }

    Ok(())
}

/// Build the configured bundle cache backend.
async fn connect_cache(config: &jb_common::AppConfig) -> anyhow::Result<Arc<dyn BundleCache>> {
    match config.cache.backend {
        CacheBackend::Memory => {
            tracing::info!("Using in-memory bundle cache");
            Ok(Arc::new(MemoryBundleCache::new()))
        }
        CacheBackend::Redis => {
            let url = config
                .redis
                .url
                .as_deref()
                .context("JB__REDIS__URL is required for the redis cache backend")?;
            let redis_client = redis::Client::open(url)?;
            let redis = redis_client.get_connection_manager().await?;
            tracing::info!(ttl_secs = config.cache.ttl_secs, "Connected to Redis bundle cache");
            Ok(Arc::new(RedisBundleCache::new(redis, &config.cache)))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
