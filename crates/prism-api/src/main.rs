//! PRISM API - ACLED proxy and cached GeoTIFF export
//!
//! Forwards incident queries to ACLED with the service credentials, and turns
//! STAC catalog queries into downloadable GeoTIFFs behind a result cache.

mod acled;
mod config;
mod error;
mod geotiff;
mod server;
mod types;

use crate::acled::AcledProxy;
use crate::config::Config;
use crate::error::{PrismError, Result};
use crate::geotiff::{
    AssetRenderer, Catalog, GeotiffPipeline, GeotiffService, LocalObjectStore, ObjectStore,
};
use crate::server::{start_server, ServerState, SharedState};
use flight_cache::FlightCacheConfig;
use stac_client::StacClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("prism_api=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting PRISM API...");

    let config = Config::from_env()?;
    info!("Port: {}", config.port);
    info!("STAC URL: {}", config.stac_url);
    info!("GeoTIFF bucket: {}", config.geotiff_bucket);
    info!("Scratch dir: {:?}", config.scratch_dir);
    info!(
        "GeoTIFF cache: {} entries, TTL {} seconds",
        config.cache_capacity, config.cache_ttl_secs
    );

    tokio::fs::create_dir_all(&config.scratch_dir).await?;

    let mut objects =
        LocalObjectStore::new(&config.object_store_root, &config.object_store_public_url)
            .map_err(|e| PrismError::Config(e.to_string()))?;
    match &config.object_store_signing_key {
        Some(key) => objects = objects.with_signing_key(key.as_bytes()),
        None => warn!(
            "OBJECT_STORE_SIGNING_KEY is not set, download links will not survive a restart"
        ),
    }
    let objects = Arc::new(objects);
    let store: Arc<dyn ObjectStore> = objects.clone();

    let stac = Arc::new(StacClient::with_base_url(&config.stac_url));
    let catalog: Arc<dyn Catalog> = stac.clone();
    let pipeline = GeotiffPipeline::new(
        catalog,
        Arc::new(AssetRenderer::new(stac)),
        store,
        config.geotiff_bucket.clone(),
        config.scratch_dir.clone(),
    );
    let geotiff = GeotiffService::new(
        pipeline,
        FlightCacheConfig {
            capacity: config.cache_capacity,
            ttl: Duration::from_secs(config.cache_ttl_secs),
        },
    );

    let acled = AcledProxy::new(
        &config.acled_base_url,
        config.acled_api_key.clone(),
        config.acled_api_email.clone(),
    );
    if !acled.has_credentials() {
        warn!("ACLED_API_KEY or ACLED_API_EMAIL is not set, /acled requests will fail");
    }

    // Create shared state
    let state: SharedState = Arc::new(ServerState::new(acled, geotiff, objects));

    // Start HTTP server (blocking)
    start_server(state, config.port)
        .await
        .map_err(|e| PrismError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
