//! HTTP server for the PRISM API
//!
//! Provides /health, /acled and /geotiff endpoints, plus /objects for the
//! signed download links /geotiff hands out.

use crate::acled::AcledProxy;
use crate::error::AppError;
use crate::geotiff::{parse_bbox, GeotiffParams, GeotiffService, LocalObjectStore};
use crate::types::{GeotiffQuery, GeotiffResponse, HealthResponse, SignedDownloadQuery};
use axum::{
    extract::{Path, Query, RawQuery, Request, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeFile;
use tracing::info;

/// Shared state for the HTTP server
pub struct ServerState {
    pub acled: AcledProxy,
    pub geotiff: GeotiffService,
    /// Store behind the /objects download links
    pub objects: Arc<LocalObjectStore>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(
        acled: AcledProxy,
        geotiff: GeotiffService,
        objects: Arc<LocalObjectStore>,
    ) -> Self {
        Self {
            acled,
            geotiff,
            objects,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/acled", get(acled_incidents))
        .route("/geotiff", get(geotiff))
        .route("/objects/{bucket}/{key}", get(download_object))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let cache_stats = state.geotiff.cache_stats().await;
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache: cache_stats,
    })
}

/// Forward an incident query to ACLED and relay the answer verbatim
async fn acled_incidents(
    State(state): State<SharedState>,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    let params: Vec<(String, String)> = query
        .as_deref()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let upstream = state.acled.forward(&params).await?;

    let mut response = (upstream.status, upstream.body).into_response();
    if let Some(content_type) = upstream
        .content_type
        .and_then(|ct| HeaderValue::from_str(&ct).ok())
    {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type);
    }
    Ok(response)
}

/// Generate (or reuse) a GeoTIFF and return a download link
async fn geotiff(
    State(state): State<SharedState>,
    Query(query): Query<GeotiffQuery>,
) -> Result<Json<GeotiffResponse>, AppError> {
    let params = GeotiffParams {
        bbox: parse_bbox(&query.bbox)?,
        collection: query.collection,
        date: query.date,
    };

    let download_url = state.geotiff.get_geotiff(params).await?;
    Ok(Json(GeotiffResponse { download_url }))
}

/// Serve a stored object to holders of a valid signed link
async fn download_object(
    State(state): State<SharedState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(link): Query<SignedDownloadQuery>,
    request: Request,
) -> Result<Response, AppError> {
    let path = state
        .objects
        .authorize_download(&bucket, &key, link.expires, &link.signature)?;

    let response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    Ok(response.into_response())
}
