//! Error types for the PRISM API

use crate::geotiff::{GeotiffError, StoreError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use flight_cache::FlightError;
use serde_json::json;
use std::fmt;

/// Startup failures
#[derive(Debug)]
pub enum PrismError {
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for PrismError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrismError::Io(err) => write!(f, "IO error: {}", err),
            PrismError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for PrismError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PrismError::Io(err) => Some(err.as_ref()),
            PrismError::Config(_) => None,
        }
    }
}

impl From<std::io::Error> for PrismError {
    fn from(err: std::io::Error) -> Self {
        PrismError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for PrismError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        PrismError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PrismError>;

/// Request error type that converts to HTTP responses
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    /// Server misconfiguration, reported to the caller as-is
    Config(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Forbidden(msg) => {
                tracing::warn!(error = %msg, "Rejected download link");
                (StatusCode::FORBIDDEN, msg)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Config(msg) => {
                tracing::error!(error = %msg, "Server configuration error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::BadGateway(msg) => {
                tracing::warn!(error = %msg, "Upstream request failed");
                (StatusCode::BAD_GATEWAY, "Upstream request failed".into())
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

impl From<FlightError<GeotiffError>> for AppError {
    fn from(err: FlightError<GeotiffError>) -> Self {
        match err.producer_error() {
            Some(e @ GeotiffError::NoMatchingData { .. }) => AppError::NotFound(e.to_string()),
            _ => AppError::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::BadSignature | StoreError::Expired | StoreError::InvalidName(_) => {
                AppError::Forbidden(err.to_string())
            }
            _ => AppError::Internal(err.to_string()),
        }
    }
}
