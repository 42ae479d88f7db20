use std::fmt;

/// Errors from the STAC client
#[derive(Debug)]
pub enum StacError {
    Http(reqwest::Error),
    Io(Box<std::io::Error>),
    Json(serde_json::Error),
    ApiError(String),
}

impl fmt::Display for StacError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "HTTP error: {e}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Json(e) => write!(f, "JSON error: {e}"),
            Self::ApiError(msg) => write!(f, "API error: {msg}"),
        }
    }
}

impl std::error::Error for StacError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Io(e) => Some(e.as_ref()),
            Self::Json(e) => Some(e),
            Self::ApiError(_) => None,
        }
    }
}

impl From<reqwest::Error> for StacError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

impl From<std::io::Error> for StacError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for StacError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

pub type Result<T> = std::result::Result<T, StacError>;
