//! Durable storage for generated GeoTIFFs

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug)]
pub enum StoreError {
    Io(Box<std::io::Error>),
    InvalidName(String),
    InvalidUrl(String),
    /// The download link was not signed by this store
    BadSignature,
    /// The download link is past its expiry
    Expired,
    Signing(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Object store IO error: {e}"),
            Self::InvalidName(name) => write!(f, "Invalid bucket or object name: {name}"),
            Self::InvalidUrl(msg) => write!(f, "Invalid object store URL: {msg}"),
            Self::BadSignature => write!(f, "Invalid download link signature"),
            Self::Expired => write!(f, "Download link has expired"),
            Self::Signing(msg) => write!(f, "Failed to sign download link: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Box::new(err))
    }
}

/// Object storage that can hand out time-limited download links
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `local_path` as `bucket/key`
    async fn put(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), StoreError>;

    /// Mint a download URL for `bucket/key` valid for `expires_in`
    async fn presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StoreError>;
}

/// Object store backed by a local directory
///
/// Objects live at `{root}/{bucket}/{key}`. Download URLs point at
/// `{public_url}/{bucket}/{key}` and carry the expiry as a unix timestamp plus
/// an HMAC-SHA256 signature over bucket, key and expiry. The API serves them
/// under `/objects` after [`LocalObjectStore::authorize_download`] accepts the
/// link.
pub struct LocalObjectStore {
    root: PathBuf,
    public_url: Url,
    signing_key: Vec<u8>,
}

impl LocalObjectStore {
    /// Create a store signing with a random per-process key
    ///
    /// Links minted before a restart stop working; use
    /// [`LocalObjectStore::with_signing_key`] to keep them valid.
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Result<Self, StoreError> {
        let public_url =
            Url::parse(public_url).map_err(|e| StoreError::InvalidUrl(format!("{public_url}: {e}")))?;
        if public_url.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(public_url.to_string()));
        }

        Ok(Self {
            root: root.into(),
            public_url,
            signing_key: rand::random::<[u8; 32]>().to_vec(),
        })
    }

    pub fn with_signing_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.signing_key = key.into();
        self
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        validate_name(bucket)?;
        validate_name(key)?;
        Ok(self.root.join(bucket).join(key))
    }

    fn mac(&self, bucket: &str, key: &str, expires_at: i64) -> Result<HmacSha256, StoreError> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| StoreError::Signing(e.to_string()))?;
        mac.update(format!("{bucket}/{key}\n{expires_at}").as_bytes());
        Ok(mac)
    }

    fn signature(&self, bucket: &str, key: &str, expires_at: i64) -> Result<String, StoreError> {
        let mac = self.mac(bucket, key, expires_at)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Check a download link and return the file it grants access to
    ///
    /// The signature is checked before the expiry, so a forged expiry is
    /// reported as a bad signature.
    pub fn authorize_download(
        &self,
        bucket: &str,
        key: &str,
        expires_at: i64,
        signature: &str,
    ) -> Result<PathBuf, StoreError> {
        let path = self.object_path(bucket, key)?;

        let signature = hex::decode(signature).map_err(|_| StoreError::BadSignature)?;
        self.mac(bucket, key, expires_at)?
            .verify_slice(&signature)
            .map_err(|_| StoreError::BadSignature)?;

        if expires_at < Utc::now().timestamp() {
            return Err(StoreError::Expired);
        }

        Ok(path)
    }
}

/// Names become single path segments, so separators and dot names are rejected
fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), StoreError> {
        let dest = self.object_path(bucket, key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let size = tokio::fs::copy(local_path, &dest).await?;
        info!(bucket, key, size, "Stored object");
        Ok(())
    }

    async fn presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StoreError> {
        validate_name(bucket)?;
        validate_name(key)?;

        let expires_at = Utc::now().timestamp() + expires_in.as_secs() as i64;

        let mut url = self.public_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(self.public_url.to_string()))?
            .pop_if_empty()
            .push(bucket)
            .push(key);
        url.query_pairs_mut()
            .append_pair("expires", &expires_at.to_string())
            .append_pair("signature", &self.signature(bucket, key, expires_at)?);

        Ok(url.to_string())
    }
}
