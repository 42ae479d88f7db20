//! STAC search -> local GeoTIFF -> object store

use super::storage::{ObjectStore, StoreError};
use super::GeotiffParams;
use async_trait::async_trait;
use stac_client::{Item, StacClient, StacError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum GeotiffError {
    /// The catalog has no items for the collection and date
    NoMatchingData { collection: String, date: String },
    /// An item carries no asset that can be materialized as a raster
    NoRasterAsset(String),
    Catalog(StacError),
    Store(StoreError),
    Io(Box<std::io::Error>),
}

impl fmt::Display for GeotiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatchingData { collection, date } => write!(
                f,
                "Collection not found in STAC API: {collection} at {date}"
            ),
            Self::NoRasterAsset(item) => write!(f, "Item {item} has no raster asset"),
            Self::Catalog(e) => write!(f, "Catalog error: {e}"),
            Self::Store(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for GeotiffError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Catalog(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::Io(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<StacError> for GeotiffError {
    fn from(err: StacError) -> Self {
        Self::Catalog(err)
    }
}

impl From<StoreError> for GeotiffError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<std::io::Error> for GeotiffError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Box::new(err))
    }
}

/// Geospatial catalog search
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn search(
        &self,
        collection: &str,
        bbox: [f64; 4],
        date: &str,
    ) -> Result<Vec<Item>, StacError>;
}

#[async_trait]
impl Catalog for StacClient {
    async fn search(
        &self,
        collection: &str,
        bbox: [f64; 4],
        date: &str,
    ) -> Result<Vec<Item>, StacError> {
        StacClient::search(self, collection, bbox, date).await
    }
}

/// Turns catalog items into a raster file at `dest`
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, items: &[Item], bbox: [f64; 4], dest: &Path)
        -> Result<(), GeotiffError>;
}

/// Writes the first item's raster asset to disk as-is
///
/// Catalog assets are already cloud-optimized GeoTIFFs, so no re-encoding
/// happens here. The bbox only narrows the catalog search: it is not applied
/// to the raster, so requests that differ only in bbox and match the same
/// first item produce byte-identical files (under separate cache entries).
/// Mosaicking several items or clipping to the bbox needs a GDAL-backed
/// renderer.
pub struct AssetRenderer {
    client: Arc<StacClient>,
}

impl AssetRenderer {
    pub fn new(client: Arc<StacClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Renderer for AssetRenderer {
    async fn render(
        &self,
        items: &[Item],
        _bbox: [f64; 4],
        dest: &Path,
    ) -> Result<(), GeotiffError> {
        let item = items
            .first()
            .ok_or_else(|| GeotiffError::NoRasterAsset("<none>".to_string()))?;
        let asset = item
            .raster_asset()
            .ok_or_else(|| GeotiffError::NoRasterAsset(item.id.clone()))?;

        let bytes = self.client.download_asset(&asset.href, dest).await?;
        debug!(item = %item.id, href = %asset.href, bytes, "Rendered raster from asset");
        Ok(())
    }
}

/// The expensive producer behind the GeoTIFF cache
pub struct GeotiffPipeline {
    catalog: Arc<dyn Catalog>,
    renderer: Arc<dyn Renderer>,
    store: Arc<dyn ObjectStore>,
    bucket: String,
    scratch_dir: PathBuf,
}

impl GeotiffPipeline {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        renderer: Arc<dyn Renderer>,
        store: Arc<dyn ObjectStore>,
        bucket: String,
        scratch_dir: PathBuf,
    ) -> Self {
        Self {
            catalog,
            renderer,
            store,
            bucket,
            scratch_dir,
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Generate the GeoTIFF for `params`, upload it and return its object key
    ///
    /// The local file is removed before returning, whether or not the upload
    /// succeeded.
    pub async fn generate_and_upload(&self, params: &GeotiffParams) -> Result<String, GeotiffError> {
        let scratch = tempfile::Builder::new()
            .prefix(&format!(
                "{}_{}_",
                file_name_safe(&params.collection),
                file_name_safe(&params.date)
            ))
            .suffix(".tif")
            .tempfile_in(&self.scratch_dir)?;

        let object_key = scratch
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                std::io::Error::other(format!("unnamed scratch file {:?}", scratch.path()))
            })?;

        let outcome = self.render_and_upload(params, scratch.path(), &object_key).await;

        let path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!(path = ?path, error = %e, "Failed to remove scratch file");
        }

        outcome.map(|()| object_key)
    }

    async fn render_and_upload(
        &self,
        params: &GeotiffParams,
        path: &Path,
        object_key: &str,
    ) -> Result<(), GeotiffError> {
        let items = self
            .catalog
            .search(&params.collection, params.bbox, &params.date)
            .await?;

        if items.is_empty() {
            return Err(GeotiffError::NoMatchingData {
                collection: params.collection.clone(),
                date: params.date.clone(),
            });
        }
        info!(
            collection = %params.collection,
            date = %params.date,
            items = items.len(),
            "Rendering GeoTIFF"
        );

        self.renderer.render(&items, params.bbox, path).await?;
        self.store.put(path, &self.bucket, object_key).await?;

        info!(bucket = %self.bucket, key = %object_key, "Uploaded GeoTIFF");
        Ok(())
    }
}

/// Keep ASCII alphanumerics, '-' and '.', replace everything else with '_'
fn file_name_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
