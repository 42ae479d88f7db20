//! Cached GeoTIFF export from the STAC catalog
//!
//! A request names a collection, a bounding box and a date. The first request
//! for a combination runs the pipeline (catalog search, raster file, upload)
//! and caches the resulting object key; later requests only mint a new
//! download URL for the stored object.

mod pipeline;
mod storage;

pub use pipeline::{AssetRenderer, Catalog, GeotiffError, GeotiffPipeline};
pub use storage::{LocalObjectStore, ObjectStore, StoreError};

#[cfg(test)]
pub(crate) use pipeline::tests as fakes;

use crate::error::AppError;
use flight_cache::{CacheStats, FlightCache, FlightCacheConfig};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

/// Lifetime of the download URLs handed to clients
const DOWNLOAD_URL_TTL: Duration = Duration::from_secs(3600);

/// Inputs of one GeoTIFF export, also its cache key
///
/// The bbox compares and hashes by bit pattern, in order, so equal requests
/// always share an entry and `Eq` stays total.
#[derive(Debug, Clone)]
pub struct GeotiffParams {
    pub collection: String,
    /// min_x, min_y, max_x, max_y
    pub bbox: [f64; 4],
    pub date: String,
}

impl PartialEq for GeotiffParams {
    fn eq(&self, other: &Self) -> bool {
        self.collection == other.collection
            && self.date == other.date
            && self
                .bbox
                .iter()
                .zip(other.bbox.iter())
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for GeotiffParams {}

impl Hash for GeotiffParams {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.collection.hash(state);
        for coord in &self.bbox {
            coord.to_bits().hash(state);
        }
        self.date.hash(state);
    }
}

/// Parse "min_x,min_y,max_x,max_y" (optionally bracketed) into four finite floats
pub fn parse_bbox(raw: &str) -> Result<[f64; 4], AppError> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');

    let coords = trimmed
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|e| AppError::BadRequest(format!("Invalid bbox {raw:?}: {e}")))?;

    let bbox: [f64; 4] = coords.try_into().map_err(|coords: Vec<f64>| {
        AppError::BadRequest(format!(
            "Invalid bbox {raw:?}: expected 4 coordinates, got {}",
            coords.len()
        ))
    })?;

    if bbox.iter().any(|c| !c.is_finite()) {
        return Err(AppError::BadRequest(format!(
            "Invalid bbox {raw:?}: coordinates must be finite"
        )));
    }

    Ok(bbox)
}

/// GeoTIFF export with a time-bounded result cache in front of the pipeline
pub struct GeotiffService {
    cache: FlightCache<GeotiffParams, String, GeotiffError>,
    pipeline: Arc<GeotiffPipeline>,
}

impl GeotiffService {
    pub fn new(pipeline: GeotiffPipeline, cache_config: FlightCacheConfig) -> Self {
        Self {
            cache: FlightCache::new(cache_config),
            pipeline: Arc::new(pipeline),
        }
    }

    /// Return a one-hour download URL for the GeoTIFF described by `params`
    pub async fn get_geotiff(&self, params: GeotiffParams) -> Result<String, AppError> {
        let object_key = self.object_key(params).await?;

        let url = self
            .pipeline
            .store()
            .presigned_url(self.pipeline.bucket(), &object_key, DOWNLOAD_URL_TTL)
            .await?;
        Ok(url)
    }

    /// The stored object for `params`, generating it on a cache miss
    async fn object_key(&self, params: GeotiffParams) -> Result<String, AppError> {
        let pipeline = Arc::clone(&self.pipeline);
        let producer_params = params.clone();

        let key = self
            .cache
            .get_or_compute(params, move || async move {
                pipeline.generate_and_upload(&producer_params).await
            })
            .await?;
        Ok(key)
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::{params, FakeCatalog, FakeRenderer};
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::sync::atomic::Ordering;
    use tempfile::{tempdir, TempDir};

    fn hash_of(params: &GeotiffParams) -> u64 {
        let mut hasher = DefaultHasher::new();
        params.hash(&mut hasher);
        hasher.finish()
    }

    struct Fixture {
        service: Arc<GeotiffService>,
        catalog: Arc<FakeCatalog>,
        scratch: TempDir,
        _root: TempDir,
    }

    fn fixture(items: usize) -> Fixture {
        let scratch = tempdir().unwrap();
        let root = tempdir().unwrap();
        let catalog = Arc::new(FakeCatalog::with_items(items));
        let pipeline = GeotiffPipeline::new(
            catalog.clone(),
            Arc::new(FakeRenderer::default()),
            Arc::new(LocalObjectStore::new(root.path(), "http://localhost/objects").unwrap()),
            "prism-stac-geotiff".to_string(),
            scratch.path().to_path_buf(),
        );
        Fixture {
            service: Arc::new(GeotiffService::new(pipeline, FlightCacheConfig::default())),
            catalog,
            scratch,
            _root: root,
        }
    }

    #[test]
    fn test_params_equality_and_hash() {
        let a = params("chirps");
        let b = params("chirps");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let mut shifted = params("chirps");
        shifted.bbox[3] = 38.500001;
        assert_ne!(a, shifted);

        let mut swapped = params("chirps");
        swapped.bbox.swap(0, 2);
        assert_ne!(a, swapped);

        let mut other_date = params("chirps");
        other_date.date = "2024-01-11".to_string();
        assert_ne!(a, other_date);
    }

    #[test]
    fn test_parse_bbox() {
        assert_eq!(
            parse_bbox("60.5,29.3,75.2,38.5").unwrap(),
            [60.5, 29.3, 75.2, 38.5]
        );
        assert_eq!(
            parse_bbox("[60.5, 29.3, 75.2, 38.5]").unwrap(),
            [60.5, 29.3, 75.2, 38.5]
        );
        assert!(parse_bbox("60.5,29.3,75.2").is_err());
        assert!(parse_bbox("60.5,29.3,75.2,38.5,1").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
        assert!(parse_bbox("NaN,0,1,1").is_err());
        assert!(parse_bbox("").is_err());
    }

    #[tokio::test]
    async fn test_repeat_request_reuses_object() {
        let fx = fixture(1);

        let first = fx.service.get_geotiff(params("chirps")).await.unwrap();
        let second = fx.service.get_geotiff(params("chirps")).await.unwrap();

        let path = |url: &str| url::Url::parse(url).unwrap().path().to_string();
        assert_eq!(path(&first), path(&second));
        assert_eq!(fx.catalog.searches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_bbox_is_a_new_object() {
        let fx = fixture(1);

        let mut moved = params("chirps");
        moved.bbox[0] = 61.0;

        fx.service.get_geotiff(params("chirps")).await.unwrap();
        fx.service.get_geotiff(moved).await.unwrap();

        assert_eq!(fx.catalog.searches.load(Ordering::SeqCst), 2);
        assert_eq!(fx.service.cache_stats().await.misses, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_run_pipeline_once() {
        let fx = fixture(1);

        let requests = (0..10).map(|_| {
            let service = Arc::clone(&fx.service);
            tokio::spawn(async move { service.get_geotiff(params("chirps")).await })
        });
        let urls: Vec<String> = futures::future::join_all(requests)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        assert_eq!(fx.catalog.searches.load(Ordering::SeqCst), 1);
        let first_path = url::Url::parse(&urls[0]).unwrap().path().to_string();
        assert!(urls
            .iter()
            .all(|u| url::Url::parse(u).unwrap().path() == first_path));
        assert!(std::fs::read_dir(fx.scratch.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_missing_data_is_retried() {
        let fx = fixture(0);

        assert!(matches!(
            fx.service.get_geotiff(params("chirps")).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            fx.service.get_geotiff(params("chirps")).await,
            Err(AppError::NotFound(_))
        ));

        assert_eq!(fx.catalog.searches.load(Ordering::SeqCst), 2);
        assert!(std::fs::read_dir(fx.scratch.path()).unwrap().next().is_none());
    }
}
