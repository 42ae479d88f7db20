use crate::error::{PrismError, Result};
use std::env;
use std::path::PathBuf;

/// Longest cache TTL the cache backend accepts (1000 years)
const MAX_CACHE_TTL_SECS: u64 = 1000 * 365 * 24 * 60 * 60;

/// Application configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub acled_api_key: Option<String>,
    pub acled_api_email: Option<String>,
    pub acled_base_url: String,
    pub stac_url: String,
    pub geotiff_bucket: String,
    pub scratch_dir: PathBuf,
    pub object_store_root: PathBuf,
    pub object_store_public_url: String,
    /// Key for download link signatures; random per process when unset
    pub object_store_signing_key: Option<String>,
    pub cache_capacity: u64,
    pub cache_ttl_secs: u64,
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        // Secrets are optional at startup; /acled rejects requests while they are unset
        let acled_api_key = lookup("ACLED_API_KEY").filter(|v| !v.is_empty());
        let acled_api_email = lookup("ACLED_API_EMAIL").filter(|v| !v.is_empty());

        let acled_base_url = lookup("ACLED_BASE_URL")
            .unwrap_or_else(|| "https://api.acleddata.com/acled/read".to_string());

        let stac_url = lookup("STAC_URL")
            .unwrap_or_else(|| "https://api.earthobservation.vam.wfp.org/stac".to_string());

        let geotiff_bucket =
            lookup("GEOTIFF_BUCKET_NAME").unwrap_or_else(|| "prism-stac-geotiff".to_string());

        let scratch_dir = lookup("GEOTIFF_SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);

        let object_store_root = lookup("OBJECT_STORE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./object-store"));

        let object_store_public_url = lookup("OBJECT_STORE_PUBLIC_URL")
            .unwrap_or_else(|| "http://localhost:3000/objects".to_string());

        let object_store_signing_key =
            lookup("OBJECT_STORE_SIGNING_KEY").filter(|v| !v.is_empty());

        let cache_capacity = lookup("GEOTIFF_CACHE_CAPACITY")
            .and_then(|s| s.parse().ok())
            .unwrap_or(128);

        let cache_ttl_secs = lookup("GEOTIFF_CACHE_TTL_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(6 * 24 * 60 * 60); // 6 days
        if cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(PrismError::Config(format!(
                "GEOTIFF_CACHE_TTL_SECS must be at most {MAX_CACHE_TTL_SECS}, got {cache_ttl_secs}"
            )));
        }

        Ok(Self {
            port,
            acled_api_key,
            acled_api_email,
            acled_base_url,
            stac_url,
            geotiff_bucket,
            scratch_dir,
            object_store_root,
            object_store_public_url,
            object_store_signing_key,
            cache_capacity,
            cache_ttl_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3000);
        assert!(config.acled_api_key.is_none());
        assert!(config.acled_api_email.is_none());
        assert_eq!(config.acled_base_url, "https://api.acleddata.com/acled/read");
        assert_eq!(config.geotiff_bucket, "prism-stac-geotiff");
        assert_eq!(config.cache_capacity, 128);
        assert_eq!(config.cache_ttl_secs, 518_400);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("ACLED_API_KEY", "secret"),
            ("ACLED_API_EMAIL", "ops@example.org"),
            ("GEOTIFF_CACHE_CAPACITY", "16"),
            ("GEOTIFF_SCRATCH_DIR", "/var/tmp/prism"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.acled_api_key.as_deref(), Some("secret"));
        assert_eq!(config.acled_api_email.as_deref(), Some("ops@example.org"));
        assert_eq!(config.cache_capacity, 16);
        assert_eq!(config.scratch_dir, PathBuf::from("/var/tmp/prism"));
    }

    #[test]
    fn test_empty_secret_counts_as_missing() {
        let config = config_from(&[("ACLED_API_KEY", ""), ("PORT", "not-a-port")]);
        assert!(config.acled_api_key.is_none());
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_cache_ttl_upper_bound() {
        let config = config_from(&[("GEOTIFF_CACHE_TTL_SECS", "31536000000")]);
        assert_eq!(config.cache_ttl_secs, MAX_CACHE_TTL_SECS);

        let result = Config::from_lookup(|name| {
            (name == "GEOTIFF_CACHE_TTL_SECS").then(|| "18446744073709551615".to_string())
        });
        assert!(matches!(result, Err(PrismError::Config(_))));
    }

    #[test]
    fn test_signing_key() {
        assert!(config_from(&[]).object_store_signing_key.is_none());
        let config = config_from(&[("OBJECT_STORE_SIGNING_KEY", "hunter2")]);
        assert_eq!(config.object_store_signing_key.as_deref(), Some("hunter2"));
    }
}
