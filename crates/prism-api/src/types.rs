//! Request and response bodies for the PRISM API

use flight_cache::CacheStats;
use serde::{Deserialize, Serialize};

/// Query parameters for /geotiff
#[derive(Debug, Deserialize)]
pub struct GeotiffQuery {
    pub collection: String,
    /// "min_x,min_y,max_x,max_y"
    pub bbox: String,
    pub date: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeotiffResponse {
    pub download_url: String,
}

/// Query string of a signed object download link
#[derive(Debug, Deserialize)]
pub struct SignedDownloadQuery {
    /// Unix timestamp after which the link stops working
    pub expires: i64,
    pub signature: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok".to_string(),
            uptime_secs: 3600,
            cache: CacheStats {
                entries: 12,
                in_flight: 1,
                hits: 40,
                misses: 12,
            },
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"in_flight\":1"));
        assert!(json.contains("3600"));
    }

    #[test]
    fn test_geotiff_query_deserialization() {
        let query: GeotiffQuery = serde_json::from_value(serde_json::json!({
            "collection": "chirps",
            "bbox": "60.5,29.3,75.2,38.5",
            "date": "2024-01-01"
        }))
        .unwrap();

        assert_eq!(query.collection, "chirps");
        assert_eq!(query.bbox, "60.5,29.3,75.2,38.5");
    }
}
