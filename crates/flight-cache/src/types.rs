//! Cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A computed value together with the time it was produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V) -> Self {
        Self {
            value,
            created_at: Utc::now(),
        }
    }
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: u64,
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Sizing and expiry for a [`crate::FlightCache`]
#[derive(Debug, Clone)]
pub struct FlightCacheConfig {
    /// Maximum number of live entries
    pub capacity: u64,
    /// Age after which an entry is recomputed
    pub ttl: Duration,
}

impl Default for FlightCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 128,
            ttl: Duration::from_secs(6 * 24 * 60 * 60), // 6 days
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FlightCacheConfig::default();
        assert_eq!(config.capacity, 128);
        assert_eq!(config.ttl, Duration::from_secs(518_400));
    }

    #[test]
    fn test_cache_stats_default() {
        let stats = CacheStats::default();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_cache_entry_serialization() {
        let entry = CacheEntry::new("chirps_2024-01-01_ab12cd.tif".to_string());

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("chirps_2024-01-01_ab12cd.tif"));
        assert!(json.contains("created_at"));

        let deserialized: CacheEntry<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.value, entry.value);
        assert_eq!(deserialized.created_at, entry.created_at);
    }
}
