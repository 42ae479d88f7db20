//! Keyed TTL cache with single-flight computation
//!
//! Wraps an expensive producer behind a cache keyed by the producer's inputs.
//! Entries expire after a fixed time-to-live, the cache is bounded by entry
//! count with least-recently-used eviction, and concurrent misses for the same
//! key share a single producer invocation.

mod cache;
mod error;
mod types;

pub use cache::FlightCache;
pub use error::FlightError;
pub use types::{CacheEntry, CacheStats, FlightCacheConfig};
