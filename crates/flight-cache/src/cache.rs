//! Time-bounded result cache with per-key single-flight

use crate::error::FlightError;
use crate::types::{CacheEntry, CacheStats, FlightCacheConfig};
use futures::future::{BoxFuture, FutureExt, Shared};
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type Flight<V, E> = Shared<BoxFuture<'static, Result<V, FlightError<E>>>>;

/// A cache in front of an expensive producer
///
/// Successful results are kept for the configured TTL, bounded by entry count
/// with least-recently-used eviction. Failures are never cached. While a
/// producer runs for a key, every other caller asking for that key awaits the
/// same result instead of starting a second producer.
pub struct FlightCache<K, V, E> {
    entries: Cache<K, CacheEntry<V>>,
    /// Producers currently running, keyed by the key they compute
    in_flight: Arc<Mutex<HashMap<K, Flight<V, E>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V, E> FlightCache<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new(config: FlightCacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.capacity)
            .time_to_live(config.ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self {
            entries,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the live value for `key`, running `producer` on a miss
    ///
    /// The producer runs on its own task, so a caller that gives up waiting
    /// does not cancel it. Every caller that joined the flight receives the
    /// same value or the same error.
    pub async fn get_or_compute<F, Fut>(&self, key: K, producer: F) -> Result<V, FlightError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if let Some(entry) = self.entries.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = ?key, created_at = %entry.created_at, "Cache hit");
            return Ok(entry.value);
        }

        let flight = {
            let mut in_flight = self.in_flight.lock().await;

            // A flight for this key may have finished between the lookup and the lock
            if let Some(entry) = self.entries.get(&key).await {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(entry.value);
            }
            self.misses.fetch_add(1, Ordering::Relaxed);

            let existing = in_flight.get(&key).cloned();
            match existing {
                Some(flight) => {
                    debug!(key = ?key, "Joining in-flight computation");
                    flight
                }
                None => {
                    let flight = self.spawn_flight(key.clone(), producer());
                    in_flight.insert(key, flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    /// Run the producer on a detached task and return a handle every waiter can await
    fn spawn_flight<Fut>(&self, key: K, producer: Fut) -> Flight<V, E>
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let entries = self.entries.clone();
        let in_flight = Arc::clone(&self.in_flight);

        let task = tokio::spawn(async move {
            let started = Instant::now();
            info!(key = ?key, "Cache miss, running producer");

            let outcome = match AssertUnwindSafe(producer).catch_unwind().await {
                Ok(Ok(value)) => {
                    // Insert before leaving the in-flight map so late callers see the entry
                    entries
                        .insert(key.clone(), CacheEntry::new(value.clone()))
                        .await;
                    // moka evicts lazily; apply the overflow eviction now so the
                    // capacity bound holds as soon as the flight completes
                    entries.run_pending_tasks().await;
                    info!(
                        key = ?key,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Producer finished"
                    );
                    Ok(value)
                }
                Ok(Err(e)) => {
                    warn!(key = ?key, "Producer failed, result not cached");
                    Err(FlightError::Producer(Arc::new(e)))
                }
                Err(_) => {
                    warn!(key = ?key, "Producer panicked");
                    Err(FlightError::Aborted("producer panicked".to_string()))
                }
            };

            in_flight.lock().await.remove(&key);
            outcome
        });

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(FlightError::Aborted(e.to_string())),
            }
        }
        .boxed()
        .shared()
    }

    /// Look up a live value without computing it
    pub async fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).await.map(|entry| entry.value)
    }

    /// Drop the entry for `key`, if any
    pub async fn invalidate(&self, key: &K) {
        self.entries.invalidate(key).await;
    }

    /// Apply pending evictions and expirations so that counts are exact
    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.entry_count(),
            in_flight: self.in_flight.lock().await.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl<K, V, E> Default for FlightCache<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(FlightCacheConfig::default())
    }
}
