//! Bounded TTL cache in front of a geocoder.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::CacheConfig;
use crate::error::GeocodeFailure;
use crate::geocoder::normalize_address;
use crate::model::Coordinate;
use crate::traits::Geocoder;

#[derive(Debug, Clone)]
struct Entry {
    result: Result<Coordinate, GeocodeFailure>,
    inserted: Instant,
}

/// Memoizes geocoder answers keyed by normalized address.
///
/// Successes and `NotFound` answers are cached until `ttl` elapses.
/// Transient failures (timeouts, transport errors) are never cached. When
/// the cache is full, expired entries go first, then the oldest entry.
#[derive(Debug)]
pub struct CachingGeocoder<G> {
    inner: G,
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<String, Entry>>,
}

impl<G: Geocoder> CachingGeocoder<G> {
    pub fn new(inner: G, config: CacheConfig) -> Self {
        Self {
            inner,
            ttl: config.ttl,
            capacity: config.capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A poisoned map only means another thread panicked mid-insert; the
        // entries themselves are still whole.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lookup(&self, key: &str) -> Option<Result<Coordinate, GeocodeFailure>> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => Some(entry.result.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn store(&self, key: String, result: Result<Coordinate, GeocodeFailure>) {
        let mut entries = self.lock();
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.inserted.elapsed() < ttl);
        }
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            Entry {
                result,
                inserted: Instant::now(),
            },
        );
    }
}

impl<G: Geocoder> Geocoder for CachingGeocoder<G> {
    fn resolve(&self, address: &str, timeout: Duration) -> Result<Coordinate, GeocodeFailure> {
        let key = normalize_address(address);
        if let Some(hit) = self.lookup(&key) {
            debug!(address = %key, "geocode cache hit");
            return hit;
        }

        let result = self.inner.resolve(address, timeout);
        match &result {
            Err(failure) if failure.is_transient() => {}
            _ => self.store(key, result.clone()),
        }
        result
    }
}
