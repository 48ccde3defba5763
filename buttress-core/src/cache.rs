//! TTL response cache keyed by request fingerprint.

use crate::fingerprint::Fingerprint;
use crate::response::ServiceResponse;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: ServiceResponse,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn expired(&self, now: Instant) -> bool {
        now >= self.stored_at + self.ttl
    }
}

/// In-memory response cache with lazy expiry.
///
/// An entry is never returned at or past `stored_at + ttl`; expired entries
/// are evicted on access, so no background sweep is needed for correctness.
/// [`ResponseCache::purge_expired`] is available when memory bounds matter.
/// Entries for unrelated fingerprints can be read and written concurrently
/// without contention; each entry's read-modify-write is atomic.
///
/// The cache is process-local owned state. A failing read degrades to a
/// miss and a failing write is dropped — cache trouble never becomes a call
/// failure.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<Fingerprint, CacheEntry>,
}

impl ResponseCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a live entry, lazily evicting it if its TTL has elapsed.
    ///
    /// Expired and absent are indistinguishable to callers.
    pub fn get(&self, fingerprint: &Fingerprint, now: Instant) -> Option<ServiceResponse> {
        {
            let entry = self.entries.get(fingerprint)?;
            if !entry.expired(now) {
                return Some(entry.value.clone());
            }
        }
        // Re-checked under the entry lock so a concurrent refresh survives.
        self.entries
            .remove_if(fingerprint, |_, entry| entry.expired(now));
        None
    }

    /// Store a response under `fingerprint` for `ttl`.
    pub fn put(&self, fingerprint: Fingerprint, value: ServiceResponse, ttl: Duration, now: Instant) {
        debug!(key = %fingerprint, ttl = ?ttl, "caching response");
        self.entries.insert(
            fingerprint,
            CacheEntry {
                value,
                stored_at: now,
                ttl,
            },
        );
    }

    /// Drop a single entry. Returns true if it existed.
    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.remove(fingerprint).is_some()
    }

    /// Drop every entry belonging to `service`.
    pub fn purge_service(&self, service: &str) {
        self.entries.retain(|key, _| key.service() != service);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop entries whose TTL has elapsed.
    pub fn purge_expired(&self, now: Instant) {
        self.entries.retain(|_, entry| !entry.expired(now));
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ServiceRequest;
    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode};

    fn response(body: &'static [u8]) -> ServiceResponse {
        ServiceResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::from_static(body))
    }

    fn fingerprint(path: &str) -> Fingerprint {
        Fingerprint::of(&ServiceRequest::new("listings", Method::GET, path))
    }

    #[test]
    fn test_round_trip_within_ttl() {
        let cache = ResponseCache::new();
        let key = fingerprint("/a");
        let t0 = Instant::now();

        cache.put(key.clone(), response(b"payload"), Duration::from_secs(60), t0);

        let hit = cache.get(&key, t0 + Duration::from_secs(59)).unwrap();
        assert_eq!(hit.bytes().as_ref(), b"payload");
    }

    #[test]
    fn test_expired_entry_is_absent_and_evicted() {
        let cache = ResponseCache::new();
        let key = fingerprint("/a");
        let t0 = Instant::now();

        cache.put(key.clone(), response(b"payload"), Duration::from_secs(60), t0);

        // Exactly at stored_at + ttl the entry is already gone.
        assert!(cache.get(&key, t0 + Duration::from_secs(60)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_refreshes_expiry() {
        let cache = ResponseCache::new();
        let key = fingerprint("/a");
        let t0 = Instant::now();

        cache.put(key.clone(), response(b"old"), Duration::from_secs(10), t0);
        let t1 = t0 + Duration::from_secs(8);
        cache.put(key.clone(), response(b"new"), Duration::from_secs(10), t1);

        let hit = cache.get(&key, t0 + Duration::from_secs(15)).unwrap();
        assert_eq!(hit.bytes().as_ref(), b"new");
    }

    #[test]
    fn test_purge_service_only_touches_that_service() {
        let cache = ResponseCache::new();
        let t0 = Instant::now();
        let listings = fingerprint("/a");
        let users =
            Fingerprint::of(&ServiceRequest::new("users", Method::GET, "/profile"));

        cache.put(listings.clone(), response(b"l"), Duration::from_secs(60), t0);
        cache.put(users.clone(), response(b"u"), Duration::from_secs(60), t0);

        cache.purge_service("listings");
        assert!(cache.get(&listings, t0).is_none());
        assert!(cache.get(&users, t0).is_some());
    }

    #[test]
    fn test_invalidate_and_purge_expired() {
        let cache = ResponseCache::new();
        let t0 = Instant::now();
        let short = fingerprint("/short");
        let long = fingerprint("/long");

        cache.put(short.clone(), response(b"s"), Duration::from_secs(1), t0);
        cache.put(long.clone(), response(b"l"), Duration::from_secs(100), t0);

        cache.purge_expired(t0 + Duration::from_secs(2));
        assert_eq!(cache.len(), 1);

        assert!(cache.invalidate(&long));
        assert!(!cache.invalidate(&long));
        assert!(cache.is_empty());
    }
}
