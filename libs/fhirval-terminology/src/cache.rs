//! §4.2 Terminology Cache: a SHA-256-keyed, TTL+LRU-bounded cache of
//! `(system, code, valueSet, fhirVersion) -> {valid, display, message}`.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheResult {
    pub valid: bool,
    pub display: Option<String>,
    pub message: Option<String>,
    /// Set when this result came back as a graceful-degradation response for a
    /// known-external system (§4.4 step 2) rather than a genuine validity answer.
    pub degraded: bool,
}

#[derive(Debug, Clone)]
struct Entry {
    result: CacheResult,
    cached_at: Instant,
    ttl: Option<Duration>,
    hits: u64,
    last_accessed_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.duration_since(self.cached_at) > ttl,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub total_hits: u64,
}

/// `sha256(system|code|valueSet|version)`, per §4.2.
pub fn key(system: &str, code: &str, value_set: Option<&str>, version: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(system.as_bytes());
    hasher.update(b"|");
    hasher.update(code.as_bytes());
    hasher.update(b"|");
    hasher.update(value_set.unwrap_or("").as_bytes());
    hasher.update(b"|");
    hasher.update(version.as_bytes());
    hex::encode(hasher.finalize())
}

/// Bounded map with max-entry LRU eviction and a configurable TTL. Online mode uses
/// a finite TTL; offline mode caches forever (§3 `TerminologyCacheEntry`: "TTL is
/// finite online, infinite offline").
pub struct TerminologyCache {
    inner: Mutex<LruCache<String, Entry>>,
    default_ttl: Duration,
}

impl TerminologyCache {
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            default_ttl,
        }
    }

    /// Returns `None` on a miss or on an expired entry, removing the entry from the
    /// map in the expired case so `has()` and `get()` stay consistent (§8 invariant).
    pub fn get(&self, cache_key: &str) -> Option<CacheResult> {
        let mut guard = self.inner.lock().unwrap();
        let now = Instant::now();
        let expired = match guard.peek(cache_key) {
            Some(entry) => entry.is_expired(now),
            None => return None,
        };
        if expired {
            guard.pop(cache_key);
            return None;
        }
        let entry = guard.get_mut(cache_key).unwrap();
        entry.hits += 1;
        entry.last_accessed_at = now;
        Some(entry.result.clone())
    }

    pub fn has(&self, cache_key: &str) -> bool {
        let guard = self.inner.lock().unwrap();
        match guard.peek(cache_key) {
            Some(entry) => !entry.is_expired(Instant::now()),
            None => false,
        }
    }

    pub fn set(&self, cache_key: String, result: CacheResult, offline_mode: bool) {
        let now = Instant::now();
        let entry = Entry {
            result,
            cached_at: now,
            ttl: if offline_mode { None } else { Some(self.default_ttl) },
            hits: 0,
            last_accessed_at: now,
        };
        self.inner.lock().unwrap().put(cache_key, entry);
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    /// Sweep expired entries without waiting for a `get()` to touch them. Intended to
    /// be driven by a background timer that never blocks the event loop (§4.2).
    pub fn cleanup(&self) -> usize {
        let mut guard = self.inner.lock().unwrap();
        let now = Instant::now();
        let expired: Vec<String> = guard
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        let count = expired.len();
        for k in expired {
            guard.pop(&k);
        }
        count
    }

    pub fn stats(&self) -> CacheStats {
        let guard = self.inner.lock().unwrap();
        CacheStats {
            entries: guard.len(),
            capacity: guard.cap().get(),
            total_hits: guard.iter().map(|(_, e)| e.hits).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(valid: bool) -> CacheResult {
        CacheResult { valid, display: None, message: None, degraded: false }
    }

    #[test]
    fn get_before_set_is_a_miss() {
        let cache = TerminologyCache::new(10, Duration::from_secs(60));
        assert!(cache.get("k").is_none());
        assert!(!cache.has("k"));
    }

    #[test]
    fn set_then_get_within_ttl_returns_value() {
        let cache = TerminologyCache::new(10, Duration::from_secs(60));
        cache.set("k".into(), result(true), false);
        assert_eq!(cache.get("k"), Some(result(true)));
        assert!(cache.has("k"));
    }

    #[test]
    fn expired_entry_is_evicted_on_read() {
        let cache = TerminologyCache::new(10, Duration::from_millis(1));
        cache.set("k".into(), result(true), false);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k").is_none());
        assert!(!cache.has("k"));
    }

    #[test]
    fn offline_mode_never_expires() {
        let cache = TerminologyCache::new(10, Duration::from_millis(1));
        cache.set("k".into(), result(true), true);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k").is_some());
    }

    #[test]
    fn lru_eviction_drops_least_recently_used() {
        let cache = TerminologyCache::new(2, Duration::from_secs(60));
        cache.set("a".into(), result(true), false);
        cache.set("b".into(), result(true), false);
        cache.get("a"); // touch a, making b the LRU entry
        cache.set("c".into(), result(true), false);
        assert!(cache.has("a"));
        assert!(!cache.has("b"));
        assert!(cache.has("c"));
    }

    #[test]
    fn key_is_stable_and_order_sensitive_to_parts() {
        let k1 = key("sys", "code", Some("vs"), "r4");
        let k2 = key("sys", "code", Some("vs"), "r4");
        let k3 = key("sys", "code", None, "r4");
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn cacheability_does_not_depend_on_display() {
        let k = key("sys", "code", None, "r4");
        let cache = TerminologyCache::new(10, Duration::from_secs(60));
        cache.set(k.clone(), CacheResult { valid: true, display: None, message: None, degraded: false }, false);
        assert!(cache.has(&k));
    }

    #[test]
    fn cleanup_sweeps_expired_without_a_read() {
        let cache = TerminologyCache::new(10, Duration::from_millis(1));
        cache.set("k".into(), result(true), false);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.stats().entries, 0);
    }
}
