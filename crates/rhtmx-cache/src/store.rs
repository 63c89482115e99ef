//! In-memory TTL store

use crate::clock::{Clock, SystemClock};
use crate::entry::{CacheEntry, CacheStats};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Key/value cache with lazy expiration
///
/// Expired entries are evicted when `get` or `has` touches them. There is no
/// background sweep, so `stats()` can report entries that are expired but
/// still stored.
///
/// All operations are synchronous and hold the lock only for the duration of
/// a single map access, which makes check-and-set sequences by callers safe
/// as long as they do not await in between.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V> TtlCache<V> {
    /// Create a cache backed by the wall clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Store `value` under `key`
    ///
    /// `ttl_ms <= 0` stores a permanent entry. Empty keys are ignored.
    pub fn set(&self, key: &str, value: V, ttl_ms: i64) {
        if key.is_empty() {
            warn!("Invalid cache key provided, skipping set operation");
            return;
        }

        let entry = CacheEntry::new(value, self.clock.now(), ttl_ms);
        debug!(key, permanent = entry.is_permanent(), "Value cached");
        self.entries.lock().insert(key.to_string(), entry);
    }

    /// Store `value` under `key` for `ttl`
    pub fn set_for(&self, key: &str, value: V, ttl: Duration) {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self.set(key, value, ttl_ms);
    }

    /// Check if `key` holds a value that has not expired
    pub fn has(&self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }

        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired_at(now) => {
                entries.remove(key);
                debug!(key, "Entry expired and removed");
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Remove `key`, returning whether it was stored
    pub fn delete(&self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        self.entries.lock().remove(key).is_some()
    }

    /// Remove every entry, returning how many were stored
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        debug!(cleared = count, "All cache entries cleared");
        count
    }

    /// Count stored, expired and valid entries
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.entries.lock();
        let expired = entries
            .values()
            .filter(|entry| entry.is_expired_at(now))
            .count();

        CacheStats {
            total: entries.len(),
            expired,
            valid: entries.len() - expired,
        }
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Get all stored keys
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }
}

impl<V: Clone> TtlCache<V> {
    /// Get the value under `key`
    ///
    /// Returns `None` for unknown, empty or expired keys. Expired entries are
    /// evicted as a side effect.
    pub fn get(&self, key: &str) -> Option<V> {
        if key.is_empty() {
            warn!("Invalid cache key provided");
            return None;
        }

        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            None => {
                debug!(key, "Cache miss");
                None
            }
            Some(entry) if entry.is_expired_at(now) => {
                entries.remove(key);
                debug!(key, "Cached value expired, removed");
                None
            }
            Some(entry) => {
                debug!(key, "Cache hit");
                Some(entry.value.clone())
            }
        }
    }
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use pretty_assertions::assert_eq;

    fn manual_cache() -> (TtlCache<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        (TtlCache::with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_set_get_delete() {
        let cache: TtlCache<String> = TtlCache::new();

        cache.set("key", "value".to_string(), 0);
        assert_eq!(cache.get("key"), Some("value".to_string()));
        assert!(cache.has("key"));

        assert!(cache.delete("key"));
        assert!(!cache.delete("key"));
        assert_eq!(cache.get("key"), None);
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let cache: TtlCache<String> = TtlCache::new();

        cache.set("", "value".to_string(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.get(""), None);
        assert!(!cache.has(""));
        assert!(!cache.delete(""));
    }

    #[test]
    fn test_zero_ttl_survives_an_hour() {
        let (cache, clock) = manual_cache();

        cache.set("k", "v".to_string(), 0);
        clock.advance(Duration::from_secs(3600));

        assert_eq!(cache.get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_lazy_expiration_evicts_on_get() {
        let (cache, clock) = manual_cache();

        cache.set("k", "v".to_string(), 10);
        clock.advance(Duration::from_millis(20));

        // Still stored until touched
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().expired, 1);

        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_has_evicts_expired() {
        let (cache, clock) = manual_cache();

        cache.set("k", "v".to_string(), 10);
        clock.advance(Duration::from_millis(11));

        assert!(!cache.has("k"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_returns_count() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.set("a", 1, 0);
        cache.set("b", 2, 1000);

        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.clear(), 0);
    }

    #[test]
    fn test_stats() {
        let (cache, clock) = manual_cache();
        cache.set("short", "1".to_string(), 5);
        cache.set("long", "2".to_string(), 60_000);
        cache.set("forever", "3".to_string(), 0);

        clock.advance(Duration::from_millis(100));

        assert_eq!(
            cache.stats(),
            CacheStats {
                total: 3,
                expired: 1,
                valid: 2,
            }
        );
    }

    #[test]
    fn test_set_for_duration() {
        let (cache, clock) = manual_cache();
        cache.set_for("k", "v".to_string(), Duration::from_secs(2));

        clock.advance(Duration::from_secs(1));
        assert!(cache.has("k"));

        clock.advance(Duration::from_secs(2));
        assert!(!cache.has("k"));
    }

    #[test]
    fn test_overwrite_resets_ttl() {
        let (cache, clock) = manual_cache();
        cache.set("k", "old".to_string(), 10);
        cache.set("k", "new".to_string(), 0);

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("k"), Some("new".to_string()));
    }
}
