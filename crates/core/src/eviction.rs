//! Fixed-capacity LRU store
//!
//! Reads and writes both mark a key most recently used. Inserting a new key
//! into a full store evicts exactly the least recently used entry first;
//! evictions are silent but counted. Entries may carry an expiry, checked on
//! read: an expired entry is removed and reported absent.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use layercache_common::collections::lru::{Inserted, LruCache};
use layercache_common::{CacheStats, Clock, StatsRecorder, SystemClock};
use layercache_domain::{CacheEntry, CacheError, CacheResult};
use parking_lot::Mutex;
use tracing::trace;

use crate::backend::CacheBackend;

/// Bounded, local cache backend
pub struct EvictionStore {
    entries: Mutex<LruCache<String, CacheEntry>>,
    capacity: NonZeroUsize,
    stats: StatsRecorder,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for EvictionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvictionStore")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl EvictionStore {
    /// Create a store holding at most `capacity` entries
    pub fn new(capacity: usize) -> CacheResult<Self> {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    /// Create a store that reads time from `clock`
    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> CacheResult<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            CacheError::config("eviction store capacity must be greater than 0")
        })?;
        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
            stats: StatsRecorder::new(),
            clock,
        })
    }

    /// Create a store from an untyped (possibly negative) capacity
    pub fn try_from_signed(capacity: i64) -> CacheResult<Self> {
        if capacity <= 0 {
            return Err(CacheError::config(format!(
                "eviction store capacity must be greater than 0, got {capacity}"
            )));
        }
        let capacity = usize::try_from(capacity)
            .map_err(|_| CacheError::config(format!("capacity {capacity} does not fit")))?;
        Self::new(capacity)
    }

    /// Value for `key`, marking it most recently used
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        match entries.get(key) {
            None => {
                self.stats.record_miss();
                return None;
            }
            Some(entry) if !entry.is_expired(now) => {
                self.stats.record_hit();
                return Some(entry.value.clone());
            }
            Some(_) => {}
        }

        entries.pop(key);
        self.stats.record_expiration();
        self.stats.record_miss();
        trace!(key, "expired entry removed on read");
        None
    }

    /// Insert or overwrite `key`, marking it most recently used
    pub fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        let entry = CacheEntry::new(key, value, ttl, self.clock.now());
        let mut entries = self.entries.lock();

        if let Inserted::Evicted(evicted, _) = entries.insert(key.to_string(), entry) {
            self.stats.record_eviction();
            trace!(key, evicted = %evicted, "evicted least recently used entry");
        }
        self.stats.record_insert();
    }

    /// Remove `key`; returns whether it was present
    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Whether `key` is held, without touching recency or expiry
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Number of entries evicted to make room since creation
    pub fn evictions(&self) -> u64 {
        self.stats.evictions()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len(), Some(self.capacity()))
    }
}

#[async_trait]
impl CacheBackend for EvictionStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(EvictionStore::get(self, key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        EvictionStore::set(self, key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        EvictionStore::delete(self, key);
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        EvictionStore::clear(self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use layercache_common::MockClock;

    use super::*;

    fn value(n: u8) -> Vec<u8> {
        vec![n]
    }

    /// Validates `EvictionStore::set` behavior for the capacity-2 scenario.
    ///
    /// Assertions:
    /// - Confirms `b` is evicted after `set(a); set(b); get(a); set(c)`.
    /// - Confirms `a` and `c` keep their values.
    /// - Confirms the eviction counter reads 1.
    #[test]
    fn test_capacity_two_scenario() {
        let store = EvictionStore::new(2).unwrap();

        store.set("a", value(1), None);
        store.set("b", value(2), None);
        assert_eq!(store.get("a"), Some(value(1)));
        store.set("c", value(3), None);

        assert_eq!(store.get("b"), None);
        assert_eq!(store.get("a"), Some(value(1)));
        assert_eq!(store.get("c"), Some(value(3)));
        assert_eq!(store.evictions(), 1);
        assert_eq!(store.len(), 2);
    }

    /// Validates `EvictionStore::new` behavior for the invalid capacity
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures capacity 0 is a configuration error.
    /// - Ensures negative signed capacities are configuration errors.
    #[test]
    fn test_invalid_capacity() {
        assert!(matches!(EvictionStore::new(0), Err(CacheError::Config(_))));
        assert!(matches!(EvictionStore::try_from_signed(-3), Err(CacheError::Config(_))));
        assert!(matches!(EvictionStore::try_from_signed(0), Err(CacheError::Config(_))));
        assert_eq!(EvictionStore::try_from_signed(5).unwrap().capacity(), 5);
    }

    /// Validates `EvictionStore::set` behavior for the overwrite at capacity
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms overwriting an existing key never evicts.
    /// - Confirms the overwritten key becomes most recently used.
    #[test]
    fn test_overwrite_does_not_evict() {
        let store = EvictionStore::new(2).unwrap();
        store.set("a", value(1), None);
        store.set("b", value(2), None);

        store.set("a", value(10), None);
        assert_eq!(store.evictions(), 0);

        store.set("c", value(3), None);
        assert!(!store.contains("b"));
        assert_eq!(store.get("a"), Some(value(10)));
    }

    /// Validates `EvictionStore::get` behavior for the expiry scenario.
    ///
    /// Assertions:
    /// - Confirms the entry is returned before its TTL.
    /// - Confirms the entry is absent and removed after its TTL.
    /// - Confirms the expiration is counted.
    #[test]
    fn test_expired_entry_removed_on_read() {
        let clock = MockClock::new();
        let store = EvictionStore::with_clock(4, Arc::new(clock.clone())).unwrap();
        store.set("session", value(9), Some(Duration::from_secs(30)));

        clock.advance(Duration::from_secs(29));
        assert_eq!(store.get("session"), Some(value(9)));

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.get("session"), None);
        assert!(!store.contains("session"));

        let stats = store.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    /// Validates the LRU victim choice for a longer access sequence.
    ///
    /// Assertions:
    /// - Ensures the store never exceeds its capacity.
    /// - Confirms each eviction removes the least recently touched key.
    #[test]
    fn test_size_bound_and_victim_over_sequence() {
        let store = EvictionStore::new(3).unwrap();
        let mut recency: Vec<String> = Vec::new();
        let touch = |recency: &mut Vec<String>, key: &str| {
            recency.retain(|k| k != key);
            recency.push(key.to_string());
        };

        for step in 0u32..40 {
            let key = format!("k{}", (step * 7) % 5);
            if step % 3 == 0 {
                if store.get(&key).is_some() {
                    touch(&mut recency, &key);
                }
            } else {
                let before = store.evictions();
                let victim = if !store.contains(&key) && store.len() == 3 {
                    Some(recency[0].clone())
                } else {
                    None
                };
                store.set(&key, step.to_be_bytes().to_vec(), None);
                touch(&mut recency, &key);

                if let Some(victim) = victim {
                    assert_eq!(store.evictions(), before + 1);
                    assert!(!store.contains(&victim));
                    recency.retain(|k| k != &victim);
                }
            }
            assert!(store.len() <= 3);
        }
    }

    /// Validates the `CacheBackend` impl for the async facade scenario.
    ///
    /// Assertions:
    /// - Confirms async set/get/delete/clear reach the store.
    #[tokio::test]
    async fn test_backend_facade() {
        let store = EvictionStore::new(2).unwrap();
        let backend: &dyn CacheBackend = &store;

        backend.set("k", value(1), None).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(value(1)));
        backend.delete("k").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);

        backend.set("k", value(2), None).await.unwrap();
        backend.clear().await.unwrap();
        assert!(store.is_empty());
    }
}
