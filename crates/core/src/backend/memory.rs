//! Unbounded in-process store

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use layercache_common::{Clock, SystemClock};
use layercache_domain::{CacheEntry, CacheResult};
use parking_lot::Mutex;

use super::CacheBackend;

/// Hash map backend with per-entry expiry checked on read
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), clock }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").field("len", &self.len()).finish()
    }
}

#[async_trait]
impl CacheBackend for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let entry = CacheEntry::new(key, value, ttl, self.clock.now());
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.entries.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use layercache_common::MockClock;

    use super::*;

    /// Validates `MemoryStore::get` behavior for the TTL scenario.
    ///
    /// Assertions:
    /// - Confirms the value is readable before expiry.
    /// - Confirms the entry is dropped once expired.
    /// - Confirms entries without TTL survive.
    #[tokio::test]
    async fn test_ttl_expiry() {
        let clock = MockClock::new();
        let store = MemoryStore::with_clock(Arc::new(clock.clone()));
        store.set("short", b"1".to_vec(), Some(Duration::from_millis(500))).await.unwrap();
        store.set("long", b"2".to_vec(), None).await.unwrap();

        assert_eq!(store.get("short").await.unwrap(), Some(b"1".to_vec()));
        clock.advance_millis(500);

        assert_eq!(store.get("short").await.unwrap(), None);
        assert_eq!(store.get("long").await.unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.len(), 1);
    }
}
