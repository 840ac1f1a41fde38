//! Shard partitioning layer
//!
//! A key is routed to `shards[h mod N]`, where `h` is the first eight bytes
//! of the key's SHA-256 digest read as a big-endian integer. Routing depends
//! only on the key and `N`: changing the number of shards moves most keys to
//! a different shard and their old values become unreachable. Resharding is
//! not supported.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use layercache_domain::{CacheError, CacheResult};
use sha2::{Digest, Sha256};
use tracing::warn;

use super::{CacheBackend, CacheLayer};

#[derive(Debug)]
pub struct PartitionLayer {
    shards: Vec<CacheLayer>,
}

impl PartitionLayer {
    /// Route across `shards`; at least one shard is required
    pub fn new(shards: Vec<CacheLayer>) -> CacheResult<Self> {
        if shards.is_empty() {
            return Err(CacheError::config("partitioning requires at least one shard"));
        }
        Ok(Self { shards })
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Index of the shard that owns `key`
    pub fn shard_index(&self, key: &str) -> usize {
        shard_for(key, self.shards.len())
    }

    fn shard(&self, key: &str) -> &CacheLayer {
        &self.shards[self.shard_index(key)]
    }
}

/// Stable shard index of `key` among `shard_count` shards
pub fn shard_for(key: &str, shard_count: usize) -> usize {
    if shard_count <= 1 {
        return 0;
    }
    let digest = Sha256::digest(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let hash = u64::from_be_bytes(prefix);
    (hash % shard_count as u64) as usize
}

#[async_trait]
impl CacheBackend for PartitionLayer {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.shard(key).get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        self.shard(key).set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.shard(key).delete(key).await
    }

    /// Clears every shard; all shards are attempted and the first failure is
    /// returned.
    async fn clear(&self) -> CacheResult<()> {
        let results = join_all(self.shards.iter().map(|shard| shard.clear())).await;
        let mut first_error = None;
        for (index, result) in results.into_iter().enumerate() {
            if let Err(err) = result {
                warn!(shard = index, error = %err, "failed to clear shard");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::MemoryStore;

    fn three_shards() -> (Vec<Arc<MemoryStore>>, PartitionLayer) {
        let stores: Vec<_> = (0..3).map(|_| Arc::new(MemoryStore::new())).collect();
        let layers = stores
            .iter()
            .map(|store| CacheLayer::Base(store.clone() as Arc<dyn CacheBackend>))
            .collect();
        (stores, PartitionLayer::new(layers).unwrap())
    }

    /// Validates `PartitionLayer::shard_index` behavior for the 3-shard
    /// stability scenario.
    ///
    /// Assertions:
    /// - Confirms repeated lookups of a key resolve to the same shard.
    /// - Confirms the value lands only in that shard.
    #[tokio::test]
    async fn test_three_shard_routing_is_stable() {
        let (stores, layer) = three_shards();

        for i in 0..50 {
            let key = format!("user:{i}");
            let index = layer.shard_index(&key);
            for _ in 0..5 {
                assert_eq!(layer.shard_index(&key), index);
            }

            layer.set(&key, vec![1], None).await.unwrap();
            for (shard, store) in stores.iter().enumerate() {
                let held = store.get(&key).await.unwrap().is_some();
                assert_eq!(held, shard == index);
            }
        }
    }

    /// Validates `shard_for` behavior for the digest prefix scenario.
    ///
    /// Assertions:
    /// - Confirms the index equals the big-endian SHA-256 prefix modulo N.
    /// - Ensures keys spread over every shard.
    #[test]
    fn test_shard_for_uses_digest_prefix() {
        let digest = Sha256::digest(b"article:1");
        let expected = u64::from_be_bytes(digest[..8].try_into().unwrap()) % 3;
        assert_eq!(shard_for("article:1", 3), expected as usize);

        let mut seen = [false; 3];
        for i in 0..100 {
            seen[shard_for(&format!("k{i}"), 3)] = true;
        }
        assert!(seen.iter().all(|hit| *hit));
        assert_eq!(shard_for("anything", 1), 0);
    }

    /// Validates `PartitionLayer::clear` behavior for the fan-out scenario.
    ///
    /// Assertions:
    /// - Confirms every shard is emptied.
    #[tokio::test]
    async fn test_clear_fans_out() {
        let (stores, layer) = three_shards();
        for i in 0..30 {
            layer.set(&format!("k{i}"), vec![0], None).await.unwrap();
        }

        layer.clear().await.unwrap();
        assert!(stores.iter().all(|store| store.is_empty()));
    }

    /// Validates `PartitionLayer::new` behavior for the empty shard list
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures an empty shard list is a configuration error.
    #[test]
    fn test_empty_shards_rejected() {
        assert!(matches!(PartitionLayer::new(Vec::new()), Err(CacheError::Config(_))));
    }
}
