//! Layer chain over one or more base backends

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use layercache_common::GzipCodec;
use layercache_domain::{CacheError, CacheResult};

use super::{CacheBackend, CompressionLayer, PartitionLayer};

/// A base backend or a decorator over other layers
pub enum CacheLayer {
    Base(Arc<dyn CacheBackend>),
    Compressed(CompressionLayer),
    Partitioned(PartitionLayer),
}

impl CacheLayer {
    /// Build the chain: each shard optionally wrapped in compression, then
    /// partitioned across when there is more than one shard.
    pub fn compose(
        shards: Vec<Arc<dyn CacheBackend>>,
        compression: Option<GzipCodec>,
    ) -> CacheResult<Self> {
        if shards.is_empty() {
            return Err(CacheError::config("at least one base backend is required"));
        }

        let mut layers: Vec<CacheLayer> = shards
            .into_iter()
            .map(|shard| {
                let base = CacheLayer::Base(shard);
                match compression {
                    Some(codec) => CacheLayer::Compressed(CompressionLayer::new(base, codec)),
                    None => base,
                }
            })
            .collect();

        if layers.len() == 1 {
            if let Some(layer) = layers.pop() {
                return Ok(layer);
            }
        }
        Ok(CacheLayer::Partitioned(PartitionLayer::new(layers)?))
    }

    /// Number of shards at the top of the chain
    pub fn shard_count(&self) -> usize {
        match self {
            CacheLayer::Partitioned(partition) => partition.shard_count(),
            _ => 1,
        }
    }
}

impl fmt::Debug for CacheLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheLayer::Base(_) => f.write_str("Base"),
            CacheLayer::Compressed(layer) => f.debug_tuple("Compressed").field(layer.inner()).finish(),
            CacheLayer::Partitioned(layer) => {
                f.debug_struct("Partitioned").field("shards", &layer.shard_count()).finish()
            }
        }
    }
}

#[async_trait]
impl CacheBackend for CacheLayer {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        match self {
            CacheLayer::Base(backend) => backend.get(key).await,
            CacheLayer::Compressed(layer) => layer.get(key).await,
            CacheLayer::Partitioned(layer) => layer.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        match self {
            CacheLayer::Base(backend) => backend.set(key, value, ttl).await,
            CacheLayer::Compressed(layer) => layer.set(key, value, ttl).await,
            CacheLayer::Partitioned(layer) => layer.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        match self {
            CacheLayer::Base(backend) => backend.delete(key).await,
            CacheLayer::Compressed(layer) => layer.delete(key).await,
            CacheLayer::Partitioned(layer) => layer.delete(key).await,
        }
    }

    async fn clear(&self) -> CacheResult<()> {
        match self {
            CacheLayer::Base(backend) => backend.clear().await,
            CacheLayer::Compressed(layer) => layer.clear().await,
            CacheLayer::Partitioned(layer) => layer.clear().await,
        }
    }
}
