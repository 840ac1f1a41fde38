//! Layer chain construction from settings

use std::sync::Arc;

use layercache_common::{Clock, GzipCodec, SystemClock};
use layercache_domain::{BackendKind, CacheResult, CacheSettings};
use tracing::{debug, info};

use super::{CacheBackend, CacheLayer, MemoryStore, RemoteStore};
use crate::eviction::EvictionStore;
use crate::pool::ConnectionPool;
use crate::transport::Connector;

/// A constructed chain plus the resources it owns
pub struct BuiltBackend<C: Connector> {
    pub layer: Arc<CacheLayer>,
    /// One pool per remote endpoint, empty for local backends
    pub pools: Vec<Arc<ConnectionPool<C>>>,
    /// Bounded local shards, for eviction statistics
    pub eviction_stores: Vec<Arc<EvictionStore>>,
}

impl<C: Connector> std::fmt::Debug for BuiltBackend<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltBackend")
            .field("layer", &self.layer)
            .field("pools", &self.pools.len())
            .field("eviction_stores", &self.eviction_stores.len())
            .finish()
    }
}

/// Builds the base backends named by [`CacheSettings`] and composes them
///
/// Local backends get one store per shard. With partitioning on, the shard
/// list length sets how many; `bounded.capacity` applies to each shard.
/// Remote backends get one warmed pool per endpoint.
pub struct BackendBuilder<'a, C: Connector> {
    settings: &'a CacheSettings,
    connector: &'a C,
    clock: Arc<dyn Clock>,
}

impl<'a, C: Connector> BackendBuilder<'a, C> {
    pub fn new(settings: &'a CacheSettings, connector: &'a C) -> Self {
        Self { settings, connector, clock: Arc::new(SystemClock) }
    }

    /// Time source for local expiry
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn build(self) -> CacheResult<BuiltBackend<C>> {
        let settings = self.settings;
        let mut pools = Vec::new();
        let mut eviction_stores = Vec::new();

        let shards: Vec<Arc<dyn CacheBackend>> = if settings.uses_remote() {
            let mut shards: Vec<Arc<dyn CacheBackend>> = Vec::new();
            for endpoint in settings.remote_endpoints() {
                let connector = self.connector.with_endpoint(&endpoint)?;
                let pool = Arc::new(ConnectionPool::new(connector, settings.pool.clone())?);
                pool.warm().await?;

                let store = if settings.backend == BackendKind::Bounded {
                    RemoteStore::bounded(Arc::clone(&pool), settings.bounded.capacity).await?
                } else {
                    RemoteStore::new(Arc::clone(&pool))
                };
                debug!(endpoint = %endpoint, "remote shard ready");
                shards.push(Arc::new(store));
                pools.push(pool);
            }
            shards
        } else {
            (0..settings.shard_count())
                .map(|_| -> CacheResult<Arc<dyn CacheBackend>> {
                    match settings.backend {
                        BackendKind::Bounded => {
                            let store = Arc::new(EvictionStore::with_clock(
                                settings.bounded.capacity,
                                Arc::clone(&self.clock),
                            )?);
                            eviction_stores.push(Arc::clone(&store));
                            Ok(store)
                        }
                        _ => Ok(Arc::new(MemoryStore::with_clock(Arc::clone(&self.clock)))),
                    }
                })
                .collect::<CacheResult<_>>()?
        };

        let compression = settings.compression.then(|| GzipCodec::new(settings.compression_level));
        let layer = CacheLayer::compose(shards, compression)?;
        info!(
            backend = %settings.backend,
            shards = layer.shard_count(),
            compression = settings.compression,
            "cache backend built"
        );

        Ok(BuiltBackend { layer: Arc::new(layer), pools, eviction_stores })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeConnector;

    fn settings(backend: BackendKind) -> CacheSettings {
        let mut settings = CacheSettings { backend, ..CacheSettings::default() };
        settings.pool.min = 1;
        settings
    }

    /// Validates `BackendBuilder::build` behavior for the partitioned local
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms one bounded store per shard, each with the full capacity.
    /// - Confirms no pools are opened for local backends.
    #[tokio::test]
    async fn test_partitioned_bounded_local() {
        let mut settings = settings(BackendKind::Bounded);
        settings.partitioning = true;
        settings.shards = vec!["a".into(), "b".into(), "c".into()];
        settings.bounded.capacity = 5;
        let connector = FakeConnector::new("fake://unused");

        let built = BackendBuilder::new(&settings, &connector).build().await.unwrap();

        assert_eq!(built.layer.shard_count(), 3);
        assert_eq!(built.eviction_stores.len(), 3);
        assert!(built.eviction_stores.iter().all(|store| store.capacity() == 5));
        assert!(built.pools.is_empty());
        assert_eq!(connector.connects(), 0);
    }

    /// Validates `BackendBuilder::build` behavior for the durable bounded
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms a warmed pool is opened for the remote URL.
    /// - Confirms configuring eviction opened a second pooled connection
    ///   while the pool was below max.
    /// - Confirms remote eviction is configured with the capacity.
    #[tokio::test]
    async fn test_durable_bounded_uses_remote_eviction() {
        let mut settings = settings(BackendKind::Bounded);
        settings.bounded.durable = true;
        settings.bounded.capacity = 64;
        settings.remote_url = "fake://primary".into();
        let connector = FakeConnector::new("fake://primary");

        let built = BackendBuilder::new(&settings, &connector).build().await.unwrap();

        assert_eq!(built.pools.len(), 1);
        assert_eq!(built.pools[0].endpoint(), "fake://primary");
        assert_eq!(built.pools[0].stats().total, 2);
        assert_eq!(connector.connects(), 2);
        assert_eq!(connector.eviction_capacity(), Some(64));
        assert!(built.eviction_stores.is_empty());
        assert!(matches!(*built.layer, CacheLayer::Base(_)));
    }

    /// Validates `BackendBuilder::build` behavior for the compressed remote
    /// shards scenario.
    ///
    /// Assertions:
    /// - Confirms one pool per shard endpoint.
    /// - Confirms values round-trip through compression and routing.
    #[tokio::test]
    async fn test_remote_shards_with_compression() {
        let mut settings = settings(BackendKind::Remote);
        settings.partitioning = true;
        settings.compression = true;
        settings.shards = vec!["fake://s0".into(), "fake://s1".into()];
        let connector = FakeConnector::new("fake://s0");

        let built = BackendBuilder::new(&settings, &connector).build().await.unwrap();
        let endpoints: Vec<_> = built.pools.iter().map(|pool| pool.endpoint().to_string()).collect();
        assert_eq!(endpoints, vec!["fake://s0", "fake://s1"]);

        built.layer.set("k", b"value".to_vec(), None).await.unwrap();
        assert_eq!(built.layer.get("k").await.unwrap(), Some(b"value".to_vec()));
    }
}
