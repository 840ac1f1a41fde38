//! Pooled remote key-value store

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use layercache_domain::CacheResult;
use tracing::info;

use super::CacheBackend;
use crate::pool::ConnectionPool;
use crate::transport::{Connector, KeyValueOps};

/// Backend that runs every command on a connection from the pool
pub struct RemoteStore<C: Connector> {
    pool: Arc<ConnectionPool<C>>,
}

impl<C: Connector> RemoteStore<C> {
    pub fn new(pool: Arc<ConnectionPool<C>>) -> Self {
        Self { pool }
    }

    /// A remote store whose endpoint evicts all keys LRU once it holds
    /// about `capacity` entries
    pub async fn bounded(pool: Arc<ConnectionPool<C>>, capacity: usize) -> CacheResult<Self> {
        let connection = pool.acquire().await?;
        connection.configure_eviction(capacity).await?;
        info!(endpoint = pool.endpoint(), capacity, "configured remote LRU eviction");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Arc<ConnectionPool<C>> {
        &self.pool
    }
}

#[async_trait]
impl<C: Connector> CacheBackend for RemoteStore<C> {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.pool.acquire().await?.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        self.pool.acquire().await?.set(key, &value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.pool.acquire().await?.delete(key).await.map(|_| ())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.pool.acquire().await?.flush().await
    }
}

#[cfg(test)]
mod tests {
    use layercache_domain::{CacheError, PoolSettings};

    use super::*;
    use crate::testing::FakeConnector;

    fn pool(connector: &FakeConnector) -> Arc<ConnectionPool<FakeConnector>> {
        let settings = PoolSettings { min: 1, max: 2, ..PoolSettings::default() };
        Arc::new(ConnectionPool::new(connector.clone(), settings).unwrap())
    }

    /// Validates `RemoteStore` behavior for the pooled command scenario.
    ///
    /// Assertions:
    /// - Confirms set/get/delete/clear reach the remote keyspace.
    #[tokio::test]
    async fn test_commands_run_on_pooled_connections() {
        let connector = FakeConnector::new("fake://remote");
        let store = RemoteStore::new(pool(&connector));

        store.set("k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(connector.raw("k"), Some(b"v".to_vec()));
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("a", b"1".to_vec(), None).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(connector.raw("a"), None);
    }

    /// Validates `RemoteStore::bounded` behavior for the durable LRU
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the endpoint is told to evict at the given capacity.
    #[tokio::test]
    async fn test_bounded_configures_eviction() {
        let connector = FakeConnector::new("fake://remote");
        RemoteStore::bounded(pool(&connector), 250).await.unwrap();
        assert_eq!(connector.eviction_capacity(), Some(250));
    }

    /// Validates `RemoteStore::get` behavior for the transport failure
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures substrate errors surface instead of reading as a miss.
    #[tokio::test]
    async fn test_transport_errors_surface() {
        let connector = FakeConnector::new("fake://remote");
        let store = RemoteStore::new(pool(&connector));
        store.set("k", b"v".to_vec(), None).await.unwrap();

        connector.fail_next_ops(1);
        assert!(matches!(store.get("k").await, Err(CacheError::BackendUnavailable(_))));
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
    }
}
