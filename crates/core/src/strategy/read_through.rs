//! Read-through (cache-aside) reads

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use layercache_domain::{CacheError, CacheResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::CacheBackend;
use crate::codec;
use crate::ports::MetricsSink;

pub struct ReadThrough {
    backend: Arc<dyn CacheBackend>,
    metrics: Arc<dyn MetricsSink>,
}

impl ReadThrough {
    pub fn new(backend: Arc<dyn CacheBackend>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { backend, metrics }
    }

    /// Cached value for `key`
    ///
    /// An entry that cannot be decoded is deleted and read as absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let bytes = match self.backend.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(None),
            Err(err) if err.is_serialization() => {
                self.discard(key, &err).await;
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        match codec::decode(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                self.discard(key, &err).await;
                Ok(None)
            }
        }
    }

    /// Cached value for `key`, or the loader's value stored with `ttl`
    ///
    /// The loader runs at most once per call and only on a miss. Its error
    /// is returned unchanged and nothing is cached.
    pub async fn obtain<T, F, Fut>(&self, key: &str, loader: F, ttl: Option<Duration>) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        let started = Instant::now();
        let result = self.obtain_uninstrumented(key, loader, ttl).await;
        self.metrics.record_api_latency(started.elapsed().as_millis() as u64);
        result
    }

    async fn obtain_uninstrumented<T, F, Fut>(
        &self,
        key: &str,
        loader: F,
        ttl: Option<Duration>,
    ) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        if let Some(value) = self.get(key).await? {
            self.metrics.record_hit();
            return Ok(value);
        }

        self.metrics.record_miss();
        let value = loader().await?;
        self.backend.set(key, codec::encode(&value)?, ttl).await?;
        debug!(key, "cached loaded value");
        Ok(value)
    }

    /// Fetch the current value and overwrite the cached entry with it
    pub async fn invalidate_on_update<T, F, Fut>(
        &self,
        key: &str,
        fetch: F,
        ttl: Option<Duration>,
    ) -> CacheResult<T>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        let value = fetch().await?;
        self.backend.set(key, codec::encode(&value)?, ttl).await?;
        Ok(value)
    }

    pub async fn invalidate_on_delete(&self, key: &str) -> CacheResult<()> {
        self.backend.delete(key).await
    }

    async fn discard(&self, key: &str, cause: &CacheError) {
        warn!(key, error = %cause, "discarding undecodable cache entry");
        if let Err(err) = self.backend.delete(key).await {
            warn!(key, error = %err, "failed to delete undecodable cache entry");
        }
    }
}
