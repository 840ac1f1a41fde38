//! Gzip layer
//!
//! Values are compressed on write. On read, only values that start with the
//! gzip magic bytes are decompressed; anything else is returned unchanged so
//! entries written before compression was enabled stay readable.

use std::time::Duration;

use async_trait::async_trait;
use layercache_common::GzipCodec;
use layercache_domain::CacheResult;

use super::{CacheBackend, CacheLayer};

#[derive(Debug)]
pub struct CompressionLayer {
    inner: Box<CacheLayer>,
    codec: GzipCodec,
}

impl CompressionLayer {
    pub fn new(inner: CacheLayer, codec: GzipCodec) -> Self {
        Self { inner: Box::new(inner), codec }
    }

    pub fn inner(&self) -> &CacheLayer {
        &self.inner
    }
}

#[async_trait]
impl CacheBackend for CompressionLayer {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        match self.inner.get(key).await? {
            Some(stored) if GzipCodec::is_compressed(&stored) => {
                Ok(Some(self.codec.decompress(&stored)?))
            }
            other => Ok(other),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let compressed = self.codec.compress(&value)?;
        self.inner.set(key, compressed, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.inner.delete(key).await
    }

    async fn clear(&self) -> CacheResult<()> {
        self.inner.clear().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::backend::MemoryStore;
    use crate::codec;

    fn layer_over(store: Arc<MemoryStore>) -> CompressionLayer {
        CompressionLayer::new(CacheLayer::Base(store), GzipCodec::default())
    }

    /// Validates `CompressionLayer` behavior for the JSON round trip
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the stored bytes are gzip.
    /// - Confirms the value read back is deep-equal to the one written.
    #[tokio::test]
    async fn test_json_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let layer = layer_over(store.clone());
        let value = json!({"id": 3, "tags": ["a", "b"], "body": "x".repeat(512), "score": 1.5});

        layer.set("doc", codec::encode(&value).unwrap(), None).await.unwrap();

        let stored = store.get("doc").await.unwrap().unwrap();
        assert!(GzipCodec::is_compressed(&stored));
        let read: serde_json::Value =
            codec::decode(&layer.get("doc").await.unwrap().unwrap()).unwrap();
        assert_eq!(read, value);
    }

    /// Validates `CompressionLayer::get` behavior for the pre-existing raw
    /// value scenario.
    ///
    /// Assertions:
    /// - Confirms an uncompressed value is passed through unchanged.
    #[tokio::test]
    async fn test_raw_value_passes_through() {
        let store = Arc::new(MemoryStore::new());
        store.set("legacy", br#"{"v":1}"#.to_vec(), None).await.unwrap();

        let layer = layer_over(store);
        assert_eq!(layer.get("legacy").await.unwrap(), Some(br#"{"v":1}"#.to_vec()));
    }

    /// Validates `CompressionLayer::get` behavior for the corrupt gzip
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures bytes with the gzip magic but a broken body are a
    ///   serialization error.
    #[tokio::test]
    async fn test_corrupt_gzip_is_serialization_error() {
        let store = Arc::new(MemoryStore::new());
        store.set("bad", vec![0x1f, 0x8b, 0x00, 0x01], None).await.unwrap();

        let layer = layer_over(store);
        assert!(layer.get("bad").await.unwrap_err().is_serialization());
    }
}
