//! Shared fixtures for the loopback integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use layercache_core::{DatabaseReader, DatabaseWriter};
use layercache_domain::{BackendKind, CacheError, CacheResult, CacheSettings, PoolSettings};
use parking_lot::Mutex;
use serde_json::Value;

/// Endpoint the stream and single-shard backends live on
pub const PRIMARY: &str = "loop://primary";

/// Pool settings with millisecond reconnect backoff
pub fn fast_pool() -> PoolSettings {
    PoolSettings {
        min: 1,
        max: 4,
        connect_attempts: 5,
        retry_base: Duration::from_millis(1),
        retry_cap: Duration::from_millis(5),
        shutdown_timeout: Duration::from_secs(1),
    }
}

/// Settings for one node of a loopback deployment
pub fn node_settings(backend: BackendKind, node_id: &str) -> CacheSettings {
    let mut settings = CacheSettings {
        backend,
        remote_url: PRIMARY.to_string(),
        node_id: node_id.to_string(),
        pool: fast_pool(),
        ..CacheSettings::default()
    };
    settings.stream.block_timeout = Duration::from_millis(50);
    settings.stream.error_backoff = Duration::from_millis(10);
    settings.stream.join_timeout = Duration::from_secs(1);
    settings
}

/// In-memory system of record that records every commit
#[derive(Default)]
pub struct RecordingDatabase {
    rows: Mutex<HashMap<String, Value>>,
    commits: Mutex<Vec<(String, Value)>>,
    loads: Mutex<u32>,
}

impl RecordingDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, key: &str, value: Value) {
        self.rows.lock().insert(key.to_string(), value);
    }

    pub fn row(&self, key: &str) -> Option<Value> {
        self.rows.lock().get(key).cloned()
    }

    pub fn commits(&self) -> Vec<(String, Value)> {
        self.commits.lock().clone()
    }

    pub fn loads(&self) -> u32 {
        *self.loads.lock()
    }
}

#[async_trait]
impl DatabaseReader for RecordingDatabase {
    async fn load(&self, key: &str) -> CacheResult<Value> {
        *self.loads.lock() += 1;
        self.rows
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::loader(key, "no such row"))
    }
}

#[async_trait]
impl DatabaseWriter for RecordingDatabase {
    async fn commit(&self, key: &str, value: Value) -> CacheResult<Value> {
        self.rows.lock().insert(key.to_string(), value.clone());
        self.commits.lock().push((key.to_string(), value.clone()));
        Ok(value)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.rows.lock().remove(key);
        Ok(())
    }
}
