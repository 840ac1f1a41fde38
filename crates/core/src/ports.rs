//! Port interfaces for the system of record and metrics
//!
//! These traits are the boundary between the caching engine and the
//! application that embeds it. Values crossing the boundary are JSON
//! documents.

use async_trait::async_trait;
use layercache_domain::CacheResult;
use serde_json::Value;

use crate::pool::PoolStats;

/// Read access to the system of record
#[async_trait]
pub trait DatabaseReader: Send + Sync {
    /// Load the authoritative value for `key`
    async fn load(&self, key: &str) -> CacheResult<Value>;
}

/// Write access to the system of record
#[async_trait]
pub trait DatabaseWriter: Send + Sync {
    /// Persist `value` under `key`, returning the stored representation
    async fn commit(&self, key: &str, value: Value) -> CacheResult<Value>;

    /// Remove `key`
    async fn delete(&self, key: &str) -> CacheResult<()>;
}

/// Fire-and-forget counters; implementations must never fail or block
pub trait MetricsSink: Send + Sync {
    fn record_hit(&self);

    fn record_miss(&self);

    /// Wall time of one read-through call in milliseconds
    fn record_api_latency(&self, millis: u64);

    /// Point-in-time pool gauges
    fn record_pool(&self, _endpoint: &str, _stats: &PoolStats) {}
}

/// Metrics sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_hit(&self) {}

    fn record_miss(&self) {}

    fn record_api_latency(&self, _millis: u64) {}
}
