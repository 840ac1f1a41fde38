//! Cache metrics sink
//!
//! Tracks read-through hit/miss counts, API latency and the last reported
//! gauges of every connection pool.
//!
//! ## Design
//! - **SeqCst ordering** for the counters used in derived metrics (hit rate,
//!   average latency)
//! - **Fire-and-forget**: recording never fails and never blocks on I/O

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use layercache_core::pool::PoolStats;
use layercache_core::ports::MetricsSink;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

/// In-process [`MetricsSink`]
#[derive(Debug, Default)]
pub struct CacheMonitor {
    hits: AtomicU64,
    misses: AtomicU64,
    api_calls: AtomicU64,
    api_latency_ms_total: AtomicU64,
    pools: Mutex<BTreeMap<String, PoolStats>>,
}

/// Point-in-time view of a [`CacheMonitor`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    pub hits: u64,
    pub misses: u64,
    /// Percentage (0.0 to 100.0); 0.0 before the first lookup
    pub hit_rate: f64,
    pub api_calls: u64,
    pub avg_api_latency_ms: f64,
    /// Last stats reported per pool endpoint
    pub pools: BTreeMap<String, PoolStats>,
}

impl CacheMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate cache hit rate as a percentage (0.0 to 100.0)
    ///
    /// ```text
    /// hit_rate = (hits / (hits + misses)) * 100.0
    /// ```
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::SeqCst);
        let misses = self.misses.load(Ordering::SeqCst);
        percentage(hits, hits + misses)
    }

    /// Mean read-through latency; 0.0 before the first call
    pub fn avg_api_latency_ms(&self) -> f64 {
        let calls = self.api_calls.load(Ordering::SeqCst);
        if calls == 0 {
            return 0.0;
        }
        self.api_latency_ms_total.load(Ordering::SeqCst) as f64 / calls as f64
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            hits: self.hits.load(Ordering::SeqCst),
            misses: self.misses.load(Ordering::SeqCst),
            hit_rate: self.hit_rate(),
            api_calls: self.api_calls.load(Ordering::SeqCst),
            avg_api_latency_ms: self.avg_api_latency_ms(),
            pools: self.pools.lock().clone(),
        }
    }

    /// Emit the current snapshot as one `info!` record per pool plus a
    /// summary
    pub fn log_stats(&self) {
        let snapshot = self.snapshot();
        info!(
            hits = snapshot.hits,
            misses = snapshot.misses,
            hit_rate = snapshot.hit_rate,
            api_calls = snapshot.api_calls,
            avg_api_latency_ms = snapshot.avg_api_latency_ms,
            "cache stats"
        );
        for (endpoint, stats) in &snapshot.pools {
            info!(
                endpoint = %endpoint,
                total = stats.total,
                ready = stats.ready,
                duplicates = stats.duplicates,
                max = stats.max,
                "pool stats"
            );
        }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::SeqCst);
        self.misses.store(0, Ordering::SeqCst);
        self.api_calls.store(0, Ordering::SeqCst);
        self.api_latency_ms_total.store(0, Ordering::SeqCst);
        self.pools.lock().clear();
    }
}

impl MetricsSink for CacheMonitor {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::SeqCst);
    }

    fn record_api_latency(&self, millis: u64) {
        self.api_calls.fetch_add(1, Ordering::SeqCst);
        self.api_latency_ms_total.fetch_add(millis, Ordering::SeqCst);
    }

    fn record_pool(&self, endpoint: &str, stats: &PoolStats) {
        self.pools.lock().insert(endpoint.to_string(), *stats);
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64) * 100.0
}
