//! Metrics collection modules
//!
//! Thread-safe metrics for the cache.

pub mod cache;

pub use cache::{CacheMonitor, MonitorSnapshot};
