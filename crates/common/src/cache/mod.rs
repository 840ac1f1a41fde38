//! Cache statistics shared by every store implementation
//!
//! Stores count their own hits, misses, inserts, evictions and expirations
//! through a [`StatsRecorder`] and expose a [`CacheStats`] snapshot. The
//! counters are side channels: recording never fails and never affects the
//! operation being counted.

pub mod stats;

pub use stats::{CacheStats, StatsRecorder};
