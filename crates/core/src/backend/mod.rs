//! Cache backends and the layer chain built over them
//!
//! Every substrate (in-process map, bounded LRU store, pooled remote store)
//! implements [`CacheBackend`]. [`CacheLayer`] composes one or more of them
//! with optional compression and shard partitioning, always in the order
//! base, then compression, then partitioning.

use std::time::Duration;

use async_trait::async_trait;
use layercache_domain::CacheResult;

pub mod builder;
pub mod compression;
pub mod layer;
pub mod memory;
pub mod partition;
pub mod remote;

pub use builder::{BackendBuilder, BuiltBackend};
pub use compression::CompressionLayer;
pub use layer::CacheLayer;
pub use memory::MemoryStore;
pub use partition::PartitionLayer;
pub use remote::RemoteStore;

/// Byte-level cache capability
///
/// Errors from the substrate are surfaced, never swallowed.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store `value`; a `ttl` of `None` never expires
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    async fn clear(&self) -> CacheResult<()>;
}
