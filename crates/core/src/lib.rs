//! # LayerCache Core
//!
//! Caching engine with no transport of its own.
//!
//! This crate contains:
//! - Backends and the decorators composed over them (compression,
//!   partitioning)
//! - The bounded LRU store
//! - Consistency strategies: read-through, write-through, write-behind
//! - The connection pool and the invalidation event stream
//! - The coordinator tying them together on one node
//!
//! ## Architecture Principles
//! - Depends only on `layercache-common` and `layercache-domain`
//! - Remote services are reached through the [`transport`] traits
//! - The system of record and metrics are reached through [`ports`]

pub mod backend;
pub mod codec;
pub mod coordinator;
pub mod eviction;
pub mod pool;
pub mod ports;
pub mod strategy;
pub mod stream;
pub mod transport;

#[cfg(test)]
mod testing;

pub use backend::{
    BackendBuilder, BuiltBackend, CacheBackend, CacheLayer, CompressionLayer, MemoryStore,
    PartitionLayer, RemoteStore,
};
pub use coordinator::{CacheCoordinator, CoordinatorBuilder, InvalidationHandler};
pub use eviction::EvictionStore;
pub use pool::{ConnectionPool, PoolStats, PooledConnection};
pub use ports::{DatabaseReader, DatabaseWriter, MetricsSink, NoopMetrics};
pub use strategy::{
    ConsistencyStrategy, ReadThrough, WriteBehind, WriteBehindStats, WriteQueueItem, WriteThrough,
};
pub use stream::{
    consumer_name, node_group, ConsumerConfig, ConsumerStats, EventHandler, EventStream,
    HandlerError, StreamConsumer,
};
pub use transport::{BackendConnection, Connector, GroupCreation, KeyValueOps, StreamOps};
