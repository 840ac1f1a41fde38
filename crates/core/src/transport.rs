//! Port interfaces for the remote key-value and log service
//!
//! A [`Connector`] opens [`BackendConnection`]s to one endpoint. The
//! connection pool owns the connections; remote stores, the event stream
//! and the consumer loop borrow them through the pool.

use std::time::Duration;

use async_trait::async_trait;
use layercache_domain::{CacheResult, ConnectionStatus, EventId, StreamEvent};

/// Result of creating a consumer group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupCreation {
    Created,
    AlreadyExists,
}

/// Key-value commands
#[async_trait]
pub trait KeyValueOps: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store `value`; `ttl` of `None` never expires
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()>;

    /// Remove `key`; returns whether it existed
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Remove every key on the endpoint
    async fn flush(&self) -> CacheResult<()>;

    /// Switch the endpoint to all-keys LRU eviction sized for `capacity`
    /// entries. How capacity maps onto the service's own limit is up to the
    /// adapter.
    async fn configure_eviction(&self, capacity: usize) -> CacheResult<()>;
}

/// Append-only log commands with consumer groups
#[async_trait]
pub trait StreamOps: Send + Sync {
    /// Append a payload under the `message` field, trimming the log to
    /// roughly `max_len` entries
    async fn append(&self, stream: &str, payload: &[u8], max_len: usize) -> CacheResult<EventId>;

    /// Create `group` positioned at new events only, creating the stream if
    /// needed
    async fn create_group(&self, stream: &str, group: &str) -> CacheResult<GroupCreation>;

    /// Transfer to `consumer` up to `count` entries that have been pending
    /// in `group` for at least `min_idle`
    async fn claim_idle(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> CacheResult<Vec<StreamEvent>>;

    /// Read up to `count` never-delivered entries for `consumer`, waiting up
    /// to `block` for one to arrive
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        block: Duration,
        count: usize,
    ) -> CacheResult<Vec<StreamEvent>>;

    /// Acknowledge one entry; returns whether it was pending
    async fn ack(&self, stream: &str, group: &str, id: EventId) -> CacheResult<bool>;

    /// Read up to `count` entries with ids at or after `start`, in order
    async fn range(&self, stream: &str, start: EventId, count: usize)
        -> CacheResult<Vec<StreamEvent>>;
}

/// A single transport connection
#[async_trait]
pub trait BackendConnection: KeyValueOps + StreamOps + Send + Sync + 'static {
    fn status(&self) -> ConnectionStatus;

    /// Graceful close
    async fn close(&self) -> CacheResult<()>;

    /// Immediate close without waiting for in-flight commands
    fn abort(&self);
}

/// Factory for connections to one endpoint
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: BackendConnection;

    fn endpoint(&self) -> &str;

    /// Open a new connection
    async fn connect(&self) -> CacheResult<Self::Connection>;

    /// Open an independent connection with the same configuration as
    /// `connection`
    async fn duplicate(&self, connection: &Self::Connection) -> CacheResult<Self::Connection>;

    /// A connector for another endpoint of the same kind
    fn with_endpoint(&self, endpoint: &str) -> CacheResult<Self>
    where
        Self: Sized;
}
