//! Connector and connection over the in-process network

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use layercache_core::transport::{
    BackendConnection, Connector, GroupCreation, KeyValueOps, StreamOps,
};
use layercache_domain::{CacheError, CacheResult, ConnectionStatus, EventId, StreamEvent};
use parking_lot::Mutex;
use tracing::debug;

use super::server::LoopbackServer;

/// Registry of loopback endpoints
///
/// Connectors created from the same network reach the same servers, which
/// is how several nodes in one test share a log.
#[derive(Debug, Default)]
pub struct LoopbackNetwork {
    servers: Mutex<HashMap<String, Arc<LoopbackServer>>>,
}

impl LoopbackNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The server at `endpoint`, started on first use
    pub fn server(&self, endpoint: &str) -> Arc<LoopbackServer> {
        let mut servers = self.servers.lock();
        Arc::clone(
            servers
                .entry(endpoint.to_string())
                .or_insert_with(|| Arc::new(LoopbackServer::new(endpoint))),
        )
    }

    pub fn connector(self: &Arc<Self>, endpoint: &str) -> LoopbackConnector {
        LoopbackConnector {
            network: Arc::clone(self),
            server: self.server(endpoint),
        }
    }
}

/// [`Connector`] for one loopback endpoint
#[derive(Debug, Clone)]
pub struct LoopbackConnector {
    network: Arc<LoopbackNetwork>,
    server: Arc<LoopbackServer>,
}

impl LoopbackConnector {
    pub fn server(&self) -> &Arc<LoopbackServer> {
        &self.server
    }

    fn open(&self) -> CacheResult<LoopbackConnection> {
        let generation = self.server.accept()?;
        Ok(LoopbackConnection {
            server: Arc::clone(&self.server),
            generation,
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    type Connection = LoopbackConnection;

    fn endpoint(&self) -> &str {
        self.server.endpoint()
    }

    async fn connect(&self) -> CacheResult<LoopbackConnection> {
        let connection = self.open()?;
        debug!(endpoint = %self.endpoint(), "loopback connection opened");
        Ok(connection)
    }

    async fn duplicate(&self, _connection: &LoopbackConnection) -> CacheResult<LoopbackConnection> {
        self.open()
    }

    fn with_endpoint(&self, endpoint: &str) -> CacheResult<Self> {
        Ok(self.network.connector(endpoint))
    }
}

/// A connection to a [`LoopbackServer`]
#[derive(Debug)]
pub struct LoopbackConnection {
    server: Arc<LoopbackServer>,
    generation: u64,
    closed: AtomicBool,
}

impl LoopbackConnection {
    fn check(&self) -> CacheResult<()> {
        if !self.status().is_ready() {
            return Err(CacheError::backend_unavailable(format!(
                "connection to '{}' is closed",
                self.server.endpoint()
            )));
        }
        self.server.check_fault()
    }
}

#[async_trait]
impl KeyValueOps for LoopbackConnection {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.server.get(key))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        self.check()?;
        self.server.set(key, value.to_vec(), ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.check()?;
        Ok(self.server.delete(key))
    }

    async fn flush(&self) -> CacheResult<()> {
        self.check()?;
        self.server.flush();
        Ok(())
    }

    async fn configure_eviction(&self, capacity: usize) -> CacheResult<()> {
        self.check()?;
        self.server.configure_eviction(capacity)
    }
}

#[async_trait]
impl StreamOps for LoopbackConnection {
    async fn append(&self, stream: &str, payload: &[u8], max_len: usize) -> CacheResult<EventId> {
        self.check()?;
        Ok(self.server.append(stream, payload, max_len))
    }

    async fn create_group(&self, stream: &str, group: &str) -> CacheResult<GroupCreation> {
        self.check()?;
        if self.server.create_group(stream, group) {
            Ok(GroupCreation::Created)
        } else {
            Ok(GroupCreation::AlreadyExists)
        }
    }

    async fn claim_idle(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> CacheResult<Vec<StreamEvent>> {
        self.check()?;
        self.server.claim_idle(stream, group, consumer, min_idle, count)
    }

    /// A zero `block` returns immediately
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        block: Duration,
        count: usize,
    ) -> CacheResult<Vec<StreamEvent>> {
        self.check()?;
        let deadline = (!block.is_zero()).then(|| tokio::time::Instant::now() + block);
        self.server.read_group(stream, group, consumer, count, deadline, self.generation).await
    }

    async fn ack(&self, stream: &str, group: &str, id: EventId) -> CacheResult<bool> {
        self.check()?;
        Ok(self.server.ack(stream, group, id))
    }

    async fn range(
        &self,
        stream: &str,
        start: EventId,
        count: usize,
    ) -> CacheResult<Vec<StreamEvent>> {
        self.check()?;
        Ok(self.server.range(stream, start, count))
    }
}

#[async_trait]
impl BackendConnection for LoopbackConnection {
    fn status(&self) -> ConnectionStatus {
        if self.closed.load(Ordering::SeqCst) || self.server.generation() != self.generation {
            ConnectionStatus::Closed
        } else {
            ConnectionStatus::Ready
        }
    }

    async fn close(&self) -> CacheResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn abort(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
