//! In-crate fake transport for unit tests
//!
//! Key-value commands hit a shared map; stream commands record appends and
//! otherwise return nothing. Fault knobs cover the pool's connect and close
//! paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use layercache_domain::{CacheError, CacheResult, ConnectionStatus, EventId, StreamEvent};
use parking_lot::Mutex;

use crate::transport::{BackendConnection, Connector, GroupCreation, KeyValueOps, StreamOps};

#[derive(Default)]
struct Shared {
    kv: Mutex<HashMap<String, Vec<u8>>>,
    appended: Mutex<Vec<(String, Vec<u8>)>>,
    eviction_capacity: Mutex<Option<usize>>,
    connects: AtomicU32,
    duplicates: AtomicU32,
    aborts: AtomicU32,
    refuse: AtomicU32,
    fail_ops: AtomicU32,
    next_seq: AtomicU64,
}

#[derive(Clone)]
pub(crate) struct FakeConnector {
    endpoint: String,
    shared: Arc<Shared>,
    connect_delay: Option<Duration>,
    close_delay: Option<Duration>,
    range_delay: Option<Duration>,
}

impl FakeConnector {
    pub(crate) fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            shared: Arc::default(),
            connect_delay: None,
            close_delay: None,
            range_delay: None,
        }
    }

    pub(crate) fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    pub(crate) fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = Some(delay);
        self
    }

    pub(crate) fn with_range_delay(mut self, delay: Duration) -> Self {
        self.range_delay = Some(delay);
        self
    }

    /// Refuse the next `n` connects
    pub(crate) fn refuse_next(&self, n: u32) {
        self.shared.refuse.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` key-value commands
    pub(crate) fn fail_next_ops(&self, n: u32) {
        self.shared.fail_ops.store(n, Ordering::SeqCst);
    }

    pub(crate) fn connects(&self) -> u32 {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn duplicates(&self) -> u32 {
        self.shared.duplicates.load(Ordering::SeqCst)
    }

    pub(crate) fn aborts(&self) -> u32 {
        self.shared.aborts.load(Ordering::SeqCst)
    }

    pub(crate) fn eviction_capacity(&self) -> Option<usize> {
        *self.shared.eviction_capacity.lock()
    }

    pub(crate) fn appended(&self) -> Vec<(String, Vec<u8>)> {
        self.shared.appended.lock().clone()
    }

    pub(crate) fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.shared.kv.lock().get(key).cloned()
    }

    fn open(&self) -> FakeConnection {
        FakeConnection {
            shared: Arc::clone(&self.shared),
            status: Mutex::new(ConnectionStatus::Ready),
            close_delay: self.close_delay,
            range_delay: self.range_delay,
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Connection = FakeConnection;

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn connect(&self) -> CacheResult<FakeConnection> {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        let refused = self
            .shared
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(CacheError::backend_unavailable(format!(
                "connection refused by '{}'",
                self.endpoint
            )));
        }
        Ok(self.open())
    }

    async fn duplicate(&self, _connection: &FakeConnection) -> CacheResult<FakeConnection> {
        self.shared.duplicates.fetch_add(1, Ordering::SeqCst);
        Ok(self.open())
    }

    /// Same endpoint shares state; any other endpoint is a separate server
    fn with_endpoint(&self, endpoint: &str) -> CacheResult<Self> {
        if endpoint == self.endpoint {
            return Ok(self.clone());
        }
        Ok(Self { endpoint: endpoint.to_string(), shared: Arc::default(), ..self.clone() })
    }
}

pub(crate) struct FakeConnection {
    shared: Arc<Shared>,
    status: Mutex<ConnectionStatus>,
    close_delay: Option<Duration>,
    range_delay: Option<Duration>,
}

impl FakeConnection {
    fn check(&self) -> CacheResult<()> {
        if *self.status.lock() == ConnectionStatus::Closed {
            return Err(CacheError::backend_unavailable("connection is closed"));
        }
        let failed = self
            .shared
            .fail_ops
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(CacheError::backend_unavailable("injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueOps for FakeConnection {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.shared.kv.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8], _ttl: Option<Duration>) -> CacheResult<()> {
        self.check()?;
        self.shared.kv.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.check()?;
        Ok(self.shared.kv.lock().remove(key).is_some())
    }

    async fn flush(&self) -> CacheResult<()> {
        self.check()?;
        self.shared.kv.lock().clear();
        Ok(())
    }

    async fn configure_eviction(&self, capacity: usize) -> CacheResult<()> {
        self.check()?;
        *self.shared.eviction_capacity.lock() = Some(capacity);
        Ok(())
    }
}

#[async_trait]
impl StreamOps for FakeConnection {
    async fn append(&self, stream: &str, payload: &[u8], _max_len: usize) -> CacheResult<EventId> {
        self.check()?;
        self.shared.appended.lock().push((stream.to_string(), payload.to_vec()));
        Ok(EventId::new(1, self.shared.next_seq.fetch_add(1, Ordering::SeqCst)))
    }

    async fn create_group(&self, _stream: &str, _group: &str) -> CacheResult<GroupCreation> {
        self.check()?;
        Ok(GroupCreation::Created)
    }

    async fn claim_idle(
        &self,
        _stream: &str,
        _group: &str,
        _consumer: &str,
        _min_idle: Duration,
        _count: usize,
    ) -> CacheResult<Vec<StreamEvent>> {
        self.check()?;
        Ok(Vec::new())
    }

    async fn read_group(
        &self,
        _stream: &str,
        _group: &str,
        _consumer: &str,
        _block: Duration,
        _count: usize,
    ) -> CacheResult<Vec<StreamEvent>> {
        self.check()?;
        Ok(Vec::new())
    }

    async fn ack(&self, _stream: &str, _group: &str, _id: EventId) -> CacheResult<bool> {
        self.check()?;
        Ok(true)
    }

    async fn range(
        &self,
        _stream: &str,
        _start: EventId,
        _count: usize,
    ) -> CacheResult<Vec<StreamEvent>> {
        self.check()?;
        if let Some(delay) = self.range_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Vec::new())
    }
}

#[async_trait]
impl BackendConnection for FakeConnection {
    fn status(&self) -> ConnectionStatus {
        *self.status.lock()
    }

    async fn close(&self) -> CacheResult<()> {
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
        *self.status.lock() = ConnectionStatus::Closed;
        Ok(())
    }

    fn abort(&self) {
        self.shared.aborts.fetch_add(1, Ordering::SeqCst);
        *self.status.lock() = ConnectionStatus::Closed;
    }
}
