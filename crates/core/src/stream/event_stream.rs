use std::sync::Arc;
use std::time::Duration;

use layercache_domain::{
    CacheError, CacheResult, ConnectionStatus, EventId, ReplayFrom, StreamEvent, StreamSettings,
};
use tracing::{debug, info, instrument, warn};

use crate::pool::{ConnectionPool, PooledConnection};
use crate::transport::{BackendConnection, Connector, GroupCreation, StreamOps};

/// Events read per claim or group read
const READ_BATCH: usize = 10;

/// Slack on top of the server-side block before a read is abandoned
const READ_GRACE: Duration = Duration::from_millis(500);

/// Publish, consume and replay events on the remote log
///
/// Blocking group reads run on a dedicated duplicate connection so they
/// never stall commands on the shared pool. Use [`fork`](Self::fork) to give
/// each concurrent consumer its own reader.
pub struct EventStream<C: Connector> {
    pool: Arc<ConnectionPool<C>>,
    settings: StreamSettings,
    reader: tokio::sync::Mutex<Option<PooledConnection<C::Connection>>>,
}

impl<C: Connector> std::fmt::Debug for EventStream<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("endpoint", &self.pool.endpoint())
            .field("stream_key", &self.settings.stream_key)
            .finish()
    }
}

impl<C: Connector> EventStream<C> {
    pub fn new(pool: Arc<ConnectionPool<C>>, settings: StreamSettings) -> Self {
        Self { pool, settings, reader: tokio::sync::Mutex::new(None) }
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    pub fn pool(&self) -> &Arc<ConnectionPool<C>> {
        &self.pool
    }

    /// Same pool and settings, separate blocking reader
    pub fn fork(&self) -> Self {
        Self::new(Arc::clone(&self.pool), self.settings.clone())
    }

    /// Append `payload`, trimming the log to roughly `max_length` entries
    pub async fn publish(&self, stream: &str, payload: &[u8]) -> CacheResult<EventId> {
        let conn = self.pool.acquire().await?;
        let id = conn
            .append(stream, payload, self.settings.max_length)
            .await
            .map_err(|err| delivery("publish", stream, err))?;
        debug!(stream, id = %id, bytes = payload.len(), "published event");
        Ok(id)
    }

    /// Create `group` at new events only; an existing group is left as is
    #[instrument(skip(self))]
    pub async fn ensure_group(&self, stream: &str, group: &str) -> CacheResult<GroupCreation> {
        let conn = self.pool.acquire().await?;
        let created =
            conn.create_group(stream, group).await.map_err(|err| delivery("create group", stream, err))?;
        match created {
            GroupCreation::Created => info!("created consumer group"),
            GroupCreation::AlreadyExists => debug!("consumer group already exists"),
        }
        Ok(created)
    }

    /// Next events for `consumer`
    ///
    /// Events another consumer left pending for at least `claim_idle` are
    /// reclaimed first. Otherwise waits up to `block_timeout` for new events;
    /// an empty result means nothing arrived.
    pub async fn consume(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        block_timeout: Duration,
    ) -> CacheResult<Vec<StreamEvent>> {
        let reader = self.reader().await?;

        let claimed = reader
            .claim_idle(stream, group, consumer, self.settings.claim_idle, READ_BATCH)
            .await
            .map_err(|err| delivery("claim", stream, err))?;
        if !claimed.is_empty() {
            debug!(stream, consumer, count = claimed.len(), "reclaimed idle events");
            return Ok(claimed);
        }

        let read = reader.read_group(stream, group, consumer, block_timeout, READ_BATCH);
        match tokio::time::timeout(block_timeout + READ_GRACE, read).await {
            Ok(events) => events.map_err(|err| delivery("read", stream, err)),
            Err(_) => {
                warn!(stream, consumer, "blocking read overran its deadline, replacing reader");
                self.discard_reader().await;
                Ok(Vec::new())
            }
        }
    }

    /// Acknowledge one delivered event; returns whether it was pending
    pub async fn ack(&self, stream: &str, group: &str, id: EventId) -> CacheResult<bool> {
        let conn = self.pool.acquire().await?;
        conn.ack(stream, group, id).await.map_err(|err| delivery("ack", stream, err))
    }

    /// Up to `limit` events at or after `from`, in log order
    ///
    /// Does not touch consumer groups. Returns an empty list if the read
    /// does not finish within `timeout`, or `replay_timeout` when `None`.
    pub async fn replay(
        &self,
        stream: &str,
        from: ReplayFrom,
        limit: usize,
        timeout: Option<Duration>,
    ) -> CacheResult<Vec<StreamEvent>> {
        let conn = self.pool.acquire().await?;
        let timeout = timeout.unwrap_or(self.settings.replay_timeout);
        match tokio::time::timeout(timeout, conn.range(stream, from.start_id(), limit)).await {
            Ok(events) => events.map_err(|err| delivery("replay", stream, err)),
            Err(_) => {
                warn!(stream, ?timeout, "replay timed out");
                Ok(Vec::new())
            }
        }
    }

    async fn reader(&self) -> CacheResult<PooledConnection<C::Connection>> {
        let mut slot = self.reader.lock().await;
        if let Some(reader) = slot.as_ref() {
            if reader.status() != ConnectionStatus::Closed {
                return Ok(reader.clone());
            }
        }
        let reader = self.pool.acquire_duplicate().await?;
        *slot = Some(reader.clone());
        Ok(reader)
    }

    async fn discard_reader(&self) {
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
    }
}

fn delivery(operation: &str, stream: &str, err: CacheError) -> CacheError {
    match err {
        CacheError::Delivery(_) | CacheError::ShuttingDown(_) => err,
        other => CacheError::delivery(format!("{operation} on '{stream}' failed: {other}")),
    }
}
