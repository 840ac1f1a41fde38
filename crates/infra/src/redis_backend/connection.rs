//! Connector and connection over a multiplexed Redis connection

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use layercache_core::transport::{
    BackendConnection, Connector, GroupCreation, KeyValueOps, StreamOps,
};
use layercache_domain::constants::STREAM_PAYLOAD_FIELD;
use layercache_domain::{CacheError, CacheResult, ConnectionStatus, EventId, StreamEvent};
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamClaimReply, StreamPendingCountReply, StreamRangeReply, StreamReadReply};
use redis::{Client, Cmd};
use tracing::{debug, instrument, warn};

use super::reply;
use crate::errors::InfraError;

/// `maxmemory` granted per configured entry of a bounded remote cache
const MEGABYTES_PER_ENTRY: usize = 100;

fn map_err(err: redis::RedisError) -> CacheError {
    InfraError::from(err).into()
}

/// Whether a connection is still usable
///
/// A multiplexed connection whose socket died never recovers, so a
/// transport failure marks it closed and the pool replaces it.
#[derive(Debug, Default)]
struct Liveness {
    closed: AtomicBool,
}

impl Liveness {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.is_closed() {
            Err(CacheError::backend_unavailable("redis connection is closed"))
        } else {
            Ok(())
        }
    }

    /// Map a command error, closing the connection when the transport broke
    fn observe(&self, err: redis::RedisError) -> CacheError {
        let broken = err.is_connection_dropped() || err.is_unrecoverable_error();
        if broken && !self.closed.swap(true, Ordering::SeqCst) {
            warn!(error = %err, "redis transport failed; connection marked closed");
        }
        map_err(err)
    }
}

/// [`Connector`] for one Redis URL
#[derive(Debug, Clone)]
pub struct RedisConnector {
    client: Client,
    endpoint: String,
}

impl RedisConnector {
    /// Parse `url` (`redis://host:port/db`); no connection is made yet
    pub fn new(url: &str) -> CacheResult<Self> {
        let client = Client::open(url).map_err(map_err)?;
        Ok(Self { client, endpoint: url.to_string() })
    }
}

#[async_trait]
impl Connector for RedisConnector {
    type Connection = RedisConnection;

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn connect(&self) -> CacheResult<RedisConnection> {
        let conn = self.client.get_multiplexed_async_connection().await.map_err(map_err)?;
        debug!("redis connection established");
        Ok(RedisConnection { conn, liveness: Liveness::default() })
    }

    /// Blocking reads need their own socket; a clone of a multiplexed
    /// connection would share one
    async fn duplicate(&self, _connection: &RedisConnection) -> CacheResult<RedisConnection> {
        self.connect().await
    }

    fn with_endpoint(&self, endpoint: &str) -> CacheResult<Self> {
        Self::new(endpoint)
    }
}

/// One multiplexed connection to Redis
pub struct RedisConnection {
    conn: MultiplexedConnection,
    liveness: Liveness,
}

impl std::fmt::Debug for RedisConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConnection").field("status", &self.status()).finish()
    }
}

impl RedisConnection {
    async fn query<T: redis::FromRedisValue + Send>(&self, cmd: &Cmd) -> CacheResult<T> {
        self.liveness.ensure_open()?;
        let mut conn = self.conn.clone();
        cmd.query_async(&mut conn).await.map_err(|err| self.liveness.observe(err))
    }
}

#[async_trait]
impl KeyValueOps for RedisConnection {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.query(redis::cmd("GET").arg(key)).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            // PX 0 is rejected by the server
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            cmd.arg("PX").arg(millis);
        }
        self.query(&cmd).await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let removed: i64 = self.query(redis::cmd("DEL").arg(key)).await?;
        Ok(removed > 0)
    }

    async fn flush(&self) -> CacheResult<()> {
        self.query(&redis::cmd("FLUSHDB")).await
    }

    async fn configure_eviction(&self, capacity: usize) -> CacheResult<()> {
        if capacity == 0 {
            return Err(CacheError::config("eviction capacity must be greater than 0"));
        }
        let () = self
            .query(redis::cmd("CONFIG").arg("SET").arg("maxmemory-policy").arg("allkeys-lru"))
            .await?;
        let megabytes = capacity.saturating_mul(MEGABYTES_PER_ENTRY);
        self.query(redis::cmd("CONFIG").arg("SET").arg("maxmemory").arg(format!("{megabytes}mb")))
            .await
    }
}

#[async_trait]
impl StreamOps for RedisConnection {
    async fn append(&self, stream: &str, payload: &[u8], max_len: usize) -> CacheResult<EventId> {
        let id: String = self
            .query(
                redis::cmd("XADD")
                    .arg(stream)
                    .arg("MAXLEN")
                    .arg("~")
                    .arg(max_len)
                    .arg("*")
                    .arg(STREAM_PAYLOAD_FIELD)
                    .arg(payload),
            )
            .await?;
        id.parse()
    }

    async fn create_group(&self, stream: &str, group: &str) -> CacheResult<GroupCreation> {
        let cmd = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("$")
            .arg("MKSTREAM")
            .to_owned();
        self.liveness.ensure_open()?;
        let mut conn = self.conn.clone();
        let created: redis::RedisResult<()> = cmd.query_async(&mut conn).await;
        match created {
            Ok(()) => Ok(GroupCreation::Created),
            Err(err) if err.code() == Some("BUSYGROUP") => Ok(GroupCreation::AlreadyExists),
            Err(err) => Err(self.liveness.observe(err)),
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
        let pending: StreamPendingCountReply = self
            .query(redis::cmd("XPENDING").arg(stream).arg(group).arg("-").arg("+").arg(count))
            .await?;
        let min_idle_ms = u64::try_from(min_idle.as_millis()).unwrap_or(u64::MAX);
        let idle: Vec<&str> = pending
            .ids
            .iter()
            .filter(|entry| entry.last_delivered_ms as u64 >= min_idle_ms)
            .map(|entry| entry.id.as_str())
            .collect();
        if idle.is_empty() {
            return Ok(Vec::new());
        }

        let claimed: StreamClaimReply = self
            .query(redis::cmd("XCLAIM").arg(stream).arg(group).arg(consumer).arg(min_idle_ms).arg(&idle))
            .await?;
        Ok(reply::stream_events(stream, &claimed.ids))
    }

    /// A zero `block` polls without blocking
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        block: Duration,
        count: usize,
    ) -> CacheResult<Vec<StreamEvent>> {
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP").arg(group).arg(consumer).arg("COUNT").arg(count);
        if !block.is_zero() {
            cmd.arg("BLOCK").arg(u64::try_from(block.as_millis()).unwrap_or(u64::MAX));
        }
        cmd.arg("STREAMS").arg(stream).arg(">");

        let reply: Option<StreamReadReply> = self.query(&cmd).await?;
        Ok(reply.map(|reply| reply::read_reply_events(stream, &reply.keys)).unwrap_or_default())
    }

    async fn ack(&self, stream: &str, group: &str, id: EventId) -> CacheResult<bool> {
        let acked: i64 =
            self.query(redis::cmd("XACK").arg(stream).arg(group).arg(id.to_string())).await?;
        Ok(acked > 0)
    }

    async fn range(
        &self,
        stream: &str,
        start: EventId,
        count: usize,
    ) -> CacheResult<Vec<StreamEvent>> {
        let reply: StreamRangeReply = self
            .query(
                redis::cmd("XRANGE").arg(stream).arg(start.to_string()).arg("+").arg("COUNT").arg(count),
            )
            .await?;
        Ok(reply::stream_events(stream, &reply.ids))
    }
}

#[async_trait]
impl BackendConnection for RedisConnection {
    fn status(&self) -> ConnectionStatus {
        if self.liveness.is_closed() {
            ConnectionStatus::Closed
        } else {
            ConnectionStatus::Ready
        }
    }

    /// The socket closes once the last clone of the multiplexed handle is
    /// dropped
    async fn close(&self) -> CacheResult<()> {
        self.liveness.close();
        Ok(())
    }

    fn abort(&self) {
        self.liveness.close();
    }
}
