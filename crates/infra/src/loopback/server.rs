//! One in-process endpoint: a keyspace and a set of logs

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use layercache_common::collections::lru::{Inserted, LruCache};
use layercache_domain::{CacheError, CacheResult, EventId, StreamEvent};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::trace;

use super::log::StreamLog;
use crate::loopback::LoopbackStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GroupError {
    NoGroup,
}

#[derive(Debug)]
struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Option<Instant>,
}

/// Shared state of one loopback endpoint
///
/// Keys are unbounded until [`configure_eviction`](Self::configure_eviction)
/// sets a ceiling, after which the least recently used key is evicted to
/// make room.
#[derive(Debug)]
pub struct LoopbackServer {
    endpoint: String,
    keyspace: Mutex<LruCache<String, StoredValue>>,
    logs: Mutex<HashMap<String, StreamLog>>,
    appended: Notify,
    generation: AtomicU64,
    refuse_connects: AtomicU32,
    fail_ops: AtomicU32,
    connects: AtomicU64,
    evictions: AtomicU64,
}

impl LoopbackServer {
    pub(crate) fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            keyspace: Mutex::new(LruCache::unbounded()),
            logs: Mutex::new(HashMap::new()),
            appended: Notify::new(),
            generation: AtomicU64::new(0),
            refuse_connects: AtomicU32::new(0),
            fail_ops: AtomicU32::new(0),
            connects: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Refuse the next `n` connection attempts
    pub fn refuse_connects(&self, n: u32) {
        self.refuse_connects.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` commands on any connection
    pub fn fail_next(&self, n: u32) {
        self.fail_ops.store(n, Ordering::SeqCst);
    }

    /// Close every open connection, as if the server restarted its
    /// listener; data is kept
    pub fn drop_connections(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.appended.notify_waiters();
    }

    /// Raw stored bytes of `key`, ignoring expiry and recency
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.keyspace.lock().peek(key).map(|value| value.bytes.clone())
    }

    pub fn stream_len(&self, stream: &str) -> usize {
        self.logs.lock().get(stream).map_or(0, StreamLog::len)
    }

    /// `(id, consumer, deliveries)` for every pending entry of `group`
    pub fn pending(&self, stream: &str, group: &str) -> Vec<(EventId, String, u32)> {
        self.logs.lock().get(stream).map(|log| log.pending(group)).unwrap_or_default()
    }

    pub fn stats(&self) -> LoopbackStats {
        let keyspace = self.keyspace.lock();
        LoopbackStats {
            keys: keyspace.len(),
            streams: self.logs.lock().len(),
            connects: self.connects.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub(crate) fn accept(&self) -> CacheResult<u64> {
        self.connects.fetch_add(1, Ordering::Relaxed);
        if take_one(&self.refuse_connects) {
            return Err(CacheError::backend_unavailable(format!(
                "connection refused by '{}'",
                self.endpoint
            )));
        }
        Ok(self.generation())
    }

    pub(crate) fn check_fault(&self) -> CacheResult<()> {
        if take_one(&self.fail_ops) {
            return Err(CacheError::backend_unavailable(format!(
                "injected failure on '{}'",
                self.endpoint
            )));
        }
        Ok(())
    }

    pub(crate) fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        let mut keyspace = self.keyspace.lock();
        let expired = match keyspace.get(key) {
            Some(value) if value.expires_at.map_or(true, |at| now < at) => {
                return Some(value.bytes.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            keyspace.pop(key);
        }
        None
    }

    pub(crate) fn set(&self, key: &str, bytes: Vec<u8>, ttl: Option<Duration>) {
        let value = StoredValue { bytes, expires_at: ttl.map(|ttl| Instant::now() + ttl) };
        if let Inserted::Evicted(evicted, _) = self.keyspace.lock().insert(key.to_string(), value) {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            trace!(endpoint = %self.endpoint, evicted = %evicted, "evicted least recently used key");
        }
    }

    pub(crate) fn delete(&self, key: &str) -> bool {
        self.keyspace.lock().pop(key).is_some()
    }

    pub(crate) fn flush(&self) {
        self.keyspace.lock().clear();
    }

    /// Bound the keyspace to `capacity` keys, evicting the least recently
    /// used keys if it already holds more
    pub(crate) fn configure_eviction(&self, capacity: usize) -> CacheResult<()> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| CacheError::config("eviction capacity must be greater than 0"))?;
        let mut keyspace = self.keyspace.lock();
        let before = keyspace.len();
        keyspace.resize(capacity);
        let dropped = before.saturating_sub(keyspace.len());
        self.evictions.fetch_add(dropped as u64, Ordering::Relaxed);
        Ok(())
    }

    pub(crate) fn append(&self, stream: &str, payload: &[u8], max_len: usize) -> EventId {
        let now_millis = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        let id = self
            .logs
            .lock()
            .entry(stream.to_string())
            .or_default()
            .append(payload.to_vec(), max_len, now_millis);
        self.appended.notify_waiters();
        id
    }

    /// Returns whether the group was created
    pub(crate) fn create_group(&self, stream: &str, group: &str) -> bool {
        self.logs.lock().entry(stream.to_string()).or_default().create_group(group)
    }

    pub(crate) fn claim_idle(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> CacheResult<Vec<StreamEvent>> {
        let now = Instant::now();
        let mut logs = self.logs.lock();
        let log = logs.get_mut(stream).ok_or_else(|| no_group(stream, group))?;
        log.claim_idle(stream, group, consumer, min_idle, count, now)
            .map_err(|_| no_group(stream, group))
    }

    /// Deliver new entries to `consumer`, waiting until `deadline` for one
    /// to be appended. Returns early with nothing once the connection's
    /// `generation` is stale.
    pub(crate) async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        deadline: Option<Instant>,
        generation: u64,
    ) -> CacheResult<Vec<StreamEvent>> {
        loop {
            let notified = self.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut logs = self.logs.lock();
                let log = match logs.get_mut(stream) {
                    Some(log) if log.has_group(group) => log,
                    _ => return Err(no_group(stream, group)),
                };
                let events = log
                    .read_new(stream, group, consumer, count, Instant::now())
                    .map_err(|_| no_group(stream, group))?;
                if !events.is_empty() {
                    return Ok(events);
                }
            }

            if self.generation() != generation {
                return Err(CacheError::backend_unavailable("connection closed by server"));
            }
            let Some(deadline) = deadline else {
                return Ok(Vec::new());
            };
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    pub(crate) fn ack(&self, stream: &str, group: &str, id: EventId) -> bool {
        self.logs.lock().get_mut(stream).is_some_and(|log| log.ack(group, id))
    }

    pub(crate) fn range(&self, stream: &str, start: EventId, count: usize) -> Vec<StreamEvent> {
        self.logs.lock().get(stream).map(|log| log.range(stream, start, count)).unwrap_or_default()
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
}

fn no_group(stream: &str, group: &str) -> CacheError {
    CacheError::delivery(format!("NOGROUP no consumer group '{group}' for stream '{stream}'"))
}
