//! Write-behind queue
//!
//! Writes land in the cache immediately and their commits are queued. A
//! single drain task runs the commits one at a time in enqueue order. Each
//! commit is attempted once; a failure is logged and the item is dropped.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use layercache_domain::{CacheError, CacheResult};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::backend::CacheBackend;
use crate::codec;

type CommitFn = Box<dyn FnOnce(Value) -> BoxFuture<'static, CacheResult<()>> + Send>;

/// A queued commit
pub struct WriteQueueItem {
    pub key: String,
    pub value: Value,
    commit: CommitFn,
    pub enqueued_at: Instant,
}

impl WriteQueueItem {
    pub fn new<F, Fut>(key: impl Into<String>, value: Value, commit: F) -> Self
    where
        F: FnOnce(Value) -> Fut + Send + 'static,
        Fut: Future<Output = CacheResult<()>> + Send + 'static,
    {
        Self {
            key: key.into(),
            value,
            commit: Box::new(move |value| commit(value).boxed()),
            enqueued_at: Instant::now(),
        }
    }
}

impl std::fmt::Debug for WriteQueueItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteQueueItem")
            .field("key", &self.key)
            .field("enqueued_at", &self.enqueued_at)
            .finish()
    }
}

/// Queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteBehindStats {
    pub pending: usize,
    pub committed: u64,
    pub failed: u64,
    /// Longest time an item waited before its commit started
    pub max_queued_ms: u64,
}

struct Shared {
    queue: Mutex<VecDeque<WriteQueueItem>>,
    draining: AtomicBool,
    accepting: AtomicBool,
    /// Items enqueued and not yet finished, including the one in flight
    pending: AtomicUsize,
    idle: Notify,
    committed: AtomicU64,
    failed: AtomicU64,
    max_queued_ms: AtomicU64,
}

pub struct WriteBehind {
    backend: Arc<dyn CacheBackend>,
    shared: Arc<Shared>,
}

impl WriteBehind {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                accepting: AtomicBool::new(true),
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
                committed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                max_queued_ms: AtomicU64::new(0),
            }),
        }
    }

    /// Cache `value` and queue its commit; returns once the cache write is
    /// done
    pub async fn write<T, F, Fut>(
        &self,
        key: &str,
        value: &T,
        commit: F,
        ttl: Option<Duration>,
    ) -> CacheResult<()>
    where
        T: Serialize + ?Sized,
        F: FnOnce(Value) -> Fut + Send + 'static,
        Fut: Future<Output = CacheResult<()>> + Send + 'static,
    {
        self.ensure_accepting()?;
        let value = serde_json::to_value(value)?;
        self.backend.set(key, codec::encode(&value)?, ttl).await?;
        self.enqueue(WriteQueueItem::new(key, value, commit))
    }

    /// Queue an item without touching the cache
    pub fn enqueue(&self, item: WriteQueueItem) -> CacheResult<()> {
        self.ensure_accepting()?;
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        self.shared.queue.lock().push_back(item);
        schedule_drain(&self.shared);
        Ok(())
    }

    /// Items queued or in flight
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> WriteBehindStats {
        WriteBehindStats {
            pending: self.pending(),
            committed: self.shared.committed.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            max_queued_ms: self.shared.max_queued_ms.load(Ordering::Relaxed),
        }
    }

    /// Wait until every queued commit has been attempted
    pub async fn flush(&self, timeout: Duration) -> CacheResult<()> {
        let idle = async {
            loop {
                let notified = self.shared.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.pending() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, idle)
            .await
            .map_err(|_| CacheError::timeout("write-behind flush", timeout))
    }

    /// Stop accepting writes and flush what is queued
    pub async fn shutdown(&self, timeout: Duration) -> CacheResult<()> {
        self.shared.accepting.store(false, Ordering::Release);
        info!(pending = self.pending(), "draining write-behind queue");
        self.flush(timeout).await
    }

    fn ensure_accepting(&self) -> CacheResult<()> {
        if self.shared.accepting.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(CacheError::ShuttingDown("write-behind queue".to_string()))
        }
    }
}

/// Start a drain task unless one is running
fn schedule_drain(shared: &Arc<Shared>) {
    if shared.draining.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok() {
        tokio::spawn(drain(Arc::clone(shared)));
    }
}

async fn drain(shared: Arc<Shared>) {
    loop {
        loop {
            let next = shared.queue.lock().pop_front();
            let Some(item) = next else { break };
            run_commit(&shared, item).await;
            if shared.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                shared.idle.notify_waiters();
            }
        }

        shared.draining.store(false, Ordering::Release);
        // an item pushed after the last pop but before the store above saw
        // `draining == true` and did not spawn; pick it up here
        if shared.queue.lock().is_empty() {
            return;
        }
        if shared
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
    }
}

async fn run_commit(shared: &Shared, item: WriteQueueItem) {
    let WriteQueueItem { key, value, commit, enqueued_at } = item;
    let started = Instant::now();
    let queued_ms = started.duration_since(enqueued_at).as_millis() as u64;
    shared.max_queued_ms.fetch_max(queued_ms, Ordering::Relaxed);

    let outcome = AssertUnwindSafe(async move { commit(value).await }).catch_unwind().await;
    let commit_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(())) => {
            shared.committed.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, queued_ms, commit_ms, "write-behind commit done");
        }
        Ok(Err(err)) => {
            shared.failed.fetch_add(1, Ordering::Relaxed);
            warn!(
                key = %key,
                error = %err,
                queued_ms,
                commit_ms,
                "write-behind commit failed, dropping"
            );
        }
        Err(_) => {
            shared.failed.fetch_add(1, Ordering::Relaxed);
            error!(key = %key, queued_ms, commit_ms, "write-behind commit panicked, dropping");
        }
    }
}
