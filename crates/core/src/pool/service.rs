//! Pool service

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::join_all;
use layercache_common::resilience::policies::ClassifiedRetry;
use layercache_common::{ComponentHealth, RetryConfig, RetryError, RetryExecutor};
use layercache_domain::{CacheError, CacheResult, ConnectionStatus, PoolSettings};
use parking_lot::Mutex;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tracing::{debug, info, instrument, warn};

use super::{PoolStats, PooledConnection};
use crate::transport::{BackendConnection, Connector};

struct PoolState<T> {
    connections: Vec<PooledConnection<T>>,
    duplicates: Vec<PooledConnection<T>>,
    /// Connects in flight; counted against `max` so concurrent callers
    /// cannot overshoot it
    reserved: usize,
}

impl<T: BackendConnection> PoolState<T> {
    fn prune_closed(&mut self) {
        self.connections.retain(|conn| conn.status() != ConnectionStatus::Closed);
        self.duplicates.retain(|conn| conn.status() != ConnectionStatus::Closed);
    }

    fn size(&self) -> usize {
        self.connections.len() + self.reserved
    }
}

enum Slot<'a, T> {
    Shared(PooledConnection<T>),
    Open(Reservation<'a, T>),
    Wait(Notified<'a>),
}

/// A reserved slot; released on drop unless filled
struct Reservation<'a, T> {
    state: &'a Mutex<PoolState<T>>,
    released: &'a Notify,
}

impl<T> Drop for Reservation<'_, T> {
    fn drop(&mut self) {
        self.state.lock().reserved -= 1;
        self.released.notify_waiters();
    }
}

/// Bounded set of connections to one endpoint
pub struct ConnectionPool<C: Connector> {
    connector: C,
    settings: PoolSettings,
    state: Mutex<PoolState<C::Connection>>,
    next_id: AtomicU64,
    cursor: AtomicUsize,
    closed: AtomicBool,
    slot_released: Notify,
    retry: RetryExecutor<ClassifiedRetry>,
}

impl<C: Connector> std::fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("endpoint", &self.connector.endpoint())
            .field("stats", &self.stats())
            .finish()
    }
}

impl<C: Connector> ConnectionPool<C> {
    /// Create an empty pool; no connection is opened until first use or
    /// [`warm`](Self::warm)
    pub fn new(connector: C, settings: PoolSettings) -> CacheResult<Self> {
        settings.validate()?;

        let retry_config = RetryConfig::builder()
            .max_attempts(settings.connect_attempts)
            .capped_backoff(settings.retry_base, settings.retry_cap)
            .build()?;
        let retry = RetryExecutor::new(retry_config, ClassifiedRetry)
            .with_label(format!("connect {}", connector.endpoint()));

        Ok(Self {
            connector,
            settings,
            state: Mutex::new(PoolState {
                connections: Vec::new(),
                duplicates: Vec::new(),
                reserved: 0,
            }),
            next_id: AtomicU64::new(1),
            cursor: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            slot_released: Notify::new(),
            retry,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.connector.endpoint()
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// A connection for one or more commands
    ///
    /// Below `max` a new connection is opened (with reconnect backoff);
    /// at `max` an existing one is picked round-robin. Closed connections
    /// are dropped from the pool first.
    pub async fn acquire(&self) -> CacheResult<PooledConnection<C::Connection>> {
        loop {
            self.ensure_open()?;

            let slot = {
                let mut state = self.state.lock();
                state.prune_closed();

                if state.size() < self.settings.max {
                    state.reserved += 1;
                    Slot::Open(Reservation { state: &self.state, released: &self.slot_released })
                } else if state.connections.is_empty() {
                    // every slot is a connect in flight
                    Slot::Wait(self.slot_released.notified())
                } else {
                    let index = self.cursor.fetch_add(1, Ordering::Relaxed) % state.connections.len();
                    Slot::Shared(state.connections[index].clone())
                }
            };

            match slot {
                Slot::Shared(conn) => return Ok(conn),
                Slot::Open(reservation) => return self.open_shared(reservation).await,
                Slot::Wait(notified) => notified.await,
            }
        }
    }

    /// An independent connection with the configuration of a pooled one
    ///
    /// Duplicates are for blocking reads that must not stall shared
    /// connections. They are not counted against `max` but are closed by
    /// [`shutdown`](Self::shutdown).
    #[instrument(skip(self), fields(endpoint = %self.endpoint()))]
    pub async fn acquire_duplicate(&self) -> CacheResult<PooledConnection<C::Connection>> {
        let base = self.acquire().await?;
        let base_conn: &C::Connection = &base;
        let connector = &self.connector;
        let conn = self.establish(move || connector.duplicate(base_conn)).await?;

        let mut state = self.state.lock();
        if self.is_closed() {
            conn.abort();
            return Err(self.shutting_down());
        }
        let pooled = PooledConnection::new(self.next_id.fetch_add(1, Ordering::Relaxed), conn);
        state.duplicates.push(pooled.clone());
        debug!(id = pooled.id(), duplicates = state.duplicates.len(), "opened duplicate connection");
        Ok(pooled)
    }

    /// Open connections until the pool holds `min`
    #[instrument(skip(self), fields(endpoint = %self.endpoint(), min = self.settings.min))]
    pub async fn warm(&self) -> CacheResult<()> {
        let missing = self.settings.min.saturating_sub(self.state.lock().size());
        for _ in 0..missing {
            self.ensure_open()?;
            let reservation = {
                let mut state = self.state.lock();
                if state.size() >= self.settings.min.min(self.settings.max) {
                    break;
                }
                state.reserved += 1;
                Reservation { state: &self.state, released: &self.slot_released }
            };
            self.open_shared(reservation).await?;
        }
        info!(connections = self.stats().total, "connection pool warmed");
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            total: state.connections.len(),
            ready: state.connections.iter().filter(|conn| conn.status().is_ready()).count(),
            duplicates: state.duplicates.len(),
            max: self.settings.max,
            reserved: state.reserved,
        }
    }

    /// Healthy while open with at least one ready connection
    pub fn health(&self) -> ComponentHealth {
        let name = format!("pool:{}", self.endpoint());
        if self.is_closed() {
            return ComponentHealth::unhealthy(name, "pool is shut down");
        }
        let stats = self.stats();
        if stats.ready == 0 {
            return ComponentHealth::unhealthy(
                name,
                format!("no ready connections ({} held)", stats.total),
            );
        }
        ComponentHealth::healthy(name)
    }

    /// Close every connection, waiting at most `timeout` for graceful
    /// closes before aborting the rest
    ///
    /// Later calls are no-ops. Acquires after shutdown fail with
    /// `CacheError::ShuttingDown`.
    #[instrument(skip(self), fields(endpoint = %self.endpoint()))]
    pub async fn shutdown(&self, timeout: Duration) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.slot_released.notify_waiters();

        let connections: Vec<_> = {
            let mut state = self.state.lock();
            let mut all = std::mem::take(&mut state.connections);
            all.append(&mut state.duplicates);
            all
        };
        info!(count = connections.len(), "closing pooled connections");

        let closing = join_all(connections.iter().map(|conn| conn.close()));
        match tokio::time::timeout(timeout, closing).await {
            Ok(results) => {
                for (conn, result) in connections.iter().zip(results) {
                    if let Err(err) = result {
                        warn!(id = conn.id(), error = %err, "graceful close failed, aborting");
                        conn.abort();
                    }
                }
            }
            Err(_) => {
                let stragglers = connections
                    .iter()
                    .filter(|conn| conn.status() != ConnectionStatus::Closed)
                    .inspect(|conn| conn.abort())
                    .count();
                warn!(stragglers, ?timeout, "pool shutdown timed out, forced close");
            }
        }
    }

    async fn open_shared(
        &self,
        reservation: Reservation<'_, C::Connection>,
    ) -> CacheResult<PooledConnection<C::Connection>> {
        let connector = &self.connector;
        let conn = self.establish(move || connector.connect()).await?;

        let mut state = self.state.lock();
        if self.is_closed() {
            drop(state);
            conn.abort();
            return Err(self.shutting_down());
        }
        let pooled = PooledConnection::new(self.next_id.fetch_add(1, Ordering::Relaxed), conn);
        state.connections.push(pooled.clone());
        debug!(id = pooled.id(), total = state.connections.len(), "opened pooled connection");
        drop(state);
        drop(reservation);
        Ok(pooled)
    }

    /// Run `open` under the reconnect budget; only a ready connection counts
    /// as success
    async fn establish<F, Fut>(&self, mut open: F) -> CacheResult<C::Connection>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CacheResult<C::Connection>>,
    {
        let endpoint = self.endpoint();
        let result = self
            .retry
            .execute(|| {
                let attempt = open();
                async move {
                    let conn = attempt.await?;
                    if conn.status().is_ready() {
                        Ok(conn)
                    } else {
                        conn.abort();
                        Err(CacheError::backend_unavailable(format!(
                            "connection to '{endpoint}' is not ready"
                        )))
                    }
                }
            })
            .await;

        result.map_err(|err| match err {
            RetryError::AttemptsExhausted { attempts, source } => {
                CacheError::backend_unavailable(format!(
                    "could not connect to '{endpoint}' after {attempts} attempts: {source}"
                ))
            }
            RetryError::NonRetryable { source } => source,
        })
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.is_closed() {
            Err(self.shutting_down())
        } else {
            Ok(())
        }
    }

    fn shutting_down(&self) -> CacheError {
        CacheError::ShuttingDown(format!("connection pool for '{}'", self.endpoint()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::testing::FakeConnector;

    fn settings(min: usize, max: usize) -> PoolSettings {
        PoolSettings {
            min,
            max,
            connect_attempts: 3,
            retry_base: Duration::from_millis(50),
            retry_cap: Duration::from_millis(2000),
            shutdown_timeout: Duration::from_millis(500),
        }
    }

    /// Validates `ConnectionPool::acquire` behavior for the pool at max
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms no more than `max` connections are opened.
    /// - Confirms acquires at max rotate through the pooled connections.
    #[tokio::test]
    async fn test_acquire_grows_to_max_then_round_robins() {
        let connector = FakeConnector::new("fake://a");
        let pool = ConnectionPool::new(connector.clone(), settings(0, 2)).unwrap();

        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(connector.connects(), 2);

        let rotated: Vec<u64> = {
            let mut ids = Vec::new();
            for _ in 0..4 {
                ids.push(pool.acquire().await.unwrap().id());
            }
            ids
        };
        assert_eq!(connector.connects(), 2);
        assert_eq!(rotated[0], rotated[2]);
        assert_eq!(rotated[1], rotated[3]);
        assert_ne!(rotated[0], rotated[1]);
        assert_eq!(pool.stats().total, 2);
    }

    /// Validates `ConnectionPool::acquire` behavior for concurrent callers.
    ///
    /// Assertions:
    /// - Ensures concurrent acquires never open more than `max` connections.
    #[tokio::test]
    async fn test_concurrent_acquire_respects_max() {
        let connector = FakeConnector::new("fake://a").with_connect_delay(Duration::from_millis(5));
        let pool = Arc::new(ConnectionPool::new(connector.clone(), settings(0, 3)).unwrap());

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move { pool.acquire().await.map(|conn| conn.id()) })
            })
            .collect();

        let mut ids = HashSet::new();
        for task in tasks {
            ids.insert(task.await.unwrap().unwrap());
        }
        assert!(ids.len() <= 3);
        assert_eq!(connector.connects(), 3);
        assert_eq!(pool.stats().reserved, 0);
    }

    /// Validates `ConnectionPool::acquire` behavior for the transient
    /// refusal scenario.
    ///
    /// Assertions:
    /// - Confirms refused connects are retried with capped backoff.
    /// - Confirms the pool succeeds once the endpoint accepts.
    #[tokio::test(start_paused = true)]
    async fn test_reconnect_with_backoff() {
        let connector = FakeConnector::new("fake://a");
        connector.refuse_next(2);
        let pool = ConnectionPool::new(connector.clone(), settings(0, 2)).unwrap();

        let started = tokio::time::Instant::now();
        pool.acquire().await.unwrap();

        assert_eq!(connector.connects(), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(150));
    }

    /// Validates `ConnectionPool::acquire` behavior for the exhausted budget
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures the error is `BackendUnavailable` naming the attempts.
    /// - Confirms the reserved slot is released.
    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_is_backend_unavailable() {
        let connector = FakeConnector::new("fake://down");
        connector.refuse_next(u32::MAX);
        let pool = ConnectionPool::new(connector.clone(), settings(0, 2)).unwrap();

        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, CacheError::BackendUnavailable(ref m) if m.contains("3 attempts")));
        assert_eq!(connector.connects(), 3);
        assert_eq!(pool.stats().reserved, 0);
    }

    /// Validates `ConnectionPool::acquire` behavior for the closed
    /// connection scenario.
    ///
    /// Assertions:
    /// - Confirms a closed connection is pruned and replaced.
    #[tokio::test]
    async fn test_closed_connections_are_pruned() {
        let connector = FakeConnector::new("fake://a");
        let pool = ConnectionPool::new(connector.clone(), settings(0, 1)).unwrap();

        let first = pool.acquire().await.unwrap();
        first.abort();

        let second = pool.acquire().await.unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(pool.stats().total, 1);
    }

    /// Validates `ConnectionPool::acquire_duplicate` behavior for the
    /// blocking reader scenario.
    ///
    /// Assertions:
    /// - Confirms the duplicate is a distinct connection.
    /// - Confirms it is tracked but not counted against `max`.
    #[tokio::test]
    async fn test_duplicate_is_tracked_outside_max() {
        let connector = FakeConnector::new("fake://a");
        let pool = ConnectionPool::new(connector.clone(), settings(0, 1)).unwrap();

        let shared = pool.acquire().await.unwrap();
        let duplicate = pool.acquire_duplicate().await.unwrap();

        assert_ne!(shared.id(), duplicate.id());
        let stats = pool.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(connector.duplicates(), 1);
    }

    /// Validates `ConnectionPool::warm` and `health` for the startup
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms `warm` opens `min` connections.
    /// - Confirms the pool is healthy once warmed and unhealthy before.
    #[tokio::test]
    async fn test_warm_and_health() {
        let connector = FakeConnector::new("fake://a");
        let pool = ConnectionPool::new(connector.clone(), settings(2, 4)).unwrap();
        assert!(!pool.health().is_healthy);

        pool.warm().await.unwrap();

        assert_eq!(pool.stats().total, 2);
        assert!(pool.health().is_healthy);
    }

    /// Validates `ConnectionPool::shutdown` behavior for the hung close
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms connections whose close outlives the timeout are aborted.
    /// - Ensures acquires after shutdown fail with `ShuttingDown`.
    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_stragglers() {
        let connector = FakeConnector::new("fake://a").with_close_delay(Duration::from_secs(60));
        let pool = ConnectionPool::new(connector.clone(), settings(0, 1)).unwrap();
        let shared = pool.acquire().await.unwrap();
        let duplicate = pool.acquire_duplicate().await.unwrap();

        pool.shutdown(Duration::from_millis(100)).await;

        assert_eq!(shared.status(), ConnectionStatus::Closed);
        assert_eq!(duplicate.status(), ConnectionStatus::Closed);
        assert_eq!(connector.aborts(), 2);
        assert!(matches!(pool.acquire().await, Err(CacheError::ShuttingDown(_))));
        assert!(!pool.health().is_healthy);
    }
}
