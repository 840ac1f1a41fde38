//! Integration tests for the connection pool against a flaky endpoint

mod support;

use std::sync::Arc;
use std::time::Duration;

use layercache_core::{ConnectionPool, KeyValueOps, MetricsSink};
use layercache_domain::{CacheError, PoolSettings};
use layercache_infra::{CacheMonitor, LoopbackNetwork};
use support::{fast_pool, PRIMARY};

/// Validates reconnect backoff when the endpoint refuses connections.
///
/// # Test Steps
/// 1. Make the endpoint refuse the next two connects
/// 2. Acquire a connection from a cold pool
/// 3. Verify the acquire succeeds on the third attempt
/// 4. Drop every server-side connection
/// 5. Confirm the next acquire discards the dead connection and reconnects
#[tokio::test]
async fn test_pool_reconnects_after_refusals_and_drops() {
    let network = LoopbackNetwork::new();
    let server = network.server(PRIMARY);
    let pool = ConnectionPool::new(network.connector(PRIMARY), PoolSettings { max: 1, ..fast_pool() })
        .unwrap();

    server.refuse_connects(2);
    let conn = pool.acquire().await.unwrap();
    conn.set("k", b"v", None).await.unwrap();
    assert_eq!(server.stats().connects, 3);
    assert!(pool.health().is_healthy);

    server.drop_connections();
    assert!(conn.get("k").await.is_err());

    let fresh = pool.acquire().await.unwrap();
    assert_ne!(fresh.id(), conn.id());
    assert_eq!(fresh.get("k").await.unwrap(), Some(b"v".to_vec()));
    assert_eq!(server.stats().connects, 4);
    assert_eq!(pool.stats().total, 1);
}

/// Validates the reconnect budget running out.
///
/// # Test Steps
/// 1. Make the endpoint refuse more connects than the pool will attempt
/// 2. Acquire from a cold pool
/// 3. Verify the acquire fails with `BackendUnavailable` naming the attempts
/// 4. Confirm exactly `connect_attempts` connects were tried
/// 5. Validate the pool reports itself unhealthy
#[tokio::test]
async fn test_pool_gives_up_after_connect_attempts() {
    let network = LoopbackNetwork::new();
    let server = network.server(PRIMARY);
    let settings = fast_pool();
    let attempts = settings.connect_attempts;
    let pool = ConnectionPool::new(network.connector(PRIMARY), settings).unwrap();

    server.refuse_connects(attempts + 5);
    let err = pool.acquire().await.unwrap_err();

    assert!(matches!(err, CacheError::BackendUnavailable(ref message) if message.contains("attempts")));
    assert_eq!(server.stats().connects, u64::from(attempts));
    assert!(!pool.health().is_healthy);
}

/// Validates pool gauges flowing into the metrics sink.
///
/// # Test Steps
/// 1. Warm a pool to its maximum and open one duplicate
/// 2. Report its stats to a `CacheMonitor`
/// 3. Verify the snapshot carries the pool's totals under its endpoint
/// 4. Shut the pool down and confirm acquires are rejected
#[tokio::test]
async fn test_pool_stats_reach_monitor() {
    let network = LoopbackNetwork::new();
    let pool = Arc::new(
        ConnectionPool::new(network.connector(PRIMARY), PoolSettings { min: 2, max: 2, ..fast_pool() })
            .unwrap(),
    );
    let monitor = CacheMonitor::new();

    pool.warm().await.unwrap();
    let _reader = pool.acquire_duplicate().await.unwrap();
    monitor.record_pool(pool.endpoint(), &pool.stats());

    let gauges = monitor.snapshot().pools[PRIMARY];
    assert_eq!(gauges.total, 2);
    assert_eq!(gauges.ready, 2);
    assert_eq!(gauges.duplicates, 1);
    assert_eq!(gauges.max, 2);

    pool.shutdown(Duration::from_secs(1)).await;
    assert!(matches!(pool.acquire().await, Err(CacheError::ShuttingDown(_))));
}
