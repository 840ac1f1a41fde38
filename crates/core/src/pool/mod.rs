//! Connection pool for one remote endpoint
//!
//! Connections are opened lazily up to `max` and then shared round-robin;
//! commands on the remote service are multiplexed, so a pooled connection is
//! never checked out exclusively. Blocking stream reads use a duplicate
//! connection instead (see [`ConnectionPool::acquire_duplicate`]).

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::Serialize;

mod service;

pub use service::ConnectionPool;

/// Shared handle to a pooled connection
pub struct PooledConnection<T> {
    id: u64,
    conn: Arc<T>,
}

impl<T> PooledConnection<T> {
    pub(crate) fn new(id: u64, conn: T) -> Self {
        Self { id, conn: Arc::new(conn) }
    }

    /// Pool-local identifier, stable for the connection's lifetime
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Clone for PooledConnection<T> {
    fn clone(&self) -> Self {
        Self { id: self.id, conn: Arc::clone(&self.conn) }
    }
}

impl<T> Deref for PooledConnection<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.conn
    }
}

impl<T> fmt::Debug for PooledConnection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection").field("id", &self.id).finish()
    }
}

/// Point-in-time pool gauges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Shared connections currently held
    pub total: usize,
    /// Shared connections reporting ready
    pub ready: usize,
    /// Dedicated duplicates handed out for blocking reads
    pub duplicates: usize,
    /// Upper bound on shared connections
    pub max: usize,
    /// Slots reserved by connects still in flight
    pub reserved: usize,
}
