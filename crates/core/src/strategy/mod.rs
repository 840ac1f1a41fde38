//! Consistency strategies over one shared backend
//!
//! - [`ReadThrough`]: cache-aside reads with a loader on miss
//! - [`WriteThrough`]: cache first, then the system of record, rolling the
//!   cache back when the commit fails
//! - [`WriteBehind`]: cache now, commit later from a single FIFO drain task
//!
//! None of them de-duplicate concurrent misses; two callers missing the same
//! key both run their loader.

use std::sync::Arc;

use crate::backend::CacheBackend;
use crate::ports::MetricsSink;

mod read_through;
mod write_behind;
mod write_through;

pub use read_through::ReadThrough;
pub use write_behind::{WriteBehind, WriteBehindStats, WriteQueueItem};
pub use write_through::WriteThrough;

/// The three strategies wired to the same backend
pub struct ConsistencyStrategy {
    backend: Arc<dyn CacheBackend>,
    read_through: ReadThrough,
    write_through: WriteThrough,
    write_behind: WriteBehind,
}

impl ConsistencyStrategy {
    pub fn new(backend: Arc<dyn CacheBackend>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            read_through: ReadThrough::new(Arc::clone(&backend), metrics),
            write_through: WriteThrough::new(Arc::clone(&backend)),
            write_behind: WriteBehind::new(Arc::clone(&backend)),
            backend,
        }
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    pub fn read_through(&self) -> &ReadThrough {
        &self.read_through
    }

    pub fn write_through(&self) -> &WriteThrough {
        &self.write_through
    }

    pub fn write_behind(&self) -> &WriteBehind {
        &self.write_behind
    }
}
