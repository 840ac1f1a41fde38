//! In-process key-value and log service
//!
//! Speaks the same [`Connector`](layercache_core::transport::Connector)
//! contract as the Redis adapter, so the whole cache (pools, remote stores,
//! consumer groups, cross-node invalidation) runs without an external
//! server. Endpoints live in a [`LoopbackNetwork`]; every connector built
//! from one network sees the same servers.
//!
//! Streams follow Redis stream semantics closely enough for the cache:
//! ids are `<millis>-<seq>`, groups start at new entries only, delivered
//! entries stay pending until acknowledged and can be claimed by another
//! consumer once idle. Trimming is exact rather than approximate.

mod connection;
mod log;
mod server;

use serde::Serialize;

pub use connection::{LoopbackConnection, LoopbackConnector, LoopbackNetwork};
pub use server::LoopbackServer;

/// Point-in-time counters of one [`LoopbackServer`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopbackStats {
    pub keys: usize,
    pub streams: usize,
    /// Connection attempts, refused ones included
    pub connects: u64,
    pub evictions: u64,
}
