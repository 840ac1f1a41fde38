//! Redis adapter
//!
//! Key-value commands map onto `GET`/`SET PX`/`DEL`/`FLUSHDB`; the event log
//! onto a Redis stream (`XADD MAXLEN ~`, `XGROUP CREATE $ MKSTREAM`,
//! `XREADGROUP`, `XPENDING` + `XCLAIM`, `XACK`, `XRANGE`). Each
//! [`RedisConnection`] owns one multiplexed tokio connection, so a blocking
//! `XREADGROUP` only stalls the duplicate it runs on.

mod connection;
mod reply;

pub use connection::{RedisConnection, RedisConnector};
