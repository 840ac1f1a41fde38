//! Value types shared by the cache, the pool and the event stream

pub mod connection;
pub mod entry;
pub mod invalidation;
pub mod stream;

pub use connection::ConnectionStatus;
pub use entry::CacheEntry;
pub use invalidation::{InvalidationEvent, InvalidationKind};
pub use stream::{EventId, ReplayFrom, StreamEvent};
