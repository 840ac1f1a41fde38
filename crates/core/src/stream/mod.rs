//! Event stream over the remote append-only log
//!
//! [`EventStream`] wraps the log commands: publish, consumer groups,
//! acknowledgement and time-based replay. [`StreamConsumer`] runs the
//! group read loop as a cancellable background task.
//!
//! Delivery is at-least-once: an event that is not acknowledged stays
//! pending and is reclaimed by a consumer after `claim_idle`.

mod consumer;
mod event_stream;

pub use consumer::{
    consumer_name, node_group, ConsumerConfig, ConsumerStats, EventHandler, HandlerError,
    StreamConsumer,
};
pub use event_stream::EventStream;
