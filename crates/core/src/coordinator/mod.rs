//! Cache coordinator
//!
//! Ties the layer chain, the consistency strategies and the event stream
//! together. Every write on one node publishes an invalidation event; the
//! other nodes' consumers drop their copy of the key when it arrives.
//!
//! There are no process-wide singletons: each [`CacheCoordinator`] owns its
//! pools, queue, stream and consumer, and several can run side by side.

mod invalidation;
mod service;

pub use invalidation::InvalidationHandler;
pub use service::{CacheCoordinator, CoordinatorBuilder};
