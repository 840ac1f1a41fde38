//! Applies remote invalidation events to the local backend

use std::sync::Arc;

use async_trait::async_trait;
use layercache_domain::{InvalidationEvent, InvalidationKind, StreamEvent};
use tracing::{debug, warn};

use crate::backend::CacheBackend;
use crate::stream::{EventHandler, HandlerError};

/// Drops keys written elsewhere from this node's cache
///
/// Events published by this node are skipped. Undecodable payloads are
/// logged and acknowledged so they are not redelivered forever. Backend
/// failures are transient: the event stays pending and is retried.
pub struct InvalidationHandler {
    backend: Arc<dyn CacheBackend>,
    node_id: String,
}

impl InvalidationHandler {
    pub fn new(backend: Arc<dyn CacheBackend>, node_id: impl Into<String>) -> Self {
        Self { backend, node_id: node_id.into() }
    }
}

#[async_trait]
impl EventHandler for InvalidationHandler {
    async fn handle(&self, event: &StreamEvent) -> Result<(), HandlerError> {
        let invalidation = match InvalidationEvent::from_payload(&event.payload) {
            Ok(invalidation) => invalidation,
            Err(err) => {
                warn!(id = %event.id, error = %err, "skipping undecodable invalidation event");
                return Ok(());
            }
        };
        if invalidation.origin == self.node_id {
            return Ok(());
        }

        let applied = match (invalidation.kind, invalidation.key.as_deref()) {
            (InvalidationKind::Clear, _) => self.backend.clear().await,
            (_, Some(key)) => self.backend.delete(key).await,
            (_, None) => Ok(()),
        };
        applied.map_err(|err| HandlerError::Transient(err.to_string()))?;

        debug!(
            id = %event.id,
            kind = %invalidation.kind,
            key = invalidation.key.as_deref().unwrap_or("*"),
            origin = %invalidation.origin,
            "applied remote invalidation"
        );
        Ok(())
    }
}
