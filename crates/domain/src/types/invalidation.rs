//! Invalidation notifications carried on the event stream

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{CacheError, CacheResult};

/// What happened to the key on the publishing node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidationKind {
    /// The value was written; remote copies are stale
    Update,
    /// The value was deleted
    Delete,
    /// The whole cache was cleared
    Clear,
}

crate::impl_domain_status_conversions!(InvalidationKind {
    Update => "update",
    Delete => "delete",
    Clear => "clear",
});

/// Payload published after a local write so other nodes drop stale copies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationEvent {
    /// Node id of the publisher
    pub origin: String,
    /// Affected key; `None` for [`InvalidationKind::Clear`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub kind: InvalidationKind,
    pub published_at: DateTime<Utc>,
}

impl InvalidationEvent {
    pub fn update(origin: impl Into<String>, key: impl Into<String>) -> Self {
        Self::keyed(origin, key, InvalidationKind::Update)
    }

    pub fn delete(origin: impl Into<String>, key: impl Into<String>) -> Self {
        Self::keyed(origin, key, InvalidationKind::Delete)
    }

    pub fn clear(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            key: None,
            kind: InvalidationKind::Clear,
            published_at: Utc::now(),
        }
    }

    fn keyed(origin: impl Into<String>, key: impl Into<String>, kind: InvalidationKind) -> Self {
        Self { origin: origin.into(), key: Some(key.into()), kind, published_at: Utc::now() }
    }

    /// Encode as the JSON stream payload
    pub fn to_payload(&self) -> CacheResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a JSON stream payload
    pub fn from_payload(payload: &[u8]) -> CacheResult<Self> {
        let event: Self = serde_json::from_slice(payload)?;
        if event.kind != InvalidationKind::Clear && event.key.is_none() {
            return Err(CacheError::serialization(format!(
                "{} invalidation without a key",
                event.kind
            )));
        }
        Ok(event)
    }
}
