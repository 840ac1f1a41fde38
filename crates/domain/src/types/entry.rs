//! In-memory cache entries

use std::time::{Duration, Instant};

/// A cached value with an optional absolute expiry
///
/// Entries are owned by the store that holds them; an entry whose
/// `expires_at` has passed is treated as absent and removed on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub expires_at: Option<Instant>,
}

impl CacheEntry {
    /// Build an entry that expires `ttl` after `now`; `None` never expires.
    pub fn new(key: impl Into<String>, value: Vec<u8>, ttl: Option<Duration>, now: Instant) -> Self {
        Self { key: key.into(), value, expires_at: ttl.and_then(|ttl| now.checked_add(ttl)) }
    }

    /// Whether the entry has expired at `now`
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Time left before expiry at `now`
    pub fn remaining_ttl(&self, now: Instant) -> Option<Duration> {
        self.expires_at.map(|expires_at| expires_at.saturating_duration_since(now))
    }
}
