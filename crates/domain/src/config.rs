//! Configuration model
//!
//! Every section deserializes with defaults, so a partial TOML/JSON file or
//! a handful of environment variables is enough to produce a full
//! [`CacheSettings`]. Call [`CacheSettings::validate`] before constructing
//! anything from it.

use std::time::Duration;

use layercache_common::{duration_millis, option_duration_millis};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::*;
use crate::errors::{CacheError, CacheResult};

/// Which substrate holds cached values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Unbounded in-process map
    #[default]
    Memory,
    /// Pooled remote key-value service
    Remote,
    /// Capacity-bounded LRU store, local or remote depending on `durable`
    Bounded,
}

crate::impl_domain_status_conversions!(BackendKind {
    Memory => "memory",
    Remote => "remote",
    Bounded => "bounded",
});

/// How the coordinator commits updates to the system of record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    /// Commit before returning; roll the cache back on failure
    #[default]
    Through,
    /// Queue the commit and return immediately
    Behind,
}

crate::impl_domain_status_conversions!(WritePolicy {
    Through => "through",
    Behind => "behind",
});

/// Top-level cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: BackendKind,
    pub compression: bool,
    pub compression_level: u32,
    pub partitioning: bool,
    /// Shard endpoints for remote backends; for local backends only the
    /// number of entries matters
    pub shards: Vec<String>,
    pub bounded: BoundedSettings,
    pub pool: PoolSettings,
    pub stream: StreamSettings,
    pub remote_url: String,
    /// Identifies this node as the origin of published invalidations
    pub node_id: String,
    pub write_policy: WritePolicy,
    #[serde(with = "option_duration_millis", rename = "default_ttl_ms")]
    pub default_ttl: Option<Duration>,
    pub logging: LoggingSettings,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            compression: false,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            partitioning: false,
            shards: Vec::new(),
            bounded: BoundedSettings::default(),
            pool: PoolSettings::default(),
            stream: StreamSettings::default(),
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            node_id: Uuid::new_v4().to_string(),
            write_policy: WritePolicy::default(),
            default_ttl: None,
            logging: LoggingSettings::default(),
        }
    }
}

impl CacheSettings {
    /// Whether values live in the remote service
    pub fn uses_remote(&self) -> bool {
        match self.backend {
            BackendKind::Remote => true,
            BackendKind::Bounded => self.bounded.durable,
            BackendKind::Memory => false,
        }
    }

    /// Endpoints to open one pool per; the shard list when partitioning,
    /// otherwise the single remote URL.
    pub fn remote_endpoints(&self) -> Vec<String> {
        if self.partitioning {
            self.shards.clone()
        } else {
            vec![self.remote_url.clone()]
        }
    }

    /// Number of backend shards the layer chain is built with
    pub fn shard_count(&self) -> usize {
        if self.partitioning {
            self.shards.len()
        } else {
            1
        }
    }

    /// Fail fast on options no component could run with
    pub fn validate(&self) -> CacheResult<()> {
        if self.bounded.capacity == 0 {
            return Err(CacheError::config("bounded.capacity must be greater than 0"));
        }
        if self.compression_level > 9 {
            return Err(CacheError::config(format!(
                "compression_level must be between 0 and 9, got {}",
                self.compression_level
            )));
        }
        if self.partitioning && self.shards.is_empty() {
            return Err(CacheError::config("partitioning requires at least one shard"));
        }
        if self.uses_remote() && !self.partitioning && self.remote_url.trim().is_empty() {
            return Err(CacheError::config("remote_url must be set for remote backends"));
        }
        if self.uses_remote() && self.shards.iter().any(|shard| shard.trim().is_empty()) {
            return Err(CacheError::config("shard endpoints must not be empty"));
        }
        if self.node_id.trim().is_empty() {
            return Err(CacheError::config("node_id must not be empty"));
        }
        self.pool.validate()?;
        self.stream.validate()
    }
}

/// Options for the bounded backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundedSettings {
    pub capacity: usize,
    /// Remote-backed eviction instead of the in-process store
    pub durable: bool,
}

impl Default for BoundedSettings {
    fn default() -> Self {
        Self { capacity: DEFAULT_BOUNDED_CAPACITY, durable: false }
    }
}

/// Connection pool options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Connections opened by warm-up
    pub min: usize,
    pub max: usize,
    /// Connect attempts before giving up with `BackendUnavailable`
    pub connect_attempts: u32,
    #[serde(with = "duration_millis", rename = "retry_base_ms")]
    pub retry_base: Duration,
    #[serde(with = "duration_millis", rename = "retry_cap_ms")]
    pub retry_cap: Duration,
    #[serde(with = "duration_millis", rename = "shutdown_timeout_ms")]
    pub shutdown_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min: DEFAULT_POOL_MIN,
            max: DEFAULT_POOL_MAX,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            retry_base: Duration::from_millis(DEFAULT_RETRY_BASE_MS),
            retry_cap: Duration::from_millis(DEFAULT_RETRY_CAP_MS),
            shutdown_timeout: Duration::from_millis(DEFAULT_POOL_SHUTDOWN_TIMEOUT_MS),
        }
    }
}

impl PoolSettings {
    pub fn validate(&self) -> CacheResult<()> {
        if self.max == 0 {
            return Err(CacheError::config("pool.max must be greater than 0"));
        }
        if self.min > self.max {
            return Err(CacheError::config(format!(
                "pool.min ({}) must not exceed pool.max ({})",
                self.min, self.max
            )));
        }
        if self.connect_attempts == 0 {
            return Err(CacheError::config("pool.connect_attempts must be greater than 0"));
        }
        if self.retry_base > self.retry_cap {
            return Err(CacheError::config("pool.retry_base_ms must not exceed pool.retry_cap_ms"));
        }
        Ok(())
    }
}

/// Event stream options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    pub stream_key: String,
    /// Group name; a coordinator reads through `{consumer_group}-{node_id}`
    pub consumer_group: String,
    /// Approximate retained length of the log
    pub max_length: usize,
    #[serde(with = "duration_millis", rename = "block_timeout_ms")]
    pub block_timeout: Duration,
    /// Pending entries idle this long are reclaimed by the next consumer
    #[serde(with = "duration_millis", rename = "claim_idle_ms")]
    pub claim_idle: Duration,
    #[serde(with = "duration_millis", rename = "error_backoff_ms")]
    pub error_backoff: Duration,
    #[serde(with = "duration_millis", rename = "replay_timeout_ms")]
    pub replay_timeout: Duration,
    #[serde(with = "duration_millis", rename = "join_timeout_ms")]
    pub join_timeout: Duration,
    /// Replay the retained log before joining the group
    pub catch_up_on_start: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            stream_key: DEFAULT_STREAM_KEY.to_string(),
            consumer_group: DEFAULT_CONSUMER_GROUP.to_string(),
            max_length: DEFAULT_MAX_STREAM_LENGTH,
            block_timeout: Duration::from_millis(DEFAULT_BLOCK_TIMEOUT_MS),
            claim_idle: Duration::from_millis(DEFAULT_CLAIM_IDLE_MS),
            error_backoff: Duration::from_millis(DEFAULT_ERROR_BACKOFF_MS),
            replay_timeout: Duration::from_millis(DEFAULT_REPLAY_TIMEOUT_MS),
            join_timeout: Duration::from_millis(DEFAULT_CONSUMER_JOIN_TIMEOUT_MS),
            catch_up_on_start: false,
        }
    }
}

impl StreamSettings {
    pub fn validate(&self) -> CacheResult<()> {
        if self.stream_key.trim().is_empty() {
            return Err(CacheError::config("stream.stream_key must not be empty"));
        }
        if self.consumer_group.trim().is_empty() {
            return Err(CacheError::config("stream.consumer_group must not be empty"));
        }
        if self.max_length == 0 {
            return Err(CacheError::config("stream.max_length must be greater than 0"));
        }
        Ok(())
    }
}

/// Log output options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// One JSON object per line instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates `CacheSettings::default` for the out-of-the-box scenario.
    ///
    /// Assertions:
    /// - Confirms the defaults pass validation.
    /// - Confirms pool and stream defaults.
    /// - Confirms each default gets a distinct node id.
    #[test]
    fn test_defaults_are_valid() {
        let settings = CacheSettings::default();
        settings.validate().unwrap();

        assert_eq!(settings.pool.min, 2);
        assert_eq!(settings.pool.max, 10);
        assert_eq!(settings.pool.retry_base, Duration::from_millis(50));
        assert_eq!(settings.pool.retry_cap, Duration::from_millis(2000));
        assert_eq!(settings.stream.stream_key, "newsStream");
        assert_eq!(settings.stream.consumer_group, "newsConsumers");
        assert_eq!(settings.stream.max_length, 1000);
        assert_ne!(settings.node_id, CacheSettings::default().node_id);
    }

    /// Validates `CacheSettings::validate` for the zero capacity scenario.
    ///
    /// Assertions:
    /// - Ensures capacity 0 is a configuration error.
    #[test]
    fn test_zero_capacity_rejected() {
        let mut settings = CacheSettings::default();
        settings.backend = BackendKind::Bounded;
        settings.bounded.capacity = 0;

        let err = settings.validate().unwrap_err();
        assert!(matches!(err, CacheError::Config(ref message) if message.contains("capacity")));
    }

    /// Validates `CacheSettings::validate` for the inconsistent pool and
    /// stream scenario.
    ///
    /// Assertions:
    /// - Ensures `pool.min > pool.max` is rejected.
    /// - Ensures a retry base above the retry cap is rejected.
    /// - Ensures an empty consumer group is rejected.
    /// - Ensures partitioning without shards is rejected.
    #[test]
    fn test_inconsistent_sections_rejected() {
        let mut settings = CacheSettings::default();
        settings.pool.min = 11;
        assert!(settings.validate().is_err());

        let mut settings = CacheSettings::default();
        settings.pool.retry_base = Duration::from_secs(5);
        assert!(settings.validate().is_err());

        let mut settings = CacheSettings::default();
        settings.stream.consumer_group = " ".to_string();
        assert!(settings.validate().is_err());

        let mut settings = CacheSettings::default();
        settings.partitioning = true;
        assert!(settings.validate().is_err());
    }

    /// Validates `CacheSettings` deserialization for the partial TOML-like
    /// JSON scenario.
    ///
    /// Assertions:
    /// - Confirms omitted fields fall back to defaults.
    /// - Confirms millisecond fields become durations.
    /// - Confirms enum values parse from lowercase strings.
    #[test]
    fn test_partial_document_uses_defaults() {
        let settings: CacheSettings = serde_json::from_str(
            r#"{
                "backend": "bounded",
                "bounded": { "capacity": 2, "durable": true },
                "write_policy": "behind",
                "default_ttl_ms": 60000,
                "stream": { "block_timeout_ms": 250 }
            }"#,
        )
        .unwrap();

        assert_eq!(settings.backend, BackendKind::Bounded);
        assert!(settings.uses_remote());
        assert_eq!(settings.write_policy, WritePolicy::Behind);
        assert_eq!(settings.default_ttl, Some(Duration::from_secs(60)));
        assert_eq!(settings.stream.block_timeout, Duration::from_millis(250));
        assert_eq!(settings.stream.stream_key, "newsStream");
        assert_eq!(settings.remote_endpoints(), vec![DEFAULT_REMOTE_URL.to_string()]);
        settings.validate().unwrap();
    }

    /// Validates `BackendKind` parsing for the environment variable scenario.
    ///
    /// Assertions:
    /// - Confirms values parse case-insensitively.
    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("Remote".parse::<BackendKind>().unwrap(), BackendKind::Remote);
        assert_eq!("BEHIND".parse::<WritePolicy>().unwrap(), WritePolicy::Behind);
        assert!("disk".parse::<BackendKind>().is_err());
    }
}
