//! Domain constants
//!
//! Defaults for the configuration model and fixed names shared between the
//! stream producer and consumers.

// Service identity
pub const SERVICE_NAME: &str = "cache-layer";
pub const ENV_PREFIX: &str = "LAYERCACHE_";

// Remote backend
pub const DEFAULT_REMOTE_URL: &str = "redis://127.0.0.1:6379";

// Bounded store
pub const DEFAULT_BOUNDED_CAPACITY: usize = 1000;

// Connection pool
pub const DEFAULT_POOL_MIN: usize = 2;
pub const DEFAULT_POOL_MAX: usize = 10;
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_BASE_MS: u64 = 50;
pub const DEFAULT_RETRY_CAP_MS: u64 = 2000;
pub const DEFAULT_POOL_SHUTDOWN_TIMEOUT_MS: u64 = 5000;

// Event stream
pub const DEFAULT_STREAM_KEY: &str = "newsStream";
pub const DEFAULT_CONSUMER_GROUP: &str = "newsConsumers";
pub const DEFAULT_MAX_STREAM_LENGTH: usize = 1000;
pub const DEFAULT_BLOCK_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_CLAIM_IDLE_MS: u64 = 30_000;
pub const DEFAULT_ERROR_BACKOFF_MS: u64 = 1000;
pub const DEFAULT_REPLAY_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_CONSUMER_JOIN_TIMEOUT_MS: u64 = 5000;
/// Field name that carries an event payload inside a stream entry
pub const STREAM_PAYLOAD_FIELD: &str = "message";

// Compression
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
