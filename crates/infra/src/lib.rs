//! # LayerCache Infrastructure
//!
//! Adapters behind the transport traits of `layercache-core`.
//!
//! This crate contains:
//! - A Redis adapter (`redis` feature, on by default)
//! - An in-process loopback backend with fault injection
//! - Settings loading from the environment or TOML/JSON files
//! - `tracing` subscriber setup and an in-process metrics sink
//!
//! ## Architecture
//! - Implements traits defined in `layercache-core`
//! - Depends on `layercache-common`, `layercache-domain` and `layercache-core`
//! - Contains all "impure" code (sockets, files, global subscribers)

pub mod config;
pub mod errors;
pub mod loopback;
pub mod observability;
#[cfg(feature = "redis")]
pub mod redis_backend;

pub use config::{load, load_from_env, load_from_file, probe_config_paths};
pub use errors::InfraError;
pub use loopback::{LoopbackConnection, LoopbackConnector, LoopbackNetwork, LoopbackServer, LoopbackStats};
pub use observability::{init_logging, service_span, CacheMonitor, MonitorSnapshot};
#[cfg(feature = "redis")]
pub use redis_backend::{RedisConnection, RedisConnector};
