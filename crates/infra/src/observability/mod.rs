//! Observability: log initialisation and cache metrics
//!
//! - [`logging`]: installs the `tracing` subscriber (pretty or JSON) with an
//!   `EnvFilter` that honours `RUST_LOG`.
//! - [`metrics`]: [`CacheMonitor`], the in-process
//!   [`MetricsSink`](layercache_core::ports::MetricsSink).

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, service_span};
pub use metrics::{CacheMonitor, MonitorSnapshot};
