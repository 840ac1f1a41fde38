//! Modular common utilities shared across layercache crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: errors, collections, compression, cache statistics, serde
//!   helpers
//! - `runtime`: async infrastructure (resilience, lifecycle, testing helpers)
//! - `test-utils`: everything in `runtime`, for downstream test suites

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod cache;
#[cfg(feature = "foundation")]
pub mod collections;
#[cfg(feature = "foundation")]
pub mod compression;
#[cfg(feature = "foundation")]
pub mod error;
#[cfg(feature = "foundation")]
pub mod utils;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod lifecycle;
#[cfg(feature = "runtime")]
pub mod resilience;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "runtime", feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use cache::{CacheStats, StatsRecorder};
#[cfg(feature = "foundation")]
pub use compression::{CompressionError, GzipCodec};
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use lifecycle::{ComponentHealth, ManagerHealth, ManagerStatus, StatusCell};
#[cfg(feature = "runtime")]
pub use resilience::{
    Clock, MockClock, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError, RetryExecutor,
    RetryPolicy, RetryResult, SystemClock,
};
#[cfg(feature = "foundation")]
pub use utils::serde::{duration_millis, option_duration_millis};
