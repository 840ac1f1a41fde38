//! Resilience building blocks
//!
//! - [`retry`]: retry executor with capped linear backoff and retry policies.
//!   The connection pool uses it to re-establish transport connections.
//! - [`clock`]: time abstraction so expiry and timestamp logic can be driven
//!   by [`MockClock`] in tests.

pub mod clock;
pub mod retry;

pub use clock::{Clock, MockClock, SystemClock};
pub use retry::{
    policies, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError, RetryExecutor,
    RetryPolicy, RetryResult,
};
