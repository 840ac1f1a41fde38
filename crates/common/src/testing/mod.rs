//! Test helpers for async components
//!
//! - [`async_utils`]: polling and timeout helpers for tests that wait on
//!   background tasks (write-behind drains, stream consumers).
//!
//! [`assert_eventually_async!`](crate::assert_eventually_async) is exported at
//! the crate root.

pub mod async_utils;

pub use async_utils::{poll_until, timeout_ok};
