//! Lifecycle status and health reporting for long-running components
//!
//! Pools, stream consumers and the cache coordinator report their state via
//! [`ManagerStatus`] and their health via [`ManagerHealth`].

pub mod manager;

pub use manager::{ComponentHealth, ManagerHealth, ManagerStatus, StatusCell};
