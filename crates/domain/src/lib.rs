//! # layercache domain
//!
//! Domain types for the layered cache.
//!
//! This crate contains:
//! - The configuration model ([`CacheSettings`]) and its validation
//! - The error taxonomy ([`CacheError`]) and [`CacheResult`]
//! - Stream, invalidation and cache entry value types
//! - Domain constants
//!
//! ## Architecture
//! - Pure data and validation, no I/O
//! - Depends only on the foundation tier of `layercache-common`

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
