//! Specialized data structures
//!
//! - **[`lru`]**: recency-ordered map with single-victim eviction, the
//!   building block of the bounded cache store

pub mod lru;

pub use lru::LruCache;
