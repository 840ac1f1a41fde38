//! Serde helpers shared by configuration and wire types

pub mod serde;

pub use self::serde::{duration_millis, option_duration_millis};
