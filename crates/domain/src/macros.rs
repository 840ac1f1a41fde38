//! Display/FromStr for the string-keyed enums of the configuration model
//!
//! Environment variables carry enum values as plain strings, so each such
//! enum gets a lowercase `Display` and a case-insensitive `FromStr`.
//!
//! # Example
//!
//! ```rust
//! use layercache_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Tier {
//!     Hot,
//!     Cold,
//! }
//!
//! impl_domain_status_conversions!(Tier {
//!     Hot => "hot",
//!     Cold => "cold",
//! });
//!
//! assert_eq!("HOT".parse::<Tier>().unwrap(), Tier::Hot);
//! assert_eq!(Tier::Cold.to_string(), "cold");
//! ```

/// Implements `Display` and case-insensitive `FromStr` for a fieldless enum
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
