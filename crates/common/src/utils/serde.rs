//! Duration encodings for configuration files and event payloads
//!
//! Durations are written as whole milliseconds so that TOML, JSON and
//! environment variables all carry the same plain integer.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// `Duration` as a `u64` millisecond count
///
/// ```rust
/// # #[cfg(feature = "foundation")]
/// # {
/// use std::time::Duration;
///
/// use layercache_common::duration_millis;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Pool {
///     #[serde(with = "duration_millis")]
///     idle_timeout: Duration,
/// }
/// # }
/// ```
pub mod duration_millis {
    use super::*;

    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// `Option<Duration>` as an optional `u64` millisecond count; `None` means
/// "no expiry" wherever it is used for a TTL.
pub mod option_duration_millis {
    use super::*;

    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        match duration {
            Some(duration) => serializer
                .serialize_some(&u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Timeouts {
        #[serde(with = "duration_millis")]
        connect: Duration,
        #[serde(with = "option_duration_millis", default)]
        ttl: Option<Duration>,
    }

    /// Validates `duration_millis` behavior for the JSON encoding scenario.
    ///
    /// Assertions:
    /// - Confirms durations are written as integer milliseconds.
    /// - Confirms `None` is written as `null`.
    #[test]
    fn test_duration_millis_serialize() {
        let data = Timeouts { connect: Duration::from_millis(1500), ttl: None };

        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, r#"{"connect":1500,"ttl":null}"#);
    }

    /// Validates `option_duration_millis` behavior for the missing field
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms an absent TTL decodes to `None`.
    /// - Confirms a present TTL decodes to milliseconds.
    #[test]
    fn test_option_duration_millis_deserialize() {
        let absent: Timeouts = serde_json::from_str(r#"{"connect":0}"#).unwrap();
        assert_eq!(absent.connect, Duration::ZERO);
        assert_eq!(absent.ttl, None);

        let present: Timeouts = serde_json::from_str(r#"{"connect":10,"ttl":60000}"#).unwrap();
        assert_eq!(present.ttl, Some(Duration::from_secs(60)));
    }

    /// Validates `duration_millis` behavior for the invalid input scenario.
    ///
    /// Assertions:
    /// - Ensures negative values are rejected.
    #[test]
    fn test_duration_millis_rejects_negative() {
        assert!(serde_json::from_str::<Timeouts>(r#"{"connect":-5}"#).is_err());
    }
}
