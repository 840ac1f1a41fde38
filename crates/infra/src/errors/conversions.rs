//! Conversions from external infrastructure errors into domain errors.

use layercache_domain::CacheError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CacheError);

impl From<InfraError> for CacheError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CacheError> for InfraError {
    fn from(value: CacheError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoCacheError {
    fn into_cache_error(self) -> CacheError;
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → CacheError */
/* -------------------------------------------------------------------------- */

impl IntoCacheError for std::io::Error {
    fn into_cache_error(self) -> CacheError {
        CacheError::config(format!("failed to read config file: {self}"))
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(value.into_cache_error())
    }
}

/* -------------------------------------------------------------------------- */
/* toml / serde_json → CacheError */
/* -------------------------------------------------------------------------- */

impl IntoCacheError for toml::de::Error {
    fn into_cache_error(self) -> CacheError {
        CacheError::config(format!("invalid TOML format: {self}"))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(value.into_cache_error())
    }
}

impl IntoCacheError for serde_json::Error {
    fn into_cache_error(self) -> CacheError {
        CacheError::config(format!("invalid JSON format: {self}"))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(value.into_cache_error())
    }
}

/* -------------------------------------------------------------------------- */
/* redis::RedisError → CacheError */
/* -------------------------------------------------------------------------- */

#[cfg(feature = "redis")]
impl IntoCacheError for redis::RedisError {
    fn into_cache_error(self) -> CacheError {
        use redis::ErrorKind;

        if self.is_connection_refusal() {
            return CacheError::backend_unavailable(format!("redis refused connection: {self}"));
        }
        if self.is_timeout() {
            return CacheError::backend_unavailable(format!("redis command timed out: {self}"));
        }
        if self.is_io_error() || self.is_connection_dropped() {
            return CacheError::backend_unavailable(format!("redis connection lost: {self}"));
        }

        match (self.kind(), self.code()) {
            (_, Some("NOGROUP")) => CacheError::delivery(self.to_string()),
            (ErrorKind::TypeError, _) => {
                CacheError::serialization(format!("unexpected redis reply: {self}"))
            }
            (ErrorKind::InvalidClientConfig, _) => {
                CacheError::config(format!("invalid redis URL: {self}"))
            }
            (ErrorKind::AuthenticationFailed, _) => {
                CacheError::config(format!("redis authentication failed: {self}"))
            }
            _ => CacheError::backend_unavailable(format!("redis error: {self}")),
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for InfraError {
    fn from(value: redis::RedisError) -> Self {
        InfraError(value.into_cache_error())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_maps_to_config_error() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let mapped: CacheError = InfraError::from(err).into();
        match mapped {
            CacheError::Config(msg) => assert!(msg.contains("denied")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn json_error_maps_to_config_error() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let mapped: CacheError = InfraError::from(err).into();
        assert!(matches!(mapped, CacheError::Config(msg) if msg.contains("JSON")));
    }

    #[cfg(feature = "redis")]
    #[test]
    fn redis_nogroup_maps_to_delivery_error() {
        let reply = b"-NOGROUP No such key 'cache:events' or consumer group 'g'\r\n";
        let err = redis::parse_redis_value(reply).unwrap().extract_error().unwrap_err();
        assert_eq!(err.code(), Some("NOGROUP"));
        let mapped: CacheError = InfraError::from(err).into();
        assert!(matches!(mapped, CacheError::Delivery(_)), "got {mapped:?}");
    }

    #[cfg(feature = "redis")]
    #[test]
    fn redis_io_error_maps_to_backend_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let mapped: CacheError = InfraError::from(redis::RedisError::from(io)).into();
        assert!(matches!(mapped, CacheError::BackendUnavailable(_)), "got {mapped:?}");
    }
}
