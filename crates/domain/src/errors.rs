//! Error types used throughout the cache

use std::time::Duration;

use layercache_common::{CommonError, CompressionError, ErrorClassification, ErrorSeverity};
use thiserror::Error;

/// Main error type for cache operations
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Invalid construction options; fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport or connection failure after the retry budget was spent
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Corrupt or incompatible cached bytes
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The system-of-record rejected a write
    #[error("Commit failed for key '{key}': {message}")]
    CommitFailure { key: String, message: String },

    /// A write-through rollback delete failed after the commit failed
    #[error(
        "Rollback of key '{key}' failed after commit failure ({commit_error}): {rollback_error}"
    )]
    RollbackFailed { key: String, commit_error: String, rollback_error: String },

    /// Stream consume, ack or publish failure
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// The read-through loader failed
    #[error("Loader failed for key '{key}': {message}")]
    Loader { key: String, message: String },

    /// A caller-supplied deadline elapsed
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    /// The component no longer accepts work
    #[error("{0} is shutting down")]
    ShuttingDown(String),

    /// Invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for cache operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;

impl CacheError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable(message.into())
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    pub fn commit_failure(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommitFailure { key: key.into(), message: message.into() }
    }

    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery(message.into())
    }

    pub fn loader(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Loader { key: key.into(), message: message.into() }
    }

    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    /// Whether this is a corrupt-payload error that readers treat as a miss
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization(_))
    }
}

impl ErrorClassification for CacheError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_) | Self::Delivery(_) | Self::Timeout { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Serialization(_) | Self::ShuttingDown(_) => ErrorSeverity::Info,
            Self::RollbackFailed { .. } | Self::Delivery(_) | Self::Timeout { .. } => {
                ErrorSeverity::Warning
            }
            Self::Config(_)
            | Self::BackendUnavailable(_)
            | Self::CommitFailure { .. }
            | Self::Loader { .. } => ErrorSeverity::Error,
            Self::Internal(_) => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<CompressionError> for CacheError {
    fn from(err: CompressionError) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<CommonError> for CacheError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::Config { .. } => Self::Config(err.to_string()),
            CommonError::Serialization { .. } => Self::Serialization(err.to_string()),
            CommonError::Timeout { operation, duration } => Self::Timeout { operation, duration },
            CommonError::Backend { .. } => Self::BackendUnavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates `ErrorClassification` for the rollback failure scenario.
    ///
    /// Assertions:
    /// - Confirms a failed rollback is surfaced at warning severity.
    /// - Ensures it is not retryable.
    /// - Confirms the message carries both underlying failures.
    #[test]
    fn test_rollback_failed_is_warning() {
        let err = CacheError::RollbackFailed {
            key: "article:1".to_string(),
            commit_error: "db down".to_string(),
            rollback_error: "cache down".to_string(),
        };

        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert!(!err.is_retryable());
        let message = err.to_string();
        assert!(message.contains("db down"));
        assert!(message.contains("cache down"));
    }

    /// Validates `ErrorClassification` for the transient transport scenario.
    ///
    /// Assertions:
    /// - Ensures backend, delivery and timeout errors are retryable.
    /// - Ensures configuration and commit errors are not.
    #[test]
    fn test_retryable_classification() {
        assert!(CacheError::backend_unavailable("refused").is_retryable());
        assert!(CacheError::delivery("xreadgroup failed").is_retryable());
        assert!(CacheError::timeout("replay", Duration::from_millis(5)).is_retryable());
        assert!(!CacheError::config("capacity").is_retryable());
        assert!(!CacheError::commit_failure("k", "constraint").is_retryable());
    }

    /// Validates `From<CommonError>` for the backend mapping scenario.
    ///
    /// Assertions:
    /// - Confirms a common backend error becomes `BackendUnavailable`.
    /// - Confirms a common timeout keeps its operation and duration.
    #[test]
    fn test_from_common_error() {
        let err: CacheError = CommonError::backend("remote", "refused", true).into();
        assert!(matches!(err, CacheError::BackendUnavailable(_)));

        let err: CacheError = CommonError::timeout("acquire", Duration::from_secs(1)).into();
        assert!(matches!(
            err,
            CacheError::Timeout { ref operation, duration } if operation == "acquire" && duration == Duration::from_secs(1)
        ));
    }

    /// Validates `From<serde_json::Error>` for the corrupt payload scenario.
    ///
    /// Assertions:
    /// - Confirms the conversion yields a serialization error.
    #[test]
    fn test_from_serde_json_error() {
        let err: CacheError = serde_json::from_slice::<u8>(b"{").unwrap_err().into();
        assert!(err.is_serialization());
        assert_eq!(err.severity(), ErrorSeverity::Info);
    }
}
