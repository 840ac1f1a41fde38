//! Common error types and classification utilities
//!
//! The error handling system is built on three pieces:
//!
//! 1. **`CommonError`**: error patterns that appear in more than one crate
//!    (configuration, serialization, timeouts and backend failures).
//! 2. **`ErrorClassification`**: a standard interface for classifying errors
//!    by retryability and severity. Retry loops and consumer loops consult it
//!    instead of matching on concrete variants.
//! 3. **`ErrorSeverity`**: one severity scale for logging decisions.
//!
//! Crate-specific errors compose with `CommonError` rather than duplicating
//! its variants:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum StoreError {
//!     #[error("shard {0} unreachable")]
//!     Shard(usize),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//! ```
//!
//! ## ErrorSeverity Levels
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Expected conditions | Cache miss, empty stream read |
//! | **Warning** | Degraded but operational | Rollback delete failed, transient backend failure |
//! | **Error** | Failure requiring attention | Commit failure, exhausted reconnects |
//! | **Critical** | System integrity at risk | Internal invariant violations |

use std::fmt;
use std::time::Duration;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Common error variants that appear across multiple crates
#[derive(Debug, Clone)]
pub enum CommonError {
    /// Configuration-related errors
    Config { message: String },

    /// Serialization or deserialization errors
    Serialization { message: String },

    /// Timeout errors
    Timeout { operation: String, duration: Duration },

    /// Network or backend connectivity errors
    Backend { service: String, message: String, is_retryable: bool },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message } => write!(f, "Configuration error: {}", message),
            Self::Serialization { message } => write!(f, "Serialization error: {}", message),
            Self::Timeout { operation, duration } => {
                write!(f, "Operation '{}' timed out after {:?}", operation, duration)
            }
            Self::Backend { service, message, .. } => {
                write!(f, "Backend error from '{}': {}", service, message)
            }
        }
    }
}

impl std::error::Error for CommonError {}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Backend { is_retryable, .. } => *is_retryable,
            Self::Config { .. } | Self::Serialization { .. } => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Backend { is_retryable: true, .. } => ErrorSeverity::Warning,
            Self::Backend { .. } | Self::Config { .. } | Self::Serialization { .. } => {
                ErrorSeverity::Error
            }
        }
    }

    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl CommonError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    /// Create a backend error
    pub fn backend<S: Into<String>, M: Into<String>>(
        service: S,
        message: M,
        is_retryable: bool,
    ) -> Self {
        Self::Backend { service: service.into(), message: message.into(), is_retryable }
    }
}

/// Error classification trait for consistent error handling across crates
///
/// Pools decide whether to keep reconnecting, and consumer loops decide whether
/// to back off or stop, by asking the error rather than matching on variants.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient: refused connections, timeouts,
    /// temporarily unavailable backends.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization { message: format!("JSON: {err}") }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for error classification.
    use super::*;

    /// Validates `CommonError::backend` behavior for the retryable backend
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures a retryable backend error reports `is_retryable()`.
    /// - Confirms its severity is `ErrorSeverity::Warning`.
    /// - Ensures a permanent backend error is not retryable.
    #[test]
    fn test_backend_error_classification() {
        let transient = CommonError::backend("remote", "connection refused", true);
        assert!(transient.is_retryable());
        assert_eq!(transient.severity(), ErrorSeverity::Warning);

        let permanent = CommonError::backend("remote", "auth failed", false);
        assert!(!permanent.is_retryable());
        assert_eq!(permanent.severity(), ErrorSeverity::Error);
    }

    /// Validates `CommonError::config` behavior for the display scenario.
    ///
    /// Assertions:
    /// - Confirms the rendered message carries the cause.
    /// - Ensures configuration errors are never retried.
    #[test]
    fn test_config_display() {
        let err = CommonError::config("max_attempts must be greater than 0");
        assert_eq!(err.to_string(), "Configuration error: max_attempts must be greater than 0");
        assert!(!err.is_retryable());
    }

    /// Validates `CommonError::timeout` behavior for the classification
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms timeouts are retryable warnings.
    #[test]
    fn test_timeout_classification() {
        let err = CommonError::timeout("replay", Duration::from_millis(250));
        assert!(err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
    }

    /// Validates `From<serde_json::Error>` behavior for the JSON conversion
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the converted error is a serialization error naming JSON.
    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<u32>("not-json").unwrap_err();
        let err: CommonError = json_err.into();

        assert!(matches!(err, CommonError::Serialization { ref message } if message.starts_with("JSON")));
    }

    /// Validates `ErrorSeverity` ordering.
    ///
    /// Assertions:
    /// - Ensures severities order from Info to Critical.
    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
    }
}
