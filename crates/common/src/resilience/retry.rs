//! Retry executor with capped linear backoff
//!
//! Used by the connection pool to re-establish transport connections: every
//! failed attempt is logged at `warn` with the attempt number and the delay
//! before the next one, and the last underlying error is handed back once
//! the attempt budget is spent.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{CommonError, CommonResult, ErrorClassification};

/// Why a retried operation gave up
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All retry attempts have been exhausted
    #[error("All retry attempts exhausted after {attempts} tries: {source}")]
    AttemptsExhausted { attempts: u32, source: E },

    /// The operation failed with a non-retryable error
    #[error("Operation failed with non-retryable error: {source}")]
    NonRetryable { source: E },
}

impl<E> RetryError<E> {
    /// The last error produced by the operation
    pub fn into_source(self) -> E {
        match self {
            Self::AttemptsExhausted { source, .. } | Self::NonRetryable { source } => source,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Decide whether to retry after `error` on the given 0-based attempt
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Retry the operation after the configured backoff
    Retry,
    /// Retry the operation with a custom delay
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

/// Retry budget and backoff
///
/// The delay after the `n`th failed attempt (0-based) is
/// `min((n + 1) * step, cap)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    pub step: Duration,
    pub cap: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, step: Duration::from_millis(50), cap: Duration::from_secs(2) }
    }
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// Delay after the given 0-based failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt.saturating_add(1)).min(self.cap)
    }

    pub fn validate(&self) -> CommonResult<()> {
        if self.max_attempts == 0 {
            return Err(CommonError::config("max_attempts must be greater than 0"));
        }
        if self.step > self.cap {
            return Err(CommonError::config("backoff step must not exceed the cap"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn capped_backoff(mut self, step: Duration, cap: Duration) -> Self {
        self.config.step = step;
        self.config.cap = cap;
        self
    }

    pub fn build(self) -> CommonResult<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Runs an operation until it succeeds, the policy stops it, or the attempt
/// budget is spent
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
    label: String,
}

impl<P> RetryExecutor<P> {
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy, label: "operation".to_string() }
    }

    /// Name the operation in retry log lines
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 0;

        loop {
            let attempt_number = attempt + 1;
            debug!(
                operation = %self.label,
                "Executing attempt {}/{}", attempt_number, self.config.max_attempts
            );

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation = %self.label, "Succeeded after {} retries", attempt);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if attempt_number >= self.config.max_attempts {
                warn!(
                    operation = %self.label,
                    error = %error,
                    "All retry attempts exhausted after {} tries", attempt_number
                );
                return Err(RetryError::AttemptsExhausted { attempts: attempt_number, source: error });
            }

            let delay = match self.policy.should_retry(&error, attempt) {
                RetryDecision::Stop => {
                    debug!(operation = %self.label, error = %error, "Retry policy stopped retries");
                    return Err(RetryError::NonRetryable { source: error });
                }
                RetryDecision::Retry => self.config.delay_for(attempt),
                RetryDecision::RetryAfter(delay) => delay,
            };

            warn!(
                operation = %self.label,
                error = %error,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting attempt {}...", attempt_number
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

pub mod policies {
    use super::*;

    /// Retries on any error
    #[derive(Debug, Clone, Copy)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Retries errors that classify themselves as retryable, honouring any
    /// suggested delay.
    #[derive(Debug, Clone, Copy)]
    pub struct ClassifiedRetry;

    impl<E: ErrorClassification> RetryPolicy<E> for ClassifiedRetry {
        fn should_retry(&self, error: &E, _attempt: u32) -> RetryDecision {
            if !error.is_retryable() {
                return RetryDecision::Stop;
            }
            match error.retry_after() {
                Some(delay) => RetryDecision::RetryAfter(delay),
                None => RetryDecision::Retry,
            }
        }
    }
}
