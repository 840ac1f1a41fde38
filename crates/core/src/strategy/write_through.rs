//! Write-through writes with cache rollback

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use layercache_domain::{CacheError, CacheResult};
use serde::Serialize;
use tracing::{error, warn};

use crate::backend::CacheBackend;
use crate::codec;

pub struct WriteThrough {
    backend: Arc<dyn CacheBackend>,
}

impl WriteThrough {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Cache `value`, then commit it to the system of record
    ///
    /// When the commit fails the cached entry is deleted and the commit
    /// error is returned as `CommitFailure`. If that delete fails too the
    /// result is `RollbackFailed`, carrying both messages; the entry may then
    /// be stale until it expires or is invalidated.
    pub async fn write<T, R, F, Fut>(
        &self,
        key: &str,
        value: T,
        commit: F,
        ttl: Option<Duration>,
    ) -> CacheResult<R>
    where
        T: Serialize,
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = CacheResult<R>>,
    {
        self.backend.set(key, codec::encode(&value)?, ttl).await?;

        let commit_error = match commit(value).await {
            Ok(committed) => return Ok(committed),
            Err(err @ CacheError::CommitFailure { .. }) => err,
            Err(err) => CacheError::commit_failure(key, err.to_string()),
        };
        warn!(key, error = %commit_error, "commit failed, rolling back cached entry");

        match self.backend.delete(key).await {
            Ok(()) => Err(commit_error),
            Err(rollback_error) => {
                error!(key, error = %rollback_error, "rollback failed, cached entry may be stale");
                Err(CacheError::RollbackFailed {
                    key: key.to_string(),
                    commit_error: commit_error.to_string(),
                    rollback_error: rollback_error.to_string(),
                })
            }
        }
    }
}
