//! Bounded retry for optimistic-concurrency conflicts.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::types::{MintError, Result};

/// How often and how patiently to retry a conflicting update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Base backoff delay (ms), multiplied by the attempt number
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        }
    }
}

/// Run `op`, retrying only on [`MintError::ConcurrentUpdateConflict`].
///
/// Every other outcome is returned as-is on first sight. Once retries are
/// exhausted the conflict surfaces with the total attempt count.
pub async fn retry_on_conflict<T, F, Fut>(policy: RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0usize;
    loop {
        match op().await {
            Err(e) if e.is_retryable() => {
                if attempt >= policy.max_retries {
                    warn!(operation, attempts = attempt + 1, "Giving up after concurrent update conflicts");
                    return Err(MintError::ConcurrentUpdateConflict {
                        attempts: attempt + 1,
                    });
                }
                attempt += 1;
                debug!(operation, attempt, "Retrying after concurrent update conflict");
                tokio::time::sleep(Duration::from_millis(
                    policy.retry_delay_ms.saturating_mul(attempt as u64),
                ))
                .await;
            }
            other => return other,
        }
    }
}
