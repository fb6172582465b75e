//! Retry logic.
//!
//! # Responsibilities
//! - Retry collaborator calls that failed transiently
//! - Space attempts with exponential backoff + jitter
//!
//! # Design Decisions
//! - Only `NetworkError::is_transient` failures are retried
//! - Rejections and builder errors are terminal
//! - Broadcasts are retried with identical bytes; a node that already holds
//!   them answers "already known", which the broadcasters accept as success

use std::future::Future;

use crate::config::schema::RetryConfig;
use crate::observability::metrics;
use crate::orchestrator::error::NetworkResult;
use crate::resilience::backoff::Backoff;

/// Run `f` until it succeeds, fails terminally, or the retry budget is spent.
pub async fn retry<T, F, Fut>(config: &RetryConfig, operation: &'static str, mut f: F) -> NetworkResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = NetworkResult<T>>,
{
    let max_retries = if config.enabled { config.max_attempts } else { 0 };
    let mut backoff = Backoff::new(config.base_delay_ms, config.max_delay_ms);

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && backoff.attempts() < max_retries => {
                let delay = backoff.next_delay();
                tracing::warn!(
                    operation,
                    attempt = backoff.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying"
                );
                metrics::record_retry(operation);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
