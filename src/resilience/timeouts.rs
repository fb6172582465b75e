//! Timeout enforcement.
//!
//! Every collaborator call runs under a deadline; an elapsed deadline becomes
//! [`NetworkError::Timeout`], which the retry layer treats as transient.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::orchestrator::error::{NetworkError, NetworkResult};

/// Run `fut` with a deadline.
pub async fn with_timeout<T, F>(duration: Duration, fut: F) -> NetworkResult<T>
where
    F: Future<Output = NetworkResult<T>>,
{
    match timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(NetworkError::Timeout(duration)),
    }
}
