//! OS signal handling.
//!
//! Ctrl-C while a transfer is waiting for confirmations triggers the shared
//! [`Shutdown`], so the wait ends with an `Interrupted` error instead of the
//! process being killed mid-log.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;

/// Spawn a task that triggers `shutdown` on the first Ctrl-C.
pub fn spawn_ctrl_c_listener(shutdown: Arc<Shutdown>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                shutdown.trigger();
            }
            Err(e) => tracing::error!(error = %e, "Failed to install Ctrl+C handler"),
        }
    })
}
