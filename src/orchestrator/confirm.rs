//! Confirmation monitoring.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::config::schema::ConfirmationConfig;
use crate::orchestrator::collaborators::{ConfirmationSource, ConfirmationStatus};
use crate::orchestrator::error::{SendError, SendResult};

/// Poll `source` until `txid` is final, the deadline passes, or shutdown fires.
///
/// Transient query failures are logged and polled through; any other query
/// error ends the wait. A `Failed` status is returned as a value.
pub async fn wait_for_confirmation(
    source: &dyn ConfirmationSource,
    txid: &str,
    required: u32,
    config: &ConfirmationConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> SendResult<ConfirmationStatus> {
    let timeout_duration = Duration::from_secs(config.timeout_secs);
    let poll_interval = Duration::from_secs(config.poll_interval_secs.max(1));

    let result = timeout(timeout_duration, async {
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => {
                    tracing::info!(txid, "Shutdown requested, abandoning confirmation wait");
                    return Err(SendError::Interrupted(txid.to_string()));
                }
            }

            let status = match source.status(txid, required).await {
                Ok(status) => status,
                Err(e) if e.is_transient() => {
                    tracing::warn!(txid, error = %e, "Confirmation query failed, will poll again");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if status.is_final() {
                return Ok(status);
            }

            match &status {
                ConfirmationStatus::Confirming { current, required } => tracing::debug!(
                    txid,
                    confirmations = current,
                    required = required,
                    "Waiting for confirmations"
                ),
                _ => tracing::debug!(txid, "Transaction pending"),
            }
        }
    })
    .await;

    match result {
        Ok(status) => status,
        Err(_) => Err(SendError::ConfirmationTimeout {
            txid: txid.to_string(),
            waited: timeout_duration,
        }),
    }
}
