//! Metrics collection.
//!
//! # Metrics
//! - `sender_transactions_built_total` (counter): by chain
//! - `sender_transactions_broadcast_total` (counter): by chain, outcome
//! - `sender_signing_duration_seconds` (histogram): by chain
//! - `sender_retries_total` (counter): by operation
//! - `sender_confirmations_total` (counter): by chain, outcome
//!
//! Recording goes through the `metrics` facade; with no recorder installed
//! every call is a no-op.

use metrics::{counter, histogram};
use std::time::Instant;

pub fn record_built(chain: &'static str, started: Instant) {
    counter!("sender_transactions_built_total", "chain" => chain).increment(1);
    histogram!("sender_signing_duration_seconds", "chain" => chain)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_broadcast(chain: &'static str, success: bool) {
    let outcome = if success { "accepted" } else { "failed" };
    counter!("sender_transactions_broadcast_total", "chain" => chain, "outcome" => outcome)
        .increment(1);
}

pub fn record_retry(operation: &'static str) {
    counter!("sender_retries_total", "operation" => operation).increment(1);
}

pub fn record_confirmation(chain: &'static str, outcome: &'static str) {
    counter!("sender_confirmations_total", "chain" => chain, "outcome" => outcome).increment(1);
}
