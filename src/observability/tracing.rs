//! Correlation spans.
//!
//! Each transfer gets a UUID v4 correlation id carried by a span, so every
//! log line emitted while building, broadcasting and confirming it can be
//! grouped afterwards.

use tracing::Span;
use uuid::Uuid;

/// Fresh correlation id for one transfer.
pub fn new_correlation_id() -> Uuid {
    Uuid::new_v4()
}

/// Span wrapping all work for one transfer.
pub fn transfer_span(chain: &'static str, correlation_id: &Uuid) -> Span {
    tracing::info_span!("transfer", chain, correlation_id = %correlation_id)
}
