//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Collaborator call:
//!     → timeouts.rs (enforce per-request deadline)
//!     → On transient failure: retries.rs (retry with backoff.rs delays)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Builders are pure and never wrapped; only network calls are retried

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::retry;
pub use timeouts::with_timeout;
