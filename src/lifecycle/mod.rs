//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT (Ctrl-C) → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → every subscribed confirmation wait returns Interrupted
//! ```
//!
//! # Design Decisions
//! - A transaction already broadcast is never cancelled; only waiting stops
//! - The binary exits non-zero when a wait is interrupted

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
