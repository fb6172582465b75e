//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! orchestrator + clients produce:
//!     → logging.rs (structured log events on stderr)
//!     → metrics.rs (counters, histograms via the `metrics` facade)
//!     → tracing.rs (per-transfer spans with correlation IDs)
//! ```
//!
//! # Design Decisions
//! - Nothing here is touched by the builders
//! - No metrics exporter is installed; embedders may add their own recorder

pub mod logging;
pub mod metrics;
pub mod tracing;
