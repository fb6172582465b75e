//! Build, sign and broadcast single-transfer transactions on a UTXO chain
//! and an account chain.

// Transaction builders (pure)
pub mod bitcoin;
pub mod ethereum;

// Orchestration around the builders
pub mod keygen;
pub mod orchestrator;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::SenderConfig;
pub use lifecycle::Shutdown;
pub use orchestrator::{SendError, Sender};
