//! Transfer orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! SenderConfig ──▶ sender.rs (BitcoinTransfer / EthereumTransfer)
//!                    → collaborators.rs traits (UTXOs, nonce, gas price)
//!                    → bitcoin::builder / ethereum::builder (pure)
//!                    → Broadcaster
//!                    → confirm.rs (poll ConfirmationSource until final)
//!                    → TransferReport
//! ```
//!
//! # Design Decisions
//! - Backends are trait objects so tests can substitute in-memory fakes
//! - Network calls go through `resilience` (timeouts, retries)
//! - Confirmation waits stop on shutdown

pub mod collaborators;
pub mod confirm;
pub mod error;
pub mod sender;

pub use collaborators::{
    AccountStateSource, Broadcaster, ConfirmationSource, ConfirmationStatus, UtxoEntry, UtxoSource,
};
pub use error::{NetworkError, NetworkResult, SendError, SendResult};
pub use sender::{
    BalanceEntry, BitcoinBackend, BitcoinTransfer, EthereumBackend, EthereumTransfer, Sender,
    TransferReport,
};
