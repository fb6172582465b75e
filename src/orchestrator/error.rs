//! Orchestrator error definitions.

use std::time::Duration;
use thiserror::Error;

use crate::bitcoin::UtxoError;
use crate::config::loader::ConfigError;
use crate::ethereum::AccountError;

/// Failure talking to a chain backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// Connection refused, reset, DNS failure, 5xx or 429.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request exceeded its deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The backend understood the request and refused it.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// The backend answered with something we could not interpret.
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// No backend is configured for the operation.
    #[error("Not available: {0}")]
    NotAvailable(String),
}

impl NetworkError {
    /// Whether retrying the same request can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, NetworkError::Transport(_) | NetworkError::Timeout(_))
    }

    /// Whether a broadcast was refused because the nonce is already used.
    pub fn is_stale_nonce(&self) -> bool {
        match self {
            NetworkError::Rejected(reason) => {
                let reason = reason.to_ascii_lowercase();
                reason.contains("nonce too low")
                    || reason.contains("nonce is too low")
                    || reason.contains("invalid nonce")
            }
            _ => false,
        }
    }

    /// Whether a broadcast was refused because the node already holds the
    /// identical transaction, in its mempool or in a block.
    pub fn is_already_known(&self) -> bool {
        match self {
            NetworkError::Rejected(reason) => {
                let reason = reason.to_ascii_lowercase();
                [
                    "already known",
                    "alreadyknown",
                    "already imported",
                    "txn-already-in-mempool",
                    "txn-already-known",
                    "already in block chain",
                ]
                .iter()
                .any(|marker| reason.contains(marker))
            }
            _ => false,
        }
    }
}

/// Result type for collaborator calls.
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Errors surfaced by [`crate::orchestrator::Sender`].
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Utxo(#[from] UtxoError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A required setting is missing for the requested transfer.
    #[error("Missing setting: {0}")]
    MissingSetting(&'static str),

    /// No confirmed output holds enough value.
    #[error("No confirmed output of {address} covers {needed} sat")]
    NoSpendableOutput { address: String, needed: u64 },

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u128, max_gwei: u64 },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Transaction was not confirmed within expected time.
    #[error("Transaction {txid} not confirmed within {waited:?}")]
    ConfirmationTimeout { txid: String, waited: Duration },

    /// Confirmation polling was interrupted by shutdown.
    #[error("Interrupted while waiting for {0}")]
    Interrupted(String),
}

/// Result type for orchestrator operations.
pub type SendResult<T> = Result<T, SendError>;
