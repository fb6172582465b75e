//! Interfaces between the orchestrator and chain backends.
//!
//! The builders never see these; the orchestrator gathers live inputs through
//! them, hands plain values to a builder, and passes the bytes back out.

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use serde::Serialize;

use crate::bitcoin::SpendableRef;
use crate::orchestrator::error::NetworkResult;

/// A spendable output as reported by a UTXO index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoEntry {
    pub reference: SpendableRef,
    /// Whether the creating transaction is in a block.
    pub confirmed: bool,
}

/// Transaction confirmation status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConfirmationStatus {
    /// Transaction is known but not yet in a block.
    Pending,
    /// Transaction has been mined but not enough confirmations.
    Confirming { current: u32, required: u32 },
    /// Transaction is confirmed with required block depth.
    Confirmed { block_number: u64 },
    /// Transaction failed or was dropped.
    Failed { reason: String },
}

impl ConfirmationStatus {
    /// Map a block depth onto a status.
    ///
    /// `tx_block` is `None` while the transaction is unmined. The block that
    /// includes the transaction counts as its first confirmation.
    pub fn from_depth(tx_block: Option<u64>, tip: u64, required: u32) -> Self {
        let Some(tx_block) = tx_block else {
            return ConfirmationStatus::Pending;
        };
        let current = tip.saturating_sub(tx_block).saturating_add(1);
        let current = u32::try_from(current).unwrap_or(u32::MAX);
        if current >= required {
            ConfirmationStatus::Confirmed {
                block_number: tx_block,
            }
        } else {
            ConfirmationStatus::Confirming { current, required }
        }
    }

    /// Whether polling can stop.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            ConfirmationStatus::Confirmed { .. } | ConfirmationStatus::Failed { .. }
        )
    }
}

/// Source of spendable outputs and balances on a UTXO chain.
#[async_trait]
pub trait UtxoSource: Send + Sync {
    /// Unspent outputs paying to `address`.
    async fn spendable(&self, address: &str) -> NetworkResult<Vec<UtxoEntry>>;

    /// Confirmed balance of `address` in satoshis.
    async fn confirmed_balance(&self, address: &str) -> NetworkResult<u64>;
}

/// Account state needed to build a transfer.
#[async_trait]
pub trait AccountStateSource: Send + Sync {
    /// Next nonce including pending transactions.
    async fn pending_nonce(&self, address: Address) -> NetworkResult<u64>;

    /// Suggested gas price in wei.
    async fn gas_price(&self) -> NetworkResult<u128>;

    async fn chain_id(&self) -> NetworkResult<u64>;

    /// Balance in wei.
    async fn balance(&self, address: Address) -> NetworkResult<U256>;

    /// Whether the node knows the transaction, pending or mined.
    async fn transaction_known(&self, hash: TxHash) -> NetworkResult<bool>;
}

/// Submits signed transactions.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Submit raw bytes; returns the id the network assigned.
    ///
    /// A node that already holds the identical transaction may answer with a
    /// rejection; callers treat that as a successful submission.
    async fn broadcast(&self, raw: &[u8]) -> NetworkResult<String>;
}

/// Reports how deeply a transaction is buried.
#[async_trait]
pub trait ConfirmationSource: Send + Sync {
    async fn status(&self, txid: &str, required: u32) -> NetworkResult<ConfirmationStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_depth() {
        assert_eq!(ConfirmationStatus::from_depth(None, 100, 1), ConfirmationStatus::Pending);
        assert_eq!(
            ConfirmationStatus::from_depth(Some(100), 100, 1),
            ConfirmationStatus::Confirmed { block_number: 100 }
        );
        assert_eq!(
            ConfirmationStatus::from_depth(Some(99), 100, 3),
            ConfirmationStatus::Confirming {
                current: 2,
                required: 3
            }
        );
    }

    #[test]
    fn test_tip_behind_block_counts_once() {
        // A lagging node may report a tip below the inclusion block.
        assert_eq!(
            ConfirmationStatus::from_depth(Some(101), 100, 2),
            ConfirmationStatus::Confirming {
                current: 1,
                required: 2
            }
        );
    }

    #[test]
    fn test_final_states() {
        assert!(!ConfirmationStatus::Pending.is_final());
        assert!(ConfirmationStatus::Confirmed { block_number: 9 }.is_final());
        assert!(ConfirmationStatus::Failed {
            reason: "reverted".to_string()
        }
        .is_final());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ConfirmationStatus::Confirming {
            current: 1,
            required: 3,
        })
        .unwrap();
        assert_eq!(json, r#"{"state":"confirming","current":1,"required":3}"#);
    }
}
