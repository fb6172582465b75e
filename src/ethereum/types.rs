//! Account-chain types and error definitions.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::Serialize;
use thiserror::Error;

/// Gas consumed by a plain value transfer.
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Wei per gwei.
pub const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors produced while building or signing an account-chain transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    /// Private key is not 32 bytes of hex or is out of range.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Destination is not a 20-byte hex address or fails its checksum.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// ECDSA signing failed.
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Raw bytes could not be produced or parsed.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
}

/// Result type for account-chain builder operations.
pub type AccountResult<T> = Result<T, AccountError>;

/// Inputs of a single legacy transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountTxRequest {
    /// Destination, `0x` followed by 40 hex digits.
    pub to: String,
    /// Amount in wei.
    pub value: U256,
    pub nonce: u64,
    pub gas_limit: u64,
    /// Gas price in wei.
    pub gas_price: u128,
    pub chain_id: u64,
    /// Call data; empty for plain transfers.
    pub input: Bytes,
}

impl AccountTxRequest {
    /// A plain value transfer with the standard gas limit.
    pub fn transfer(to: impl Into<String>, value: U256, nonce: u64, gas_price: u128, chain_id: u64) -> Self {
        Self {
            to: to.into(),
            value,
            nonce,
            gas_limit: TRANSFER_GAS_LIMIT,
            gas_price,
            chain_id,
            input: Bytes::new(),
        }
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_input(mut self, input: Bytes) -> Self {
        self.input = input;
        self
    }
}

/// A signed legacy transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedAccountTx {
    /// RLP-encoded signed transaction.
    pub raw: Bytes,
    /// Keccak-256 of `raw`.
    pub hash: B256,
    /// Address of the signing key.
    pub from: Address,
    pub nonce: u64,
    pub chain_id: u64,
    /// `chain_id * 2 + 35 + y_parity`.
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

impl SignedAccountTx {
    /// `0x`-prefixed hex of the raw transaction.
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }
}
