//! UTXO-chain types and error definitions.

use bitcoin::{EcdsaSighashType, NetworkKind, ScriptBuf, Txid};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest amount of satoshis that can ever exist (21M BTC).
pub const MAX_MONEY: u64 = 21_000_000 * 100_000_000;

/// Errors produced while building or signing a UTXO transaction.
///
/// Every variant is terminal for the inputs that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UtxoError {
    /// Private key could not be decoded or does not belong to the network.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Destination address is malformed or not supported.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Spendable reference is malformed or cannot be spent by the key.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// The referenced output does not hold enough value.
    #[error("Insufficient funds: need {needed} sat, reference holds {available} sat")]
    InsufficientFunds { needed: u64, available: u64 },

    /// Signature hash or ECDSA signing failed.
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Transaction bytes could not be produced or parsed.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
}

/// Result type for UTXO operations.
pub type UtxoResult<T> = Result<T, UtxoError>;

/// Bitcoin network a key or address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Regtest,
}

impl Network {
    /// The matching rust-bitcoin network.
    pub fn to_bitcoin(self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }

    /// Base58 prefix family; testnet and regtest share one.
    pub fn kind(self) -> NetworkKind {
        NetworkKind::from(self.to_bitcoin())
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        };
        f.write_str(name)
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "bitcoin" | "main" => Ok(Network::Mainnet),
            "testnet" | "testnet3" | "test" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(format!("unknown network '{}'", other)),
        }
    }
}

/// Reference to a prior transaction output that the builder will spend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendableRef {
    /// Prior transaction id.
    pub txid: Txid,
    /// Output index inside the prior transaction.
    pub vout: u32,
    /// Locking script of the referenced output.
    pub script_pubkey: ScriptBuf,
    /// Value of the referenced output in satoshis.
    pub value: u64,
    /// Witness script for P2WSH outputs that are not single-key scripts.
    pub witness_script: Option<ScriptBuf>,
}

impl SpendableRef {
    /// Build a reference from its hex display form.
    pub fn from_hex(txid_hex: &str, vout: u32, script_hex: &str, value: u64) -> UtxoResult<Self> {
        let txid = txid_from_hex(txid_hex)?;
        let script_pubkey = ScriptBuf::from_hex(script_hex.trim()).map_err(|e| {
            UtxoError::InvalidReference(format!("locking script is not hex: {}", e))
        })?;

        let reference = Self {
            txid,
            vout,
            script_pubkey,
            value,
            witness_script: None,
        };
        reference.validate()?;
        Ok(reference)
    }

    /// Attach an explicit witness script.
    pub fn with_witness_script(mut self, witness_script: ScriptBuf) -> Self {
        self.witness_script = Some(witness_script);
        self
    }

    /// Transaction id in display (reversed) hex.
    pub fn txid_hex(&self) -> String {
        self.txid.to_string()
    }

    /// Structural checks that do not depend on the signing key.
    pub fn validate(&self) -> UtxoResult<()> {
        if self.script_pubkey.is_empty() {
            return Err(UtxoError::InvalidReference(
                "locking script is empty".to_string(),
            ));
        }
        if self.value > MAX_MONEY {
            return Err(UtxoError::InvalidReference(format!(
                "value {} exceeds the money supply",
                self.value
            )));
        }
        Ok(())
    }
}

/// Parse a display-order transaction id.
pub fn txid_from_hex(txid_hex: &str) -> UtxoResult<Txid> {
    Txid::from_str(txid_hex.trim())
        .map_err(|e| UtxoError::InvalidReference(format!("txid is not 32 bytes of hex: {}", e)))
}

/// Parse a sighash name such as `all` or `single|anyonecanpay`.
pub fn parse_sighash(name: &str) -> Result<EcdsaSighashType, String> {
    let lower = name.trim().to_ascii_lowercase();
    let sighash = match lower.as_str() {
        "all" => EcdsaSighashType::All,
        "none" => EcdsaSighashType::None,
        "single" => EcdsaSighashType::Single,
        "all|anyonecanpay" => EcdsaSighashType::AllPlusAnyoneCanPay,
        "none|anyonecanpay" => EcdsaSighashType::NonePlusAnyoneCanPay,
        "single|anyonecanpay" => EcdsaSighashType::SinglePlusAnyoneCanPay,
        other => return Err(format!("unknown sighash type '{}'", other)),
    };
    Ok(sighash)
}

/// Inverse of [`parse_sighash`].
pub fn sighash_name(sighash: EcdsaSighashType) -> &'static str {
    match sighash {
        EcdsaSighashType::All => "all",
        EcdsaSighashType::None => "none",
        EcdsaSighashType::Single => "single",
        EcdsaSighashType::AllPlusAnyoneCanPay => "all|anyonecanpay",
        EcdsaSighashType::NonePlusAnyoneCanPay => "none|anyonecanpay",
        EcdsaSighashType::SinglePlusAnyoneCanPay => "single|anyonecanpay",
    }
}

/// How the builder satisfied the referenced locking script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendPath {
    /// Pay-to-pubkey, signature in the scriptSig.
    LegacyP2pk,
    /// Pay-to-pubkey-hash, signature and key in the scriptSig.
    LegacyP2pkh,
    /// Native segwit v0 key hash, signature and key in the witness.
    WitnessP2wpkh,
    /// Segwit v0 key hash wrapped in P2SH; redeem script in the scriptSig.
    NestedP2wpkh,
    /// Native segwit v0 script hash, signature and witness script in the witness.
    WitnessP2wsh,
}

impl SpendPath {
    /// Whether this path signs with the BIP-143 digest.
    pub fn is_witness(self) -> bool {
        matches!(
            self,
            SpendPath::WitnessP2wpkh | SpendPath::NestedP2wpkh | SpendPath::WitnessP2wsh
        )
    }
}
