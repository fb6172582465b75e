//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the sender.
//! All types derive Serde traits for deserialization from config files.

use bitcoin::EcdsaSighashType;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroize;

use crate::bitcoin::{parse_sighash, sighash_name, Network, SpendPath};
use crate::observability::logging::LogFormat;

/// Root configuration for the sender.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SenderConfig {
    /// UTXO-chain settings.
    pub bitcoin: BitcoinConfig,

    /// Account-chain settings.
    pub ethereum: EthereumConfig,

    /// Retry configuration for network calls.
    pub retries: RetryConfig,

    /// Confirmation polling.
    pub confirmation: ConfirmationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// A secret string that never appears in `Debug` output or serialized config.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(<redacted>)")
        }
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Secret)
    }
}

impl Serialize for Secret {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("<redacted>")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// UTXO-chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BitcoinConfig {
    /// Enable UTXO-chain transfers.
    pub enabled: bool,

    /// Network the key and addresses belong to.
    pub network: Network,

    /// Esplora REST base URL.
    pub esplora_url: String,

    /// Failover Esplora base URLs.
    pub failover_urls: Vec<String>,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Wallet import format key. Overridden by `SENDER_BTC_WIF`.
    pub wif: Secret,

    /// Which key-derived locking script holds the funds.
    pub source: SpendPath,

    /// Destination address.
    pub destination: String,

    /// Amount to send in satoshis.
    pub amount_sat: u64,

    /// Declared sighash type, e.g. "all" or "single|anyonecanpay".
    #[serde(with = "sighash_serde")]
    pub sighash: EcdsaSighashType,

    /// Confirmations required before a transfer counts as final.
    pub confirmation_blocks: u32,

    /// Spend this output instead of querying the index.
    pub pinned_reference: Option<PinnedReference>,
}

impl Default for BitcoinConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            network: Network::Testnet,
            esplora_url: "https://blockstream.info/testnet/api".to_string(),
            failover_urls: vec!["https://mempool.space/testnet/api".to_string()],
            request_timeout_secs: 10,
            wif: Secret::default(),
            source: SpendPath::WitnessP2wpkh,
            destination: String::new(),
            amount_sat: 0,
            sighash: EcdsaSighashType::All,
            confirmation_blocks: 1,
            pinned_reference: None,
        }
    }
}

/// A prior output given directly in the config file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PinnedReference {
    /// Transaction id, display (reversed) hex.
    pub txid: String,
    pub vout: u32,
    /// Locking script hex.
    pub script_pubkey: String,
    /// Value in satoshis.
    pub value: u64,
    /// Witness script hex for non-default P2WSH outputs.
    #[serde(default)]
    pub witness_script: Option<String>,
}

/// Account-chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EthereumConfig {
    /// Enable account-chain transfers.
    pub enabled: bool,

    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Expected chain ID (e.g., 1 for mainnet, 11155111 for Sepolia).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Hex private key. Overridden by `SENDER_ETH_PRIVATE_KEY`.
    pub private_key: Secret,

    /// Destination address.
    pub destination: String,

    /// Amount to send in wei, decimal.
    pub amount_wei: String,

    /// Gas limit for the transfer.
    pub gas_limit: u64,

    /// Gas price multiplier (1.0 = suggested, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,

    /// Number of block confirmations required for finality.
    pub confirmation_blocks: u32,
}

impl Default for EthereumConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 11155111,
            rpc_timeout_secs: 10,
            private_key: Secret::default(),
            destination: String::new(),
            amount_wei: "1000000".to_string(),
            gas_limit: 21_000,
            gas_price_multiplier: 1.2,
            max_gas_price_gwei: 500,
            confirmation_blocks: 3,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of retry attempts after the first failure.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Confirmation polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Poll for confirmation after broadcasting.
    pub wait: bool,

    /// Seconds between polls.
    pub poll_interval_secs: u64,

    /// Give up after this many seconds.
    pub timeout_secs: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            wait: true,
            poll_interval_secs: 15,
            timeout_secs: 1800,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or an EnvFilter directive.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

mod sighash_serde {
    use super::*;

    pub fn serialize<S: Serializer>(sighash: &EcdsaSighashType, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(sighash_name(*sighash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EcdsaSighashType, D::Error> {
        let name = String::deserialize(deserializer)?;
        parse_sighash(&name).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: SenderConfig = toml::from_str("").unwrap();
        assert_eq!(config.bitcoin.network, Network::Testnet);
        assert_eq!(config.bitcoin.source, SpendPath::WitnessP2wpkh);
        assert_eq!(config.ethereum.gas_limit, 21_000);
        assert_eq!(config.retries.max_attempts, 3);
        assert!(config.confirmation.wait);
    }

    #[test]
    fn test_partial_sections() {
        let config: SenderConfig = toml::from_str(
            r#"
            [bitcoin]
            network = "regtest"
            sighash = "single|anyonecanpay"

            [bitcoin.pinned_reference]
            txid = "9d37c847cbc9ab76ec6ccdbfe84833f08df179d2da04fa3ae212475aa94ef809"
            vout = 1
            script_pubkey = "0014751e76e8199196d454941c45d1b3a323f1433bd6"
            value = 30000

            [ethereum]
            chain_id = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.bitcoin.network, Network::Regtest);
        assert_eq!(config.bitcoin.sighash.to_u32(), 0x83);
        assert_eq!(config.bitcoin.pinned_reference.unwrap().value, 30_000);
        assert_eq!(config.ethereum.chain_id, 3);
        assert_eq!(config.ethereum.rpc_timeout_secs, 10);
    }

    #[test]
    fn test_secrets_are_redacted() {
        let config: SenderConfig = toml::from_str(
            r#"
            [ethereum]
            private_key = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
            "#,
        )
        .unwrap();

        let debug = format!("{:?}", config);
        assert!(!debug.contains("ac0974bec3"));
        assert!(debug.contains("<redacted>"));

        let serialized = toml::to_string(&config).unwrap();
        assert!(!serialized.contains("ac0974bec3"));
        assert_eq!(
            config.ethereum.private_key.expose(),
            "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
        );
    }
}
