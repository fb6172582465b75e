//! Fresh key material for test wallets.
//!
//! Generated secrets are printed once and never logged.

use serde::Serialize;

use crate::bitcoin::{KeyPair, Network, UtxoResult};
use crate::ethereum::{AccountResult, AccountSigner};
use crate::orchestrator::SendResult;

/// A new account-chain key.
#[derive(Serialize)]
pub struct AccountKeyMaterial {
    /// 64 hex digits, with 0x prefix.
    pub private_key: String,
    /// Uncompressed public key, hex.
    pub public_key: String,
    /// EIP-55 checksummed address.
    pub address: String,
}

/// A new UTXO-chain key.
#[derive(Serialize)]
pub struct UtxoKeyMaterial {
    pub network: Network,
    pub wif: String,
    /// Compressed public key, hex.
    pub public_key: String,
    pub p2wpkh_address: String,
    pub p2pkh_address: String,
}

/// One key per chain.
#[derive(Serialize)]
pub struct GeneratedKeys {
    pub ethereum: AccountKeyMaterial,
    pub bitcoin: UtxoKeyMaterial,
}

/// Generate a random account-chain key.
pub fn generate_account_key() -> AccountResult<AccountKeyMaterial> {
    let signer = AccountSigner::random();
    Ok(AccountKeyMaterial {
        private_key: format!("0x{}", signer.private_key_hex().as_str()),
        public_key: hex::encode(signer.public_key_uncompressed()?),
        address: signer.address().to_checksum(None),
    })
}

/// Generate a random compressed UTXO-chain key for `network`.
pub fn generate_utxo_key(network: Network) -> UtxoResult<UtxoKeyMaterial> {
    let key = KeyPair::generate(network);
    Ok(UtxoKeyMaterial {
        network,
        wif: key.to_wif(),
        public_key: hex::encode(key.public_key_bytes()),
        p2wpkh_address: key.p2wpkh_address()?.to_string(),
        p2pkh_address: key.p2pkh_address().to_string(),
    })
}

/// Generate one key for each chain.
pub fn generate_keys(network: Network) -> SendResult<GeneratedKeys> {
    Ok(GeneratedKeys {
        ethereum: generate_account_key()?,
        bitcoin: generate_utxo_key(network)?,
    })
}
