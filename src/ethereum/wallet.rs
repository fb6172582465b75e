//! Key loading for account-chain signing.
//!
//! # Security
//! - Private keys come from the config file or `SENDER_ETH_PRIVATE_KEY`
//! - Keys are never logged or serialized
//! - Decoded key bytes are zeroized once the signer is built

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, SignerSync};
use zeroize::Zeroizing;

use crate::ethereum::types::{AccountError, AccountResult};

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "SENDER_ETH_PRIVATE_KEY";

/// A secp256k1 signer for legacy account-chain transactions.
#[derive(Clone)]
pub struct AccountSigner {
    signer: PrivateKeySigner,
}

impl AccountSigner {
    /// Create a signer from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - 64 hex digits, with or without 0x prefix
    pub fn from_private_key(private_key_hex: &str) -> AccountResult<Self> {
        let trimmed = private_key_hex.trim();
        let key_hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if key_hex.len() != 64 {
            return Err(AccountError::InvalidKey(format!(
                "expected 64 hex digits, got {}",
                key_hex.len()
            )));
        }

        let bytes = Zeroizing::new(
            hex::decode(key_hex)
                .map_err(|e| AccountError::InvalidKey(format!("Invalid private key format: {}", e)))?,
        );
        let signer = PrivateKeySigner::from_slice(&bytes)
            .map_err(|e| AccountError::InvalidKey(format!("Invalid private key: {}", e)))?;

        Ok(Self { signer })
    }

    /// Load the signer from `SENDER_ETH_PRIVATE_KEY`.
    pub fn from_env() -> AccountResult<Self> {
        let private_key = Zeroizing::new(std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            AccountError::InvalidKey(format!(
                "Environment variable {} not set",
                PRIVATE_KEY_ENV_VAR
            ))
        })?);

        Self::from_private_key(&private_key)
    }

    /// A signer over a fresh random key.
    pub fn random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    /// Private key as 64 hex digits without prefix.
    pub fn private_key_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.signer.to_bytes()))
    }

    /// 65-byte uncompressed SEC1 public key.
    pub fn public_key_uncompressed(&self) -> AccountResult<[u8; 65]> {
        let secret = secp256k1::SecretKey::from_slice(self.signer.to_bytes().as_slice())
            .map_err(|e| AccountError::InvalidKey(e.to_string()))?;
        Ok(secp256k1::PublicKey::from_secret_key_global(&secret).serialize_uncompressed())
    }

    /// Address derived from the public key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign a 32-byte prehash. No EIP-191 prefix is applied.
    pub fn sign_hash(&self, hash: &B256) -> AccountResult<Signature> {
        self.signer
            .sign_hash_sync(hash)
            .map_err(|e| AccountError::SigningFailed(e.to_string()))
    }
}

impl std::fmt::Debug for AccountSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSigner")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
