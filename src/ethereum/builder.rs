//! Legacy transaction building and EIP-155 signing.
//!
//! # Data Flow
//! ```text
//! AccountTxRequest
//!     → parse_address (EIP-55 checksum when mixed case)
//!     → TxLegacy (chain_id set, so the digest covers chainId, 0, 0)
//!     → keccak256(RLP(unsigned)) → sign
//!     → RLP(nonce, gasPrice, gas, to, value, data, v, r, s)
//! ```

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::{Decodable2718, Encodable2718};
use alloy::primitives::{keccak256, Address, Bytes, TxKind, U256};

use crate::ethereum::types::{AccountError, AccountResult, AccountTxRequest, SignedAccountTx};
use crate::ethereum::wallet::AccountSigner;

/// Parse a `0x`-prefixed 20-byte address.
///
/// All-lowercase and all-uppercase forms carry no checksum; mixed case must
/// satisfy EIP-55.
pub fn parse_address(s: &str) -> AccountResult<Address> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| AccountError::InvalidAddress(format!("'{}' lacks the 0x prefix", s)))?;

    if digits.len() != 40 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AccountError::InvalidAddress(format!(
            "'{}' is not 40 hex digits",
            s
        )));
    }

    let has_lower = digits.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = digits.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        Address::parse_checksummed(format!("0x{}", digits), None)
            .map_err(|_| AccountError::InvalidAddress(format!("'{}' fails its EIP-55 checksum", s)))
    } else {
        digits
            .parse::<Address>()
            .map_err(|e| AccountError::InvalidAddress(format!("'{}': {}", s, e)))
    }
}

impl AccountSigner {
    /// Build and sign a legacy transaction with EIP-155 replay protection.
    pub fn sign_transfer(&self, request: &AccountTxRequest) -> AccountResult<SignedAccountTx> {
        let to = parse_address(&request.to)?;

        let tx = TxLegacy {
            chain_id: Some(request.chain_id),
            nonce: request.nonce,
            gas_price: request.gas_price,
            gas_limit: request.gas_limit,
            to: TxKind::Call(to),
            value: request.value,
            input: request.input.clone(),
        };

        let signature = self.sign_hash(&tx.signature_hash())?;
        let v = request
            .chain_id
            .checked_mul(2)
            .and_then(|n| n.checked_add(35 + u64::from(signature.v())))
            .ok_or_else(|| {
                AccountError::SigningFailed(format!("chain id {} is too large", request.chain_id))
            })?;
        let (r, s) = (signature.r(), signature.s());

        let envelope = TxEnvelope::Legacy(tx.into_signed(signature));
        let raw = Bytes::from(envelope.encoded_2718());

        let (from, chain_id) = recover_signer(&raw)?;
        if from != self.address() || chain_id != Some(request.chain_id) {
            return Err(AccountError::SerializationFailed(
                "signed transaction does not recover to the signing key".to_string(),
            ));
        }

        Ok(SignedAccountTx {
            hash: keccak256(&raw),
            raw,
            from,
            nonce: request.nonce,
            chain_id: request.chain_id,
            v,
            r,
            s,
        })
    }
}

/// Decode a raw legacy transaction and recover its signer and chain id.
///
/// The chain id is `None` for pre-EIP-155 transactions.
pub fn recover_signer(raw: &[u8]) -> AccountResult<(Address, Option<u64>)> {
    let envelope = TxEnvelope::decode_2718(&mut &raw[..])
        .map_err(|e| AccountError::SerializationFailed(format!("undecodable transaction: {}", e)))?;

    let TxEnvelope::Legacy(signed) = envelope else {
        return Err(AccountError::SerializationFailed(
            "not a legacy transaction".to_string(),
        ));
    };

    let from = signed
        .signature()
        .recover_address_from_prehash(&signed.tx().signature_hash())
        .map_err(|e| AccountError::SigningFailed(format!("signer recovery failed: {}", e)))?;

    Ok((from, signed.tx().chain_id))
}

/// Build and sign a plain value transfer in one call.
///
/// # Errors
/// - `InvalidKey` for a malformed key
/// - `InvalidAddress` for a malformed or mis-checksummed destination
/// - `SigningFailed` / `SerializationFailed` on internal failures
pub fn build_and_sign(
    private_key_hex: &str,
    destination: &str,
    amount: U256,
    nonce: u64,
    gas_limit: u64,
    gas_price: u128,
    chain_id: u64,
) -> AccountResult<SignedAccountTx> {
    let signer = AccountSigner::from_private_key(private_key_hex)?;
    let request = AccountTxRequest::transfer(destination, amount, nonce, gas_price, chain_id)
        .with_gas_limit(gas_limit);
    signer.sign_transfer(&request)
}
