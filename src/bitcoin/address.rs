//! Address decoding and encoding.
//!
//! Parsing is delegated to rust-bitcoin; this wrapper pins the address to
//! one configured network and limits witness versions to 0 and 1.

use bitcoin::address::{AddressType, NetworkUnchecked};
use bitcoin::key::CompressedPublicKey;
use bitcoin::{Address, PublicKey, Script, ScriptBuf};
use std::fmt;

use crate::bitcoin::types::{Network, UtxoError, UtxoResult};

/// An address bound to a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitcoinAddress {
    inner: Address,
    network: Network,
}

impl BitcoinAddress {
    pub fn p2pkh(public: &PublicKey, network: Network) -> Self {
        Self {
            inner: Address::p2pkh(public.pubkey_hash(), network.kind()),
            network,
        }
    }

    pub fn p2wpkh(public: &CompressedPublicKey, network: Network) -> Self {
        Self {
            inner: Address::p2wpkh(public, network.to_bitcoin()),
            network,
        }
    }

    pub fn p2shwpkh(public: &CompressedPublicKey, network: Network) -> Self {
        Self {
            inner: Address::p2shwpkh(public, network.kind()),
            network,
        }
    }

    pub fn p2wsh_for(witness_script: &Script, network: Network) -> Self {
        Self {
            inner: Address::p2wsh(witness_script, network.to_bitcoin()),
            network,
        }
    }

    /// Parse an address string for the expected network.
    ///
    /// Wrong checksums, foreign network prefixes and witness versions other
    /// than 0 and 1 all yield `InvalidAddress`.
    pub fn parse(s: &str, network: Network) -> UtxoResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(UtxoError::InvalidAddress("address is empty".to_string()));
        }

        let unchecked: Address<NetworkUnchecked> = s
            .parse()
            .map_err(|e| UtxoError::InvalidAddress(format!("invalid address '{}': {}", s, e)))?;
        if !unchecked.is_valid_for_network(network.to_bitcoin()) {
            return Err(UtxoError::InvalidAddress(format!(
                "address '{}' does not belong to {}",
                s, network
            )));
        }

        let inner = unchecked.assume_checked();
        if inner.address_type().is_none() {
            return Err(UtxoError::InvalidAddress(format!(
                "unsupported witness version in '{}'",
                s
            )));
        }
        Ok(Self { inner, network })
    }

    /// Kind of output the address pays to.
    pub fn address_type(&self) -> Option<AddressType> {
        self.inner.address_type()
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Locking script that pays to this address.
    pub fn script_pubkey(&self) -> ScriptBuf {
        self.inner.script_pubkey()
    }
}

impl fmt::Display for BitcoinAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

/// Decode `address` and return its locking script.
pub fn script_for_address(address: &str, network: Network) -> UtxoResult<ScriptBuf> {
    Ok(BitcoinAddress::parse(address, network)?.script_pubkey())
}
