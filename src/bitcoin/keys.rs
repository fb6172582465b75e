//! WIF key decoding and key-derived addresses.
//!
//! # Security
//! - `Debug` never prints the secret

use bitcoin::key::CompressedPublicKey;
use bitcoin::script::Builder;
use bitcoin::{opcodes, PrivateKey, PublicKey, ScriptBuf};
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, SecretKey, SECP256K1};
use std::fmt;

use crate::bitcoin::address::BitcoinAddress;
use crate::bitcoin::types::{Network, SpendPath, UtxoError, UtxoResult};

/// A secp256k1 key pair decoded from wallet import format.
#[derive(Clone)]
pub struct KeyPair {
    private: PrivateKey,
    public: PublicKey,
    network: Network,
}

impl KeyPair {
    /// Decode a WIF string for the given network.
    ///
    /// Testnet and regtest share a version byte, so a testnet WIF is accepted
    /// for regtest and vice versa.
    pub fn from_wif(wif: &str, network: Network) -> UtxoResult<Self> {
        let private = PrivateKey::from_wif(wif.trim())
            .map_err(|e| UtxoError::InvalidKey(format!("WIF is not valid: {}", e)))?;

        if private.network != network.kind() {
            return Err(UtxoError::InvalidKey(format!(
                "WIF version does not belong to {}",
                network
            )));
        }
        Ok(Self::from_private_key(private, network))
    }

    /// Wrap an already-parsed secret key.
    pub fn from_secret_key(secret: SecretKey, compressed: bool, network: Network) -> Self {
        let private = if compressed {
            PrivateKey::new(secret, network.kind())
        } else {
            PrivateKey::new_uncompressed(secret, network.kind())
        };
        Self::from_private_key(private, network)
    }

    /// A fresh random compressed key.
    pub fn generate(network: Network) -> Self {
        let secret = SecretKey::new(&mut rand::thread_rng());
        Self::from_secret_key(secret, true, network)
    }

    fn from_private_key(private: PrivateKey, network: Network) -> Self {
        let public = private.public_key(SECP256K1);
        Self {
            private,
            public,
            network,
        }
    }

    /// Encode back into wallet import format.
    pub fn to_wif(&self) -> String {
        self.private.to_wif()
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Whether the WIF asked for the compressed public key encoding.
    pub fn is_compressed(&self) -> bool {
        self.private.compressed
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Public key bytes in the encoding selected by the WIF.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public.to_bytes()
    }

    /// Compressed form of the public key, regardless of the WIF flag.
    pub fn compressed_public_key(&self) -> CompressedPublicKey {
        CompressedPublicKey(self.public.inner)
    }

    /// `<pubkey> OP_CHECKSIG` in the WIF-selected encoding.
    pub fn p2pk_script(&self) -> ScriptBuf {
        Builder::new()
            .push_key(&self.public)
            .push_opcode(opcodes::all::OP_CHECKSIG)
            .into_script()
    }

    /// `<compressed pubkey> OP_CHECKSIG`, the witness script of a single-key P2WSH output.
    pub fn single_key_witness_script(&self) -> ScriptBuf {
        Builder::new()
            .push_key(&PublicKey::new(self.public.inner))
            .push_opcode(opcodes::all::OP_CHECKSIG)
            .into_script()
    }

    /// Locking script of the P2WPKH output of this key.
    pub fn p2wpkh_script(&self) -> UtxoResult<ScriptBuf> {
        self.require_compressed()?;
        Ok(ScriptBuf::new_p2wpkh(&self.compressed_public_key().wpubkey_hash()))
    }

    /// Legacy pay-to-pubkey-hash address.
    pub fn p2pkh_address(&self) -> BitcoinAddress {
        BitcoinAddress::p2pkh(&self.public, self.network)
    }

    /// Native segwit v0 key-hash address. Requires a compressed key.
    pub fn p2wpkh_address(&self) -> UtxoResult<BitcoinAddress> {
        self.require_compressed()?;
        Ok(BitcoinAddress::p2wpkh(&self.compressed_public_key(), self.network))
    }

    /// Native segwit v0 script-hash address of the single-key witness script.
    pub fn p2wsh_address(&self) -> UtxoResult<BitcoinAddress> {
        self.require_compressed()?;
        Ok(BitcoinAddress::p2wsh_for(
            &self.single_key_witness_script(),
            self.network,
        ))
    }

    /// Segwit v0 key-hash output wrapped in P2SH. Requires a compressed key.
    pub fn nested_p2wpkh_address(&self) -> UtxoResult<BitcoinAddress> {
        self.require_compressed()?;
        Ok(BitcoinAddress::p2shwpkh(&self.compressed_public_key(), self.network))
    }

    /// Address of the output this key funds through `path`.
    ///
    /// Pay-to-pubkey outputs have no address form.
    pub fn address_for(&self, path: SpendPath) -> UtxoResult<BitcoinAddress> {
        match path {
            SpendPath::LegacyP2pkh => Ok(self.p2pkh_address()),
            SpendPath::WitnessP2wpkh => self.p2wpkh_address(),
            SpendPath::NestedP2wpkh => self.nested_p2wpkh_address(),
            SpendPath::WitnessP2wsh => self.p2wsh_address(),
            SpendPath::LegacyP2pk => Err(UtxoError::InvalidAddress(
                "pay-to-pubkey outputs have no address".to_string(),
            )),
        }
    }

    pub(crate) fn require_compressed(&self) -> UtxoResult<()> {
        if self.is_compressed() {
            Ok(())
        } else {
            Err(UtxoError::InvalidKey(
                "segwit spending requires a compressed key".to_string(),
            ))
        }
    }

    /// Sign a 32-byte digest with RFC-6979 deterministic ECDSA (low-S).
    pub fn sign_digest(&self, digest: [u8; 32]) -> UtxoResult<Signature> {
        let message = Message::from_digest(digest);
        let signature = SECP256K1.sign_ecdsa(&message, &self.private.inner);
        SECP256K1
            .verify_ecdsa(&message, &signature, &self.public.inner)
            .map_err(|e| UtxoError::SigningFailed(format!("signature self-check failed: {}", e)))?;
        Ok(signature)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(self.public_key_bytes()))
            .field("compressed", &self.is_compressed())
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Private key 1, the generator point.
    const WIF_MAINNET_COMPRESSED: &str = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";
    const WIF_MAINNET_UNCOMPRESSED: &str = "5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf";

    #[test]
    fn test_decode_compressed_wif() {
        let key = KeyPair::from_wif(WIF_MAINNET_COMPRESSED, Network::Mainnet).unwrap();
        assert!(key.is_compressed());
        assert_eq!(
            hex::encode(key.compressed_public_key().to_bytes()),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
        assert_eq!(
            key.p2pkh_address().to_string(),
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"
        );
        assert_eq!(
            key.p2wpkh_address().unwrap().to_string(),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
    }

    #[test]
    fn test_decode_uncompressed_wif() {
        let key = KeyPair::from_wif(WIF_MAINNET_UNCOMPRESSED, Network::Mainnet).unwrap();
        assert!(!key.is_compressed());
        assert_eq!(key.public_key_bytes().len(), 65);
        assert_eq!(
            key.p2pkh_address().to_string(),
            "1EHNa6Q4Jz2uvNExL497mE43ikXhwF6kZm"
        );
        assert!(matches!(key.p2wpkh_address(), Err(UtxoError::InvalidKey(_))));
    }

    #[test]
    fn test_wif_round_trip() {
        let key = KeyPair::from_wif(WIF_MAINNET_COMPRESSED, Network::Mainnet).unwrap();
        assert_eq!(key.to_wif(), WIF_MAINNET_COMPRESSED);
    }

    #[test]
    fn test_wif_network_mismatch() {
        let err = KeyPair::from_wif(WIF_MAINNET_COMPRESSED, Network::Testnet).unwrap_err();
        assert!(matches!(err, UtxoError::InvalidKey(_)));
        assert!(err.to_string().contains("testnet"));
    }

    #[test]
    fn test_generated_key_round_trips() {
        let key = KeyPair::generate(Network::Testnet);
        assert!(key.is_compressed());
        let decoded = KeyPair::from_wif(&key.to_wif(), Network::Testnet).unwrap();
        assert_eq!(decoded.public_key(), key.public_key());
        assert_eq!(
            decoded.p2wpkh_address().unwrap(),
            key.p2wpkh_address().unwrap()
        );
    }

    #[test]
    fn test_wif_bad_checksum() {
        let mut wif = WIF_MAINNET_COMPRESSED.to_string();
        wif.pop();
        wif.push('o');
        assert!(matches!(
            KeyPair::from_wif(&wif, Network::Mainnet),
            Err(UtxoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_address_for_each_path() {
        let key = KeyPair::from_wif(WIF_MAINNET_COMPRESSED, Network::Mainnet).unwrap();
        assert_eq!(
            key.address_for(SpendPath::LegacyP2pkh).unwrap().to_string(),
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"
        );
        assert_eq!(
            key.address_for(SpendPath::WitnessP2wpkh).unwrap().to_string(),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
        assert_eq!(
            key.address_for(SpendPath::NestedP2wpkh).unwrap().to_string(),
            "3JvL6Ymt8MVWiCNHC7oWU6nLeHNJKLZGLN"
        );
        assert!(matches!(
            key.address_for(SpendPath::LegacyP2pk),
            Err(UtxoError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let key = KeyPair::from_wif(WIF_MAINNET_COMPRESSED, Network::Mainnet).unwrap();
        let debug = format!("{:?}", key);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("0279be66"));
    }

    #[test]
    fn test_signature_verifies() {
        let key = KeyPair::from_wif(WIF_MAINNET_COMPRESSED, Network::Mainnet).unwrap();
        let signature = key.sign_digest([7u8; 32]).unwrap();
        let message = Message::from_digest([7u8; 32]);
        assert!(SECP256K1
            .verify_ecdsa(&message, &signature, &key.public_key().inner)
            .is_ok());
    }
}
