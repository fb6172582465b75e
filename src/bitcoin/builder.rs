//! Single-input, single-output transaction builder.
//!
//! # Two-pass construction
//! ```text
//! pass 1: input without unlock proof + output
//!         → SighashCache digest (legacy or BIP-143)
//!         → ECDSA signature + sighash byte
//! pass 2: insert scriptSig / witness → serialize
//! ```
//!
//! No change output is produced: whatever the reference holds above
//! `amount` is left to the miner as fee and reported in [`SignedUtxoTx::fee`].

use bitcoin::consensus::encode;
use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::sighash::SighashCache;
use bitcoin::transaction::Version;
use bitcoin::{
    absolute, ecdsa, Amount, EcdsaSighashType, OutPoint, ScriptBuf, Sequence, Transaction,
    TxIn, TxOut, Witness,
};

use crate::bitcoin::address::BitcoinAddress;
use crate::bitcoin::keys::KeyPair;
use crate::bitcoin::types::{Network, SpendPath, SpendableRef, UtxoError, UtxoResult};

/// A fully signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUtxoTx {
    /// Wire bytes.
    pub raw: Vec<u8>,
    /// Transaction id, display order.
    pub txid: String,
    /// Witness transaction id, display order.
    pub wtxid: String,
    /// Satoshis forfeited to the miner.
    pub fee: u64,
    /// Virtual size in vbytes.
    pub vsize: usize,
    /// How the referenced output was unlocked.
    pub spend_path: SpendPath,
    /// Address of the spent output, derived from the key.
    pub source_address: String,
}

impl SignedUtxoTx {
    /// Hex encoding of the raw transaction, as accepted by broadcast APIs.
    pub fn hex(&self) -> String {
        hex::encode(&self.raw)
    }

    /// Decode the raw bytes back into a transaction.
    pub fn transaction(&self) -> UtxoResult<Transaction> {
        decode_transaction(&self.raw)
    }
}

/// Decode consensus-encoded transaction bytes.
pub fn decode_transaction(raw: &[u8]) -> UtxoResult<Transaction> {
    encode::deserialize(raw)
        .map_err(|e| UtxoError::SerializationFailed(format!("cannot decode transaction: {}", e)))
}

/// How a reference will be unlocked.
struct SpendPlan {
    path: SpendPath,
    /// Script handed to the sighash algorithm: the locking script for legacy
    /// and P2WPKH paths, the redeem script for nested P2WPKH and the witness
    /// script for P2WSH.
    sighash_script: ScriptBuf,
    /// P2SH redeem script or P2WSH witness script, when the path has one.
    inner_script: Option<ScriptBuf>,
    source_address: BitcoinAddress,
}

/// Builds and signs transfers spending one output.
#[derive(Debug, Clone, Copy)]
pub struct UtxoTxBuilder {
    network: Network,
    sighash: EcdsaSighashType,
}

impl UtxoTxBuilder {
    /// Builder for `network` signing with SIGHASH_ALL.
    pub fn new(network: Network) -> Self {
        Self {
            network,
            sighash: EcdsaSighashType::All,
        }
    }

    /// Override the declared sighash type.
    pub fn sighash_type(mut self, sighash: EcdsaSighashType) -> Self {
        self.sighash = sighash;
        self
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Build and sign a transfer of `amount` satoshis from `reference` to
    /// `destination`.
    ///
    /// # Errors
    /// - `InvalidKey` for a malformed WIF or one from another network
    /// - `InvalidAddress` for a malformed or unsupported destination
    /// - `InvalidReference` when the reference is malformed or the key cannot unlock it
    /// - `InsufficientFunds` when `amount` exceeds the referenced value
    /// - `SigningFailed` / `SerializationFailed` on internal failures
    pub fn build_and_sign(
        &self,
        wif: &str,
        reference: &SpendableRef,
        destination: &str,
        amount: u64,
    ) -> UtxoResult<SignedUtxoTx> {
        let key = KeyPair::from_wif(wif, self.network)?;
        let destination_script = BitcoinAddress::parse(destination, self.network)?.script_pubkey();

        reference.validate()?;
        if amount > reference.value {
            return Err(UtxoError::InsufficientFunds {
                needed: amount,
                available: reference.value,
            });
        }

        let plan = self.plan_spend(&key, reference)?;

        // Pass 1: unsigned skeleton and its digest.
        let mut tx = Transaction {
            version: Version::TWO,
            lock_time: absolute::LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::new(reference.txid, reference.vout),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(amount),
                script_pubkey: destination_script,
            }],
        };

        let digest = self.signature_hash(&tx, &plan, reference.value)?;
        let signature = ecdsa::Signature {
            signature: key.sign_digest(digest)?,
            sighash_type: self.sighash,
        };

        // Pass 2: attach the unlock proof.
        attach_proof(&mut tx.input[0], &plan, &key, signature)?;

        let raw = encode::serialize(&tx);
        if decode_transaction(&raw)? != tx {
            return Err(UtxoError::SerializationFailed(
                "encoded transaction does not decode to itself".to_string(),
            ));
        }

        Ok(SignedUtxoTx {
            txid: tx.compute_txid().to_string(),
            wtxid: tx.compute_wtxid().to_string(),
            fee: reference.value - amount,
            vsize: tx.vsize(),
            spend_path: plan.path,
            source_address: plan.source_address.to_string(),
            raw,
        })
    }

    fn signature_hash(&self, tx: &Transaction, plan: &SpendPlan, value: u64) -> UtxoResult<[u8; 32]> {
        let mut cache = SighashCache::new(tx);
        let value = Amount::from_sat(value);
        let digest = match plan.path {
            SpendPath::LegacyP2pk | SpendPath::LegacyP2pkh => cache
                .legacy_signature_hash(0, &plan.sighash_script, self.sighash.to_u32())
                .map_err(sighash_failed)?
                .to_byte_array(),
            SpendPath::WitnessP2wpkh | SpendPath::NestedP2wpkh => cache
                .p2wpkh_signature_hash(0, &plan.sighash_script, value, self.sighash)
                .map_err(sighash_failed)?
                .to_byte_array(),
            SpendPath::WitnessP2wsh => cache
                .p2wsh_signature_hash(0, &plan.sighash_script, value, self.sighash)
                .map_err(sighash_failed)?
                .to_byte_array(),
        };
        Ok(digest)
    }

    /// Pick the spend path for the referenced locking script and check that
    /// `key` controls it.
    fn plan_spend(&self, key: &KeyPair, reference: &SpendableRef) -> UtxoResult<SpendPlan> {
        let locking = &reference.script_pubkey;

        if locking.is_p2pkh() {
            if *locking != ScriptBuf::new_p2pkh(&key.public_key().pubkey_hash()) {
                return Err(not_controlled("P2PKH"));
            }
            return Ok(SpendPlan {
                path: SpendPath::LegacyP2pkh,
                sighash_script: locking.clone(),
                inner_script: None,
                source_address: key.p2pkh_address(),
            });
        }

        if locking.is_p2pk() {
            if *locking != key.p2pk_script() {
                return Err(not_controlled("P2PK"));
            }
            return Ok(SpendPlan {
                path: SpendPath::LegacyP2pk,
                sighash_script: locking.clone(),
                inner_script: None,
                source_address: key.p2pkh_address(),
            });
        }

        if locking.is_p2wpkh() {
            if *locking != key.p2wpkh_script()? {
                return Err(not_controlled("P2WPKH"));
            }
            return Ok(SpendPlan {
                path: SpendPath::WitnessP2wpkh,
                sighash_script: locking.clone(),
                inner_script: None,
                source_address: key.p2wpkh_address()?,
            });
        }

        if locking.is_p2sh() {
            let redeem_script = key.p2wpkh_script()?;
            if *locking != redeem_script.to_p2sh() {
                return Err(UtxoError::InvalidReference(
                    "P2SH output is not a P2SH-P2WPKH output of this key".to_string(),
                ));
            }
            return Ok(SpendPlan {
                path: SpendPath::NestedP2wpkh,
                sighash_script: redeem_script.clone(),
                inner_script: Some(redeem_script),
                source_address: key.nested_p2wpkh_address()?,
            });
        }

        if locking.is_p2wsh() {
            key.require_compressed()?;
            let witness_script = reference
                .witness_script
                .clone()
                .unwrap_or_else(|| key.single_key_witness_script());
            if *locking != witness_script.to_p2wsh() {
                return Err(UtxoError::InvalidReference(
                    "P2WSH program does not commit to the witness script".to_string(),
                ));
            }
            check_witness_script(key, &witness_script)?;
            return Ok(SpendPlan {
                path: SpendPath::WitnessP2wsh,
                sighash_script: witness_script.clone(),
                source_address: BitcoinAddress::p2wsh_for(&witness_script, self.network),
                inner_script: Some(witness_script),
            });
        }

        if locking.is_p2tr() {
            return Err(UtxoError::InvalidReference(
                "taproot outputs are not supported".to_string(),
            ));
        }
        Err(UtxoError::InvalidReference(format!(
            "unsupported locking script {}",
            locking.to_hex_string()
        )))
    }
}

/// Only witness scripts satisfiable by one signature from `key` are spendable.
fn check_witness_script(key: &KeyPair, witness_script: &ScriptBuf) -> UtxoResult<()> {
    let compressed = key.compressed_public_key();
    if *witness_script == key.single_key_witness_script()
        || *witness_script == ScriptBuf::new_p2pkh(&compressed.pubkey_hash())
    {
        Ok(())
    } else {
        Err(UtxoError::InvalidReference(
            "witness script is not spendable by a single signature of this key".to_string(),
        ))
    }
}

fn attach_proof(
    input: &mut TxIn,
    plan: &SpendPlan,
    key: &KeyPair,
    signature: ecdsa::Signature,
) -> UtxoResult<()> {
    let compressed = key.compressed_public_key();
    match plan.path {
        SpendPath::LegacyP2pk => {
            input.script_sig = Builder::new()
                .push_slice(push_bytes(signature.to_vec())?)
                .into_script();
        }
        SpendPath::LegacyP2pkh => {
            input.script_sig = Builder::new()
                .push_slice(push_bytes(signature.to_vec())?)
                .push_key(key.public_key())
                .into_script();
        }
        SpendPath::WitnessP2wpkh => {
            input.witness = Witness::p2wpkh(&signature, &compressed.0);
        }
        SpendPath::NestedP2wpkh => {
            let redeem_script = plan.inner_script.as_ref().ok_or_else(missing_inner)?;
            input.script_sig = Builder::new()
                .push_slice(push_bytes(redeem_script.to_bytes())?)
                .into_script();
            input.witness = Witness::p2wpkh(&signature, &compressed.0);
        }
        SpendPath::WitnessP2wsh => {
            let witness_script = plan.inner_script.as_ref().ok_or_else(missing_inner)?;
            let mut witness = Witness::new();
            witness.push(signature.to_vec());
            if witness_script.is_p2pkh() {
                witness.push(compressed.to_bytes());
            }
            witness.push(witness_script.as_bytes());
            input.witness = witness;
        }
    }
    Ok(())
}

fn push_bytes(data: Vec<u8>) -> UtxoResult<PushBytesBuf> {
    PushBytesBuf::try_from(data)
        .map_err(|e| UtxoError::SigningFailed(format!("scriptSig push too large: {}", e)))
}

fn sighash_failed(e: impl std::fmt::Display) -> UtxoError {
    UtxoError::SigningFailed(format!("signature hash failed: {}", e))
}

fn missing_inner() -> UtxoError {
    UtxoError::SigningFailed("spend plan lost its inner script".to_string())
}

fn not_controlled(kind: &str) -> UtxoError {
    UtxoError::InvalidReference(format!("{} output does not pay to this key", kind))
}

/// Build and sign on testnet with SIGHASH_ALL.
pub fn build_and_sign(
    wif: &str,
    reference: &SpendableRef,
    destination: &str,
    amount: u64,
) -> UtxoResult<SignedUtxoTx> {
    UtxoTxBuilder::new(Network::Testnet).build_and_sign(wif, reference, destination, amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::script::Instruction;

    // Secret key 1 on testnet, compressed.
    const WIF: &str = "cMahea7zqjxrtgAbB7LSGbcQUr1uX1ojuat9jZodMN87JcbXMTcA";
    const TXID: &str = "9d37c847cbc9ab76ec6ccdbfe84833f08df179d2da04fa3ae212475aa94ef809";
    const DESTINATION: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";

    fn key() -> KeyPair {
        KeyPair::from_wif(WIF, Network::Testnet).unwrap()
    }

    fn reference(script: ScriptBuf, value: u64) -> SpendableRef {
        SpendableRef::from_hex(TXID, 1, &script.to_hex_string(), value).unwrap()
    }

    #[test]
    fn test_plan_matches_script_kind() {
        let key = key();
        let builder = UtxoTxBuilder::new(Network::Testnet);
        let p2wpkh = key.p2wpkh_script().unwrap();

        let cases = [
            (
                ScriptBuf::new_p2pkh(&key.public_key().pubkey_hash()),
                SpendPath::LegacyP2pkh,
            ),
            (key.p2pk_script(), SpendPath::LegacyP2pk),
            (p2wpkh.clone(), SpendPath::WitnessP2wpkh),
            (p2wpkh.to_p2sh(), SpendPath::NestedP2wpkh),
            (key.single_key_witness_script().to_p2wsh(), SpendPath::WitnessP2wsh),
        ];
        for (locking, path) in cases {
            let plan = builder.plan_spend(&key, &reference(locking, 1_000)).unwrap();
            assert_eq!(plan.path, path);
        }
    }

    #[test]
    fn test_foreign_output_rejected() {
        let builder = UtxoTxBuilder::new(Network::Testnet);
        let foreign = ScriptBuf::from_hex("00144242424242424242424242424242424242424242").unwrap();
        assert!(matches!(
            builder.plan_spend(&key(), &reference(foreign, 1_000)),
            Err(UtxoError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_p2pk_script_sig_is_one_signature_push() {
        let key = key();
        let signed = build_and_sign(WIF, &reference(key.p2pk_script(), 5_000), DESTINATION, 4_000)
            .unwrap();
        assert_eq!(signed.spend_path, SpendPath::LegacyP2pk);

        let tx = signed.transaction().unwrap();
        assert!(tx.input[0].witness.is_empty());
        let pushes: Vec<_> = tx.input[0]
            .script_sig
            .instructions()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(pushes.len(), 1);
        let Instruction::PushBytes(push) = pushes[0] else {
            panic!("scriptSig must be a data push");
        };
        let sig = ecdsa::Signature::from_slice(push.as_bytes()).unwrap();
        assert_eq!(sig.sighash_type, EcdsaSighashType::All);
        assert_eq!(*push.as_bytes().last().unwrap(), 0x01);
    }

    #[test]
    fn test_explicit_p2pkh_witness_script() {
        let key = key();
        let witness_script = ScriptBuf::new_p2pkh(&key.compressed_public_key().pubkey_hash());
        let reference = reference(witness_script.to_p2wsh(), 5_000)
            .with_witness_script(witness_script.clone());

        let signed = build_and_sign(WIF, &reference, DESTINATION, 4_000).unwrap();
        let tx = signed.transaction().unwrap();
        assert_eq!(tx.input[0].witness.len(), 3);
        assert_eq!(tx.input[0].witness.nth(2), Some(witness_script.as_bytes()));
    }

    #[test]
    fn test_unsatisfiable_witness_script_rejected() {
        let witness_script = ScriptBuf::from_hex("51").unwrap();
        let reference = reference(witness_script.to_p2wsh(), 5_000)
            .with_witness_script(witness_script);
        assert!(matches!(
            build_and_sign(WIF, &reference, DESTINATION, 4_000),
            Err(UtxoError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_taproot_reference_rejected() {
        let taproot = ScriptBuf::from_hex(
            "51200707070707070707070707070707070707070707070707070707070707070707",
        )
        .unwrap();
        let err = build_and_sign(WIF, &reference(taproot, 5_000), DESTINATION, 1_000).unwrap_err();
        assert!(err.to_string().contains("taproot"));
    }

    #[test]
    fn test_witness_does_not_change_txid() {
        let key = key();
        let signed =
            build_and_sign(WIF, &reference(key.p2wpkh_script().unwrap(), 30_000), DESTINATION, 20_000)
                .unwrap();
        let mut stripped = signed.transaction().unwrap();
        assert!(!stripped.input[0].witness.is_empty());
        stripped.input[0].witness.clear();

        assert_eq!(stripped.compute_txid().to_string(), signed.txid);
        assert_ne!(signed.txid, signed.wtxid);
    }

    #[test]
    fn test_fee_is_surplus() {
        let key = key();
        let reference = reference(key.p2wpkh_script().unwrap(), 30_000);
        let signed = build_and_sign(WIF, &reference, DESTINATION, 20_000).unwrap();
        assert_eq!(signed.fee, 10_000);
        assert_eq!(signed.spend_path, SpendPath::WitnessP2wpkh);
        assert_eq!(signed.source_address, key.p2wpkh_address().unwrap().to_string());
        assert_eq!(signed.hex(), hex::encode(&signed.raw));
    }

    #[test]
    fn test_exact_amount_leaves_no_fee() {
        let key = key();
        let locking = ScriptBuf::new_p2pkh(&key.public_key().pubkey_hash());
        let signed = build_and_sign(WIF, &reference(locking, 30_000), DESTINATION, 30_000).unwrap();
        assert_eq!(signed.fee, 0);
    }
}
