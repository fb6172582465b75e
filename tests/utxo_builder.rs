//! End-to-end tests for the UTXO transaction builder.

use bitcoin::hashes::{sha256, Hash};
use bitcoin::sighash::SighashCache;
use bitcoin::{ecdsa, Amount, EcdsaSighashType, ScriptBuf};
use chain_sender::bitcoin::{
    build_and_sign, decode_transaction, KeyPair, Network, SpendPath, SpendableRef, UtxoError,
    UtxoTxBuilder,
};
use secp256k1::{Message, SECP256K1};

// Secret key 1, testnet, compressed.
const WIF: &str = "cMahea7zqjxrtgAbB7LSGbcQUr1uX1ojuat9jZodMN87JcbXMTcA";
const PREV_TXID: &str = "9d37c847cbc9ab76ec6ccdbfe84833f08df179d2da04fa3ae212475aa94ef809";
const DESTINATION: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";
const DESTINATION_SCRIPT: &str = "0014751e76e8199196d454941c45d1b3a323f1433bd6";

// P2WSH of `<key 1> OP_CHECKSIG`, i.e. tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3q0sl5k7.
const P2WSH_SCRIPT: &str = "00201863143c14c5166804bd19203356da136c985678cd4d27a1b8c6329604903262";
const P2WPKH_SCRIPT: &str = "0014751e76e8199196d454941c45d1b3a323f1433bd6";
const P2PKH_SCRIPT: &str = "76a914751e76e8199196d454941c45d1b3a323f1433bd688ac";

const P2WSH_RAW: &str = "0200000000010109f84ea95a4712e23afa04dad279f18df03348e8bfcd6cec76abc9cb47c8379d0100000000ffffffff01204e000000000000160014751e76e8199196d454941c45d1b3a323f1433bd602483045022100d5c05adabc9aabf142a7196e32dcde38e7ee46bff3afeb1906eb0cc8e3d5202e02205fb3af36906a115c82baae82e20239951b77eb867ab225c7c59bb63efc8943550123210279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798ac00000000";
const P2WSH_TXID: &str = "0c673b905025889c081b40cc247dced168614fa4adec2f82285dbde06dd28285";
const P2WPKH_RAW: &str = "0200000000010109f84ea95a4712e23afa04dad279f18df03348e8bfcd6cec76abc9cb47c8379d0100000000ffffffff01204e000000000000160014751e76e8199196d454941c45d1b3a323f1433bd602483045022100d0e86267bba4cc5f0e8569db4aaa061c95fddfc0264df7d74647e43426866ea702204864b8e8e74698f9950341a234829dae2d64d1cd2210f75b44e804acc4d4330f01210279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f8179800000000";
// Regression pins; the signatures are checked against SighashCache digests below.
const P2PKH_RAW: &str = "020000000109f84ea95a4712e23afa04dad279f18df03348e8bfcd6cec76abc9cb47c8379d010000006a4730440220130fc30da0b610383d6798cdcc4dbe91d0818459875e743778f5eb547d2b1dd802204e1c07c3a5bddae194ec78747ea94fa7b2efda5683ea30beb1f448ed735d836d01210279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798ffffffff01204e000000000000160014751e76e8199196d454941c45d1b3a323f1433bd600000000";
const P2PKH_TXID: &str = "6531aff8e7de5a2118b9db578b3904d61682f2c222b303d97936f05a43cc2048";

fn reference(script_hex: &str, value: u64) -> SpendableRef {
    SpendableRef::from_hex(PREV_TXID, 1, script_hex, value).unwrap()
}

#[test]
fn test_p2wsh_transfer_decodes_to_one_input_one_output() {
    let reference = reference(P2WSH_SCRIPT, 30_000);
    let signed = build_and_sign(WIF, &reference, DESTINATION, 20_000).unwrap();

    let tx = decode_transaction(&signed.raw).unwrap();
    assert_eq!(tx.input.len(), 1);
    assert_eq!(tx.input[0].previous_output.txid.to_string(), PREV_TXID);
    assert_eq!(tx.input[0].previous_output.vout, 1);
    assert!(tx.input[0].script_sig.is_empty());
    assert_eq!(tx.output.len(), 1);
    assert_eq!(tx.output[0].value, Amount::from_sat(20_000));
    assert_eq!(tx.output[0].script_pubkey.to_hex_string(), DESTINATION_SCRIPT);

    assert_eq!(signed.spend_path, SpendPath::WitnessP2wsh);
    assert_eq!(signed.fee, 10_000);
    assert_eq!(
        signed.source_address,
        "tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3q0sl5k7"
    );
}

#[test]
fn test_p2wsh_transfer_matches_known_bytes() {
    let reference = reference(P2WSH_SCRIPT, 30_000);
    let signed = build_and_sign(WIF, &reference, DESTINATION, 20_000).unwrap();
    assert_eq!(signed.hex(), P2WSH_RAW);
    assert_eq!(signed.txid, P2WSH_TXID);
    assert_eq!(signed.vsize, 110);
}

#[test]
fn test_p2wpkh_transfer_matches_known_bytes() {
    let reference = reference(P2WPKH_SCRIPT, 30_000);
    let signed = build_and_sign(WIF, &reference, DESTINATION, 20_000).unwrap();
    assert_eq!(signed.spend_path, SpendPath::WitnessP2wpkh);
    assert_eq!(signed.hex(), P2WPKH_RAW);
}

#[test]
fn test_p2pkh_transfer_matches_known_bytes() {
    let reference = reference(P2PKH_SCRIPT, 30_000);
    let signed = build_and_sign(WIF, &reference, DESTINATION, 20_000).unwrap();
    assert_eq!(signed.spend_path, SpendPath::LegacyP2pkh);
    assert_eq!(signed.hex(), P2PKH_RAW);
    assert_eq!(signed.txid, P2PKH_TXID);
    // No witness, so both ids agree.
    assert_eq!(signed.txid, signed.wtxid);
    assert_eq!(signed.source_address, "mrCDrCybB6J1vRfbwM5hemdJz73FwDBC8r");
}

#[test]
fn test_witness_signature_verifies_against_digest() {
    let key = KeyPair::from_wif(WIF, Network::Testnet).unwrap();
    let reference = reference(P2WSH_SCRIPT, 30_000);
    let signed = build_and_sign(WIF, &reference, DESTINATION, 20_000).unwrap();

    let mut tx = decode_transaction(&signed.raw).unwrap();
    let witness = std::mem::take(&mut tx.input[0].witness);
    let sig = ecdsa::Signature::from_slice(witness.nth(0).unwrap()).unwrap();
    let witness_script = ScriptBuf::from_bytes(witness.nth(1).unwrap().to_vec());
    assert_eq!(
        sha256::Hash::hash(witness_script.as_bytes()).to_byte_array().to_vec(),
        hex::decode(&P2WSH_SCRIPT[4..]).unwrap()
    );
    assert_eq!(sig.sighash_type, EcdsaSighashType::All);

    let digest = SighashCache::new(&tx)
        .p2wsh_signature_hash(0, &witness_script, Amount::from_sat(30_000), EcdsaSighashType::All)
        .unwrap();
    assert!(SECP256K1
        .verify_ecdsa(
            &Message::from_digest(digest.to_byte_array()),
            &sig.signature,
            &key.public_key().inner
        )
        .is_ok());
}

#[test]
fn test_legacy_signature_verifies_against_digest() {
    let key = KeyPair::from_wif(WIF, Network::Testnet).unwrap();
    let signed = build_and_sign(WIF, &reference(P2PKH_SCRIPT, 30_000), DESTINATION, 20_000).unwrap();

    let mut tx = decode_transaction(&signed.raw).unwrap();
    let script_sig = std::mem::take(&mut tx.input[0].script_sig);
    let pushes: Vec<_> = script_sig
        .instructions()
        .map(|i| i.unwrap().push_bytes().unwrap().as_bytes().to_vec())
        .collect();
    assert_eq!(pushes.len(), 2);
    assert_eq!(pushes[1], key.public_key_bytes());

    let sig = ecdsa::Signature::from_slice(&pushes[0]).unwrap();
    let locking = ScriptBuf::from_hex(P2PKH_SCRIPT).unwrap();
    let digest = SighashCache::new(&tx)
        .legacy_signature_hash(0, &locking, EcdsaSighashType::All.to_u32())
        .unwrap();
    assert!(SECP256K1
        .verify_ecdsa(
            &Message::from_digest(digest.to_byte_array()),
            &sig.signature,
            &key.public_key().inner
        )
        .is_ok());
}

#[test]
fn test_signing_is_deterministic() {
    let reference = reference(P2WSH_SCRIPT, 30_000);
    let first = build_and_sign(WIF, &reference, DESTINATION, 20_000).unwrap();
    let second = build_and_sign(WIF, &reference, DESTINATION, 20_000).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_insufficient_funds() {
    let reference = reference(P2WSH_SCRIPT, 30_000);
    let err = build_and_sign(WIF, &reference, DESTINATION, 40_000).unwrap_err();
    assert_eq!(
        err,
        UtxoError::InsufficientFunds {
            needed: 40_000,
            available: 30_000
        }
    );
}

#[test]
fn test_zero_amount_is_accepted() {
    let reference = reference(P2WPKH_SCRIPT, 30_000);
    let signed = build_and_sign(WIF, &reference, DESTINATION, 0).unwrap();
    let tx = decode_transaction(&signed.raw).unwrap();
    assert_eq!(tx.output[0].value, Amount::ZERO);
    assert_eq!(signed.fee, 30_000);
}

#[test]
fn test_bad_key_checked_first() {
    let reference = reference(P2WSH_SCRIPT, 30_000);
    // Bad key and bad address: the key error wins.
    let err = build_and_sign("not-a-wif", &reference, "nonsense", 40_000).unwrap_err();
    assert!(matches!(err, UtxoError::InvalidKey(_)));
}

#[test]
fn test_mainnet_key_rejected_on_testnet() {
    let reference = reference(P2WSH_SCRIPT, 30_000);
    let err = build_and_sign(
        "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn",
        &reference,
        DESTINATION,
        20_000,
    )
    .unwrap_err();
    assert!(matches!(err, UtxoError::InvalidKey(_)));
}

#[test]
fn test_bad_destination() {
    let reference = reference(P2WSH_SCRIPT, 30_000);
    for destination in [
        "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsy",
        "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
        "",
    ] {
        let err = build_and_sign(WIF, &reference, destination, 20_000).unwrap_err();
        assert!(matches!(err, UtxoError::InvalidAddress(_)), "{}", destination);
    }
}

#[test]
fn test_reference_of_another_key_rejected() {
    // The scenario output commits to a script this key does not know.
    let reference = reference(
        "0020c1ad69782bc8cad6476d8224c7a9a221a5e88740486386ba1447a806a179f0bb",
        30_000,
    );
    let err = build_and_sign(WIF, &reference, DESTINATION, 20_000).unwrap_err();
    assert!(matches!(err, UtxoError::InvalidReference(_)));
}

#[test]
fn test_nested_segwit_transfer() {
    let key = KeyPair::from_wif(WIF, Network::Testnet).unwrap();
    let redeem_script = key.p2wpkh_script().unwrap();
    let reference = reference(&redeem_script.to_p2sh().to_hex_string(), 30_000);

    let signed = build_and_sign(WIF, &reference, DESTINATION, 25_000).unwrap();
    assert_eq!(signed.spend_path, SpendPath::NestedP2wpkh);
    assert_eq!(
        signed.source_address,
        key.nested_p2wpkh_address().unwrap().to_string()
    );

    let tx = decode_transaction(&signed.raw).unwrap();
    let mut expected_script_sig = vec![redeem_script.len() as u8];
    expected_script_sig.extend_from_slice(redeem_script.as_bytes());
    assert_eq!(tx.input[0].script_sig.as_bytes(), expected_script_sig.as_slice());
    assert_eq!(tx.input[0].witness.len(), 2);
}

#[test]
fn test_uncompressed_key_cannot_spend_segwit() {
    let reference = SpendableRef::from_hex(PREV_TXID, 1, P2WPKH_SCRIPT, 30_000).unwrap();
    let err = UtxoTxBuilder::new(Network::Mainnet)
        .build_and_sign(
            "5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf",
            &reference,
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
            1_000,
        )
        .unwrap_err();
    assert!(matches!(err, UtxoError::InvalidKey(_)));
}

#[test]
fn test_uncompressed_key_spends_legacy() {
    let key = KeyPair::from_wif(
        "5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf",
        Network::Mainnet,
    )
    .unwrap();
    let locking = ScriptBuf::new_p2pkh(&key.public_key().pubkey_hash());
    let reference = SpendableRef::from_hex(PREV_TXID, 0, &locking.to_hex_string(), 5_000).unwrap();

    let signed = UtxoTxBuilder::new(Network::Mainnet)
        .build_and_sign(
            "5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf",
            &reference,
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH",
            4_000,
        )
        .unwrap();
    assert_eq!(signed.source_address, "1EHNa6Q4Jz2uvNExL497mE43ikXhwF6kZm");

    let tx = decode_transaction(&signed.raw).unwrap();
    // <sig> <65-byte pubkey>
    let script_sig = tx.input[0].script_sig.as_bytes();
    let sig_len = script_sig[0] as usize;
    assert_eq!(script_sig[sig_len + 1], 65);
    assert_eq!(script_sig.len(), sig_len + 2 + 65);
}

#[test]
fn test_declared_sighash_type_is_appended() {
    let reference = reference(P2WPKH_SCRIPT, 30_000);
    let signed = UtxoTxBuilder::new(Network::Testnet)
        .sighash_type(EcdsaSighashType::SinglePlusAnyoneCanPay)
        .build_and_sign(WIF, &reference, DESTINATION, 20_000)
        .unwrap();

    let tx = decode_transaction(&signed.raw).unwrap();
    assert_eq!(*tx.input[0].witness.nth(0).unwrap().last().unwrap(), 0x83);

    let default = build_and_sign(WIF, &reference, DESTINATION, 20_000).unwrap();
    assert_ne!(signed.raw, default.raw);
}
