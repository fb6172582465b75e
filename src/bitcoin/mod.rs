//! UTXO-chain transaction building and signing.
//!
//! # Data Flow
//! ```text
//! WIF ──────────▶ keys.rs (decode, derive pubkey)
//! destination ──▶ address.rs (decode → locking script)
//! SpendableRef ─▶ builder.rs (classify, pick spend path)
//!                    → unsigned skeleton
//!                    → SighashCache (legacy or BIP-143 digest)
//!                    → keys.rs (ECDSA sign)
//!                    → attach proof, consensus-serialize
//! ```
//!
//! # Design Decisions
//! - Wire encoding, sighash and address formats come from rust-bitcoin
//! - Everything except `esplora` is synchronous and free of I/O and logging
//! - Errors are returned as [`UtxoError`]; no partial output is ever produced
//! - `esplora` is the network-facing collaborator used by the orchestrator

pub mod address;
pub mod builder;
pub mod esplora;
pub mod keys;
pub mod types;

pub use address::BitcoinAddress;
pub use builder::{build_and_sign, decode_transaction, SignedUtxoTx, UtxoTxBuilder};
pub use esplora::EsploraClient;
pub use keys::KeyPair;
pub use types::{parse_sighash, sighash_name, Network, SpendPath, SpendableRef, UtxoError, UtxoResult};
