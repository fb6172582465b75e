//! Account-chain transaction building, signing and RPC access.
//!
//! # Data Flow
//! ```text
//! hex key ──────▶ wallet.rs (AccountSigner)
//! request ──────▶ builder.rs (EIP-155 digest → sign → RLP encode → self-check)
//!                    → SignedAccountTx (raw bytes + hash)
//! orchestrator ─▶ client.rs (nonce, gas price, broadcast, receipts)
//! ```
//!
//! # Design Decisions
//! - Signing never touches the network; `client` is only used by the orchestrator
//! - Only legacy (type 0) transfers are produced
//! - Nonce and gas values are taken as given; fetching them is the caller's job

pub mod builder;
pub mod client;
pub mod types;
pub mod wallet;

pub use builder::{build_and_sign, parse_address, recover_signer};
pub use client::EthereumClient;
pub use types::{
    AccountError, AccountResult, AccountTxRequest, ChainId, SignedAccountTx, TRANSFER_GAS_LIMIT,
    WEI_PER_GWEI,
};
pub use wallet::AccountSigner;
