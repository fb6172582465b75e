//! Transfer orchestration.
//!
//! # Responsibilities
//! - Gather live inputs (UTXOs, nonce, gas price) through collaborators
//! - Hand plain values to the pure builders
//! - Broadcast, then optionally wait for confirmation
//!
//! # Design Decisions
//! - Collaborator calls run under a deadline and are retried when transient
//! - Builder errors are terminal and never retried
//! - A broadcast refused for a stale nonce is rebuilt once with a fresh nonce,
//!   unless the node already holds the first signed transaction
//! - A broadcast refused as already known counts as sent

use alloy::primitives::U256;
use bitcoin::ScriptBuf;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

use crate::bitcoin::{
    BitcoinAddress, EsploraClient, KeyPair, SpendPath, SpendableRef, UtxoError, UtxoTxBuilder,
};
use crate::config::schema::{PinnedReference, Secret, SenderConfig};
use crate::config::validation::ValidationError;
use crate::config::ConfigError;
use crate::ethereum::{parse_address, AccountSigner, AccountTxRequest, EthereumClient, WEI_PER_GWEI};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::observability::tracing::{new_correlation_id, transfer_span};
use crate::orchestrator::collaborators::{
    AccountStateSource, Broadcaster, ConfirmationSource, ConfirmationStatus, UtxoEntry, UtxoSource,
};
use crate::orchestrator::confirm::wait_for_confirmation;
use crate::orchestrator::error::{NetworkError, NetworkResult, SendError, SendResult};
use crate::resilience::{retry, with_timeout};

/// Collaborators for the UTXO chain.
#[derive(Clone)]
pub struct BitcoinBackend {
    pub utxos: Arc<dyn UtxoSource>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub confirmations: Arc<dyn ConfirmationSource>,
}

impl BitcoinBackend {
    /// Use one Esplora client for every role.
    pub fn from_client(client: EsploraClient) -> Self {
        let client = Arc::new(client);
        Self {
            utxos: client.clone(),
            broadcaster: client.clone(),
            confirmations: client,
        }
    }
}

/// Collaborators for the account chain.
#[derive(Clone)]
pub struct EthereumBackend {
    pub state: Arc<dyn AccountStateSource>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub confirmations: Arc<dyn ConfirmationSource>,
}

impl EthereumBackend {
    /// Use one RPC client for every role.
    pub fn from_client(client: EthereumClient) -> Self {
        let client = Arc::new(client);
        Self {
            state: client.clone(),
            broadcaster: client.clone(),
            confirmations: client,
        }
    }
}

/// A UTXO-chain transfer.
#[derive(Debug, Clone)]
pub struct BitcoinTransfer {
    pub wif: Secret,
    pub destination: String,
    pub amount_sat: u64,
    /// Which key-derived output funds the transfer.
    pub source: SpendPath,
    /// Spend this output instead of asking the UTXO source.
    pub pinned: Option<SpendableRef>,
}

impl BitcoinTransfer {
    pub fn from_config(config: &SenderConfig) -> SendResult<Self> {
        let btc = &config.bitcoin;
        let pinned = btc
            .pinned_reference
            .as_ref()
            .map(pinned_to_reference)
            .transpose()?;
        Ok(Self {
            wif: btc.wif.clone(),
            destination: btc.destination.clone(),
            amount_sat: btc.amount_sat,
            source: btc.source,
            pinned,
        })
    }
}

fn pinned_to_reference(pinned: &PinnedReference) -> Result<SpendableRef, UtxoError> {
    let reference =
        SpendableRef::from_hex(&pinned.txid, pinned.vout, &pinned.script_pubkey, pinned.value)?;
    match &pinned.witness_script {
        Some(ws) => {
            let script = ScriptBuf::from_hex(ws.trim()).map_err(|e| {
                UtxoError::InvalidReference(format!("witness script is not hex: {}", e))
            })?;
            Ok(reference.with_witness_script(script))
        }
        None => Ok(reference),
    }
}

/// An account-chain transfer.
#[derive(Debug, Clone)]
pub struct EthereumTransfer {
    pub private_key: Secret,
    pub destination: String,
    pub amount_wei: U256,
    pub gas_limit: u64,
}

impl EthereumTransfer {
    pub fn from_config(config: &SenderConfig) -> SendResult<Self> {
        let eth = &config.ethereum;
        let amount_wei = eth.amount_wei.trim().parse::<U256>().map_err(|e| {
            ConfigError::Validation(vec![ValidationError::new(
                "ethereum.amount_wei",
                format!("not a decimal amount: {}", e),
            )])
        })?;
        Ok(Self {
            private_key: eth.private_key.clone(),
            destination: eth.destination.clone(),
            amount_wei,
            gas_limit: eth.gas_limit,
        })
    }
}

/// Outcome of one transfer, printed by the binary.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    pub correlation_id: Uuid,
    pub chain: &'static str,
    pub txid: String,
    pub from: String,
    pub to: String,
    /// Amount in the chain's base unit (satoshi or wei).
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_sat: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spend_path: Option<SpendPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price_wei: Option<String>,
    pub raw_hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<ConfirmationStatus>,
}

/// Balance of one configured address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceEntry {
    pub chain: &'static str,
    /// "source" or "destination".
    pub role: &'static str,
    pub address: String,
    pub balance: String,
    pub unit: &'static str,
}

/// Pick the first confirmed output that covers `amount`.
pub fn select_utxo(entries: Vec<UtxoEntry>, amount: u64) -> Option<SpendableRef> {
    entries
        .into_iter()
        .find(|e| e.confirmed && e.reference.value >= amount)
        .map(|e| e.reference)
}

/// Apply the multiplier to a suggested gas price and cap the result.
///
/// A suggestion already above the cap is refused rather than clamped.
pub fn effective_gas_price(suggested: u128, multiplier: f64, max_gwei: u64) -> SendResult<u128> {
    let max_wei = u128::from(max_gwei).saturating_mul(WEI_PER_GWEI);
    if suggested > max_wei {
        return Err(SendError::GasPriceTooHigh {
            current_gwei: suggested / WEI_PER_GWEI,
            max_gwei,
        });
    }
    let adjusted = (suggested as f64 * multiplier) as u128;
    Ok(adjusted.min(max_wei))
}

fn call_deadline(timeout_secs: u64, failovers: usize) -> Duration {
    let endpoints = u32::try_from(failovers).unwrap_or(u32::MAX).saturating_add(1);
    Duration::from_secs(timeout_secs).saturating_mul(endpoints)
}

/// Drives the builders with live network data.
pub struct Sender {
    config: Arc<SenderConfig>,
    bitcoin: Option<BitcoinBackend>,
    ethereum: Option<EthereumBackend>,
    shutdown: Arc<Shutdown>,
}

impl Sender {
    pub fn new(config: Arc<SenderConfig>) -> Self {
        Self {
            config,
            bitcoin: None,
            ethereum: None,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub fn with_bitcoin(mut self, backend: BitcoinBackend) -> Self {
        self.bitcoin = Some(backend);
        self
    }

    pub fn with_ethereum(mut self, backend: EthereumBackend) -> Self {
        self.ethereum = Some(backend);
        self
    }

    /// Abandon confirmation waits when `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: Arc<Shutdown>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    fn bitcoin_backend(&self) -> SendResult<&BitcoinBackend> {
        self.bitcoin.as_ref().ok_or_else(|| {
            NetworkError::NotAvailable("UTXO-chain backend not configured".to_string()).into()
        })
    }

    fn ethereum_backend(&self) -> SendResult<&EthereumBackend> {
        self.ethereum.as_ref().ok_or_else(|| {
            NetworkError::NotAvailable("account-chain backend not configured".to_string()).into()
        })
    }

    fn bitcoin_deadline(&self) -> Duration {
        let btc = &self.config.bitcoin;
        call_deadline(btc.request_timeout_secs, btc.failover_urls.len())
    }

    fn ethereum_deadline(&self) -> Duration {
        let eth = &self.config.ethereum;
        call_deadline(eth.rpc_timeout_secs, eth.failover_urls.len())
    }

    /// One collaborator call, bounded by `deadline` and retried when transient.
    async fn call<T, F, Fut>(&self, deadline: Duration, operation: &'static str, mut f: F) -> NetworkResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = NetworkResult<T>>,
    {
        retry(&self.config.retries, operation, || with_timeout(deadline, f())).await
    }

    /// Build, sign and broadcast a UTXO-chain transfer.
    pub async fn send_bitcoin(&self, transfer: &BitcoinTransfer) -> SendResult<TransferReport> {
        let backend = self.bitcoin_backend()?;
        let correlation_id = new_correlation_id();
        let span = transfer_span("bitcoin", &correlation_id);
        self.send_bitcoin_inner(backend, transfer, correlation_id)
            .instrument(span)
            .await
    }

    async fn send_bitcoin_inner(
        &self,
        backend: &BitcoinBackend,
        transfer: &BitcoinTransfer,
        correlation_id: Uuid,
    ) -> SendResult<TransferReport> {
        if transfer.wif.is_empty() {
            return Err(SendError::MissingSetting("bitcoin.wif"));
        }
        if transfer.destination.trim().is_empty() {
            return Err(SendError::MissingSetting("bitcoin.destination"));
        }

        let btc = &self.config.bitcoin;
        let started = Instant::now();
        let key = KeyPair::from_wif(transfer.wif.expose(), btc.network)?;
        BitcoinAddress::parse(&transfer.destination, btc.network)?;
        let source_address = key.address_for(transfer.source)?.to_string();

        let reference = match &transfer.pinned {
            Some(reference) => {
                tracing::info!(
                    txid = %reference.txid_hex(),
                    vout = reference.vout,
                    "Spending pinned reference"
                );
                reference.clone()
            }
            None => {
                self.select_reference(backend, &source_address, transfer.amount_sat)
                    .await?
            }
        };

        let signed = UtxoTxBuilder::new(btc.network)
            .sighash_type(btc.sighash)
            .build_and_sign(
                transfer.wif.expose(),
                &reference,
                &transfer.destination,
                transfer.amount_sat,
            )?;
        metrics::record_built("bitcoin", started);
        tracing::info!(
            txid = %signed.txid,
            fee_sat = signed.fee,
            vsize = signed.vsize,
            spend_path = ?signed.spend_path,
            "Transaction signed"
        );

        let result = self
            .call(self.bitcoin_deadline(), "bitcoin_broadcast", || {
                backend.broadcaster.broadcast(&signed.raw)
            })
            .await;
        let result = match result {
            Err(e) if e.is_already_known() => {
                tracing::info!(txid = %signed.txid, reason = %e, "Backend already holds the transaction");
                Ok(signed.txid.clone())
            }
            other => other,
        };
        metrics::record_broadcast("bitcoin", result.is_ok());
        let reported = result?;
        if reported != signed.txid {
            tracing::warn!(expected = %signed.txid, reported = %reported, "Broadcast reported a different txid");
        }
        tracing::info!(txid = %signed.txid, "Transaction broadcast");

        let confirmation = self
            .maybe_wait(
                "bitcoin",
                backend.confirmations.as_ref(),
                &signed.txid,
                btc.confirmation_blocks,
            )
            .await?;

        Ok(TransferReport {
            correlation_id,
            chain: "bitcoin",
            txid: signed.txid.clone(),
            from: signed.source_address.clone(),
            to: transfer.destination.clone(),
            amount: transfer.amount_sat.to_string(),
            fee_sat: Some(signed.fee),
            spend_path: Some(signed.spend_path),
            nonce: None,
            gas_price_wei: None,
            raw_hex: signed.hex(),
            confirmation,
        })
    }

    async fn select_reference(
        &self,
        backend: &BitcoinBackend,
        address: &str,
        amount: u64,
    ) -> SendResult<SpendableRef> {
        let entries = self
            .call(self.bitcoin_deadline(), "bitcoin_utxos", || {
                backend.utxos.spendable(address)
            })
            .await?;
        tracing::debug!(address, count = entries.len(), "Fetched spendable outputs");

        select_utxo(entries, amount).ok_or_else(|| SendError::NoSpendableOutput {
            address: address.to_string(),
            needed: amount,
        })
    }

    /// Build, sign and broadcast an account-chain transfer.
    pub async fn send_ether(&self, transfer: &EthereumTransfer) -> SendResult<TransferReport> {
        let backend = self.ethereum_backend()?;
        let correlation_id = new_correlation_id();
        let span = transfer_span("ethereum", &correlation_id);
        self.send_ether_inner(backend, transfer, correlation_id)
            .instrument(span)
            .await
    }

    async fn send_ether_inner(
        &self,
        backend: &EthereumBackend,
        transfer: &EthereumTransfer,
        correlation_id: Uuid,
    ) -> SendResult<TransferReport> {
        if transfer.private_key.is_empty() {
            return Err(SendError::MissingSetting("ethereum.private_key"));
        }
        if transfer.destination.trim().is_empty() {
            return Err(SendError::MissingSetting("ethereum.destination"));
        }

        let eth = &self.config.ethereum;
        let deadline = self.ethereum_deadline();
        let signer = AccountSigner::from_private_key(transfer.private_key.expose())?;
        let from = signer.address();
        let to = parse_address(&transfer.destination)?;

        let chain_id = self
            .call(deadline, "eth_chain_id", || backend.state.chain_id())
            .await?;
        if chain_id != eth.chain_id {
            return Err(SendError::ChainMismatch {
                expected: eth.chain_id,
                actual: chain_id,
            });
        }

        let suggested = self
            .call(deadline, "eth_gas_price", || backend.state.gas_price())
            .await?;
        let gas_price =
            effective_gas_price(suggested, eth.gas_price_multiplier, eth.max_gas_price_gwei)?;

        let mut nonce = self
            .call(deadline, "eth_nonce", || backend.state.pending_nonce(from))
            .await?;
        let mut refetched = false;

        let signed = loop {
            let started = Instant::now();
            let request = AccountTxRequest::transfer(
                transfer.destination.clone(),
                transfer.amount_wei,
                nonce,
                gas_price,
                chain_id,
            )
            .with_gas_limit(transfer.gas_limit);
            let signed = signer.sign_transfer(&request)?;
            metrics::record_built("ethereum", started);
            tracing::info!(
                tx_hash = %signed.hash,
                nonce,
                gas_price_wei = %gas_price,
                "Transaction signed"
            );

            let result = self
                .call(deadline, "eth_broadcast", || {
                    backend.broadcaster.broadcast(&signed.raw)
                })
                .await;
            metrics::record_broadcast("ethereum", result.is_ok());

            match result {
                Ok(_) => break signed,
                Err(e) if e.is_already_known() => {
                    tracing::info!(tx_hash = %signed.hash, reason = %e, "Node already holds the transaction");
                    break signed;
                }
                Err(e) if e.is_stale_nonce() && !refetched => {
                    // A lost answer to an earlier attempt also surfaces as a
                    // stale nonce; rebuilding then would pay twice.
                    let known = self
                        .call(deadline, "eth_transaction_known", || {
                            backend.state.transaction_known(signed.hash)
                        })
                        .await?;
                    if known {
                        tracing::warn!(
                            tx_hash = %signed.hash,
                            nonce,
                            "Nonce reported stale but the transaction is already on the node"
                        );
                        break signed;
                    }

                    refetched = true;
                    let fresh = self
                        .call(deadline, "eth_nonce", || backend.state.pending_nonce(from))
                        .await?;
                    tracing::warn!(
                        stale_nonce = nonce,
                        fresh_nonce = fresh,
                        error = %e,
                        "Nonce rejected as stale, rebuilding"
                    );
                    nonce = fresh;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let txid = signed.hash.to_string();
        tracing::info!(tx_hash = %txid, "Transaction broadcast");

        let confirmation = self
            .maybe_wait(
                "ethereum",
                backend.confirmations.as_ref(),
                &txid,
                eth.confirmation_blocks,
            )
            .await?;

        Ok(TransferReport {
            correlation_id,
            chain: "ethereum",
            txid,
            from: from.to_string(),
            to: to.to_string(),
            amount: transfer.amount_wei.to_string(),
            fee_sat: None,
            spend_path: None,
            nonce: Some(signed.nonce),
            gas_price_wei: Some(gas_price.to_string()),
            raw_hex: signed.raw_hex(),
            confirmation,
        })
    }

    async fn maybe_wait(
        &self,
        chain: &'static str,
        source: &dyn ConfirmationSource,
        txid: &str,
        required: u32,
    ) -> SendResult<Option<ConfirmationStatus>> {
        if !self.config.confirmation.wait {
            return Ok(None);
        }

        let status = wait_for_confirmation(
            source,
            txid,
            required,
            &self.config.confirmation,
            self.shutdown.subscribe(),
        )
        .await;

        let outcome = match &status {
            Ok(ConfirmationStatus::Confirmed { .. }) => "confirmed",
            Ok(_) => "failed",
            Err(SendError::ConfirmationTimeout { .. }) => "timeout",
            Err(_) => "interrupted",
        };
        metrics::record_confirmation(chain, outcome);

        let status = status?;
        tracing::info!(txid, status = ?status, "Confirmation wait finished");
        Ok(Some(status))
    }

    /// Balances of the configured source and destination addresses.
    ///
    /// Chains that are disabled or have no backend are skipped, as are
    /// addresses that are not configured.
    pub async fn balances(&self) -> SendResult<Vec<BalanceEntry>> {
        let mut entries = Vec::new();

        if let (true, Some(backend)) = (self.config.bitcoin.enabled, &self.bitcoin) {
            let btc = &self.config.bitcoin;
            let mut addresses = Vec::new();
            if !btc.wif.is_empty() {
                let key = KeyPair::from_wif(btc.wif.expose(), btc.network)?;
                addresses.push(("source", key.address_for(btc.source)?.to_string()));
            }
            if !btc.destination.trim().is_empty() {
                addresses.push(("destination", btc.destination.clone()));
            }

            for (role, address) in addresses {
                let sat = self
                    .call(self.bitcoin_deadline(), "bitcoin_balance", || {
                        backend.utxos.confirmed_balance(&address)
                    })
                    .await?;
                entries.push(BalanceEntry {
                    chain: "bitcoin",
                    role,
                    address,
                    balance: sat.to_string(),
                    unit: "sat",
                });
            }
        }

        if let (true, Some(backend)) = (self.config.ethereum.enabled, &self.ethereum) {
            let eth = &self.config.ethereum;
            let mut addresses = Vec::new();
            if !eth.private_key.is_empty() {
                let signer = AccountSigner::from_private_key(eth.private_key.expose())?;
                addresses.push(("source", signer.address()));
            }
            if !eth.destination.trim().is_empty() {
                addresses.push(("destination", parse_address(&eth.destination)?));
            }

            for (role, address) in addresses {
                let wei = self
                    .call(self.ethereum_deadline(), "eth_balance", || {
                        backend.state.balance(address)
                    })
                    .await?;
                entries.push(BalanceEntry {
                    chain: "ethereum",
                    role,
                    address: address.to_string(),
                    balance: wei.to_string(),
                    unit: "wei",
                });
            }
        }

        Ok(entries)
    }
}
