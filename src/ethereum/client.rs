//! Account-chain RPC client with timeout and failover.
//!
//! # Responsibilities
//! - Connect to JSON-RPC endpoints (primary + failovers)
//! - Query chain state (chain id, nonce, gas price, balances, receipts)
//! - Submit raw signed transactions
//! - Map transport failures and node rejections onto `NetworkError`

use alloy::primitives::{keccak256, Address, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::transports::{RpcError, TransportError};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::schema::EthereumConfig;
use crate::ethereum::types::ChainId;
use crate::orchestrator::collaborators::{
    AccountStateSource, Broadcaster, ConfirmationSource, ConfirmationStatus,
};
use crate::orchestrator::error::{NetworkError, NetworkResult};

type DynProvider = Arc<dyn Provider + Send + Sync>;

/// JSON-RPC client wrapper with failover support.
#[derive(Clone)]
pub struct EthereumClient {
    /// List of providers (primary + failovers).
    providers: Vec<DynProvider>,
    /// Configuration.
    config: EthereumConfig,
    /// Request timeout duration.
    timeout_duration: Duration,
}

impl EthereumClient {
    /// Create a new client.
    ///
    /// A chain id mismatch or an unreachable node is logged, not fatal: the
    /// orchestrator checks the chain id again before signing.
    pub async fn new(config: EthereumConfig) -> NetworkResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            NetworkError::NotAvailable(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(Arc::new(ProviderBuilder::new().connect_http(primary_url)) as DynProvider);

        for url_str in &config.failover_urls {
            match url_str.parse::<url::Url>() {
                Ok(url) => {
                    providers.push(Arc::new(ProviderBuilder::new().connect_http(url)) as DynProvider)
                }
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let client = Self {
            providers,
            config,
            timeout_duration,
        };

        match client.verify_chain_id().await {
            Ok(()) => tracing::info!(
                rpc_url = %client.config.rpc_url,
                chain_id = client.config.chain_id,
                "Ethereum client initialized"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                "Ethereum client initialized but chain verification failed"
            ),
        }

        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> NetworkResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.config.chain_id {
            return Err(NetworkError::Rejected(format!(
                "Chain ID mismatch: expected {}, got {}",
                self.config.chain_id, chain_id.0
            )));
        }
        Ok(())
    }

    /// Run `f` against each provider in turn until one answers.
    ///
    /// Node rejections are returned at once; transport failures and timeouts
    /// move on to the next provider.
    async fn call<T, F, Fut>(&self, operation: &'static str, f: F) -> NetworkResult<T>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut last_error = NetworkError::NotAvailable("no RPC providers configured".to_string());
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, f(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    let err = classify_rpc_error(e);
                    if !err.is_transient() {
                        return Err(err);
                    }
                    tracing::warn!(provider_idx = i, operation, error = %err, "RPC error, trying next provider");
                    last_error = err;
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, operation, "RPC timeout, trying next provider");
                    last_error = NetworkError::Timeout(self.timeout_duration);
                }
            }
        }
        Err(NetworkError::Transport(format!(
            "All RPC providers failed ({}): {}",
            operation, last_error
        )))
    }

    /// Get the chain ID from the RPC.
    pub async fn get_chain_id(&self) -> NetworkResult<ChainId> {
        self.call("eth_chainId", |p| async move { p.get_chain_id().await })
            .await
            .map(ChainId)
    }

    /// Get the latest block number.
    pub async fn get_block_number(&self) -> NetworkResult<u64> {
        self.call("eth_blockNumber", |p| async move { p.get_block_number().await })
            .await
    }

    /// Get the balance of an address.
    pub async fn get_balance(&self, address: Address) -> NetworkResult<U256> {
        self.call("eth_getBalance", |p| async move { p.get_balance(address).await })
            .await
    }

    /// Get the pending transaction count (nonce) for an address.
    pub async fn get_pending_transaction_count(&self, address: Address) -> NetworkResult<u64> {
        self.call("eth_getTransactionCount", |p| async move {
            p.get_transaction_count(address).pending().await
        })
        .await
    }

    /// Get current gas price in wei.
    pub async fn get_gas_price(&self) -> NetworkResult<u128> {
        self.call("eth_gasPrice", |p| async move { p.get_gas_price().await })
            .await
    }

    /// Submit a raw signed transaction; returns its hash.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> NetworkResult<TxHash> {
        let raw = raw.to_vec();
        self.call("eth_sendRawTransaction", |p| {
            let raw = raw.clone();
            async move {
                let pending = p.send_raw_transaction(&raw).await?;
                Ok(*pending.tx_hash())
            }
        })
        .await
    }

    /// Whether any provider's node holds the transaction, pending or mined.
    pub async fn is_transaction_known(&self, tx_hash: TxHash) -> NetworkResult<bool> {
        self.call("eth_getTransactionByHash", |p| async move {
            p.get_transaction_by_hash(tx_hash).await
        })
        .await
        .map(|tx| tx.is_some())
    }

    /// Get the receipt status of a transaction.
    pub async fn get_confirmation_status(
        &self,
        tx_hash: TxHash,
        required: u32,
    ) -> NetworkResult<ConfirmationStatus> {
        let receipt = self
            .call("eth_getTransactionReceipt", |p| async move {
                p.get_transaction_receipt(tx_hash).await
            })
            .await?;

        let Some(receipt) = receipt else {
            return Ok(ConfirmationStatus::Pending);
        };
        if !receipt.status() {
            return Ok(ConfirmationStatus::Failed {
                reason: "Transaction reverted".to_string(),
            });
        }

        let tip = self.get_block_number().await?;
        Ok(ConfirmationStatus::from_depth(receipt.block_number, tip, required))
    }

    /// Get the configuration.
    pub fn config(&self) -> &EthereumConfig {
        &self.config
    }
}

fn classify_rpc_error(e: TransportError) -> NetworkError {
    match &e {
        RpcError::ErrorResp(payload) => NetworkError::Rejected(payload.message.to_string()),
        RpcError::DeserError { .. } => NetworkError::Decode(e.to_string()),
        _ => NetworkError::Transport(e.to_string()),
    }
}

#[async_trait]
impl AccountStateSource for EthereumClient {
    async fn pending_nonce(&self, address: Address) -> NetworkResult<u64> {
        self.get_pending_transaction_count(address).await
    }

    async fn gas_price(&self) -> NetworkResult<u128> {
        self.get_gas_price().await
    }

    async fn chain_id(&self) -> NetworkResult<u64> {
        self.get_chain_id().await.map(u64::from)
    }

    async fn balance(&self, address: Address) -> NetworkResult<U256> {
        self.get_balance(address).await
    }

    async fn transaction_known(&self, hash: TxHash) -> NetworkResult<bool> {
        self.is_transaction_known(hash).await
    }
}

#[async_trait]
impl Broadcaster for EthereumClient {
    async fn broadcast(&self, raw: &[u8]) -> NetworkResult<String> {
        match self.send_raw_transaction(raw).await {
            Ok(hash) => Ok(hash.to_string()),
            Err(e) if e.is_already_known() => {
                let hash = keccak256(raw);
                tracing::info!(tx_hash = %hash, reason = %e, "Node already holds the transaction");
                Ok(hash.to_string())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ConfirmationSource for EthereumClient {
    async fn status(&self, txid: &str, required: u32) -> NetworkResult<ConfirmationStatus> {
        let tx_hash: TxHash = txid
            .parse()
            .map_err(|e| NetworkError::Decode(format!("invalid transaction hash '{}': {}", txid, e)))?;
        self.get_confirmation_status(tx_hash, required).await
    }
}

impl std::fmt::Debug for EthereumClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthereumClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}
