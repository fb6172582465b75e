//! Esplora REST client.
//!
//! # Responsibilities
//! - List spendable outputs and balances of an address
//! - Broadcast raw transactions
//! - Report confirmation depth
//!
//! # Design Decisions
//! - Base URLs are tried in order; transport failures move to the next one
//! - A 4xx answer (other than 429) is a rejection and is returned at once
//! - A broadcast refused as already in the mempool or chain counts as sent
//! - The UTXO endpoint does not return locking scripts, so they are derived
//!   from the queried address

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;

use crate::bitcoin::address::script_for_address;
use crate::bitcoin::builder::decode_transaction;
use crate::bitcoin::types::{txid_from_hex, Network, SpendableRef};
use crate::config::schema::BitcoinConfig;
use crate::orchestrator::collaborators::{
    Broadcaster, ConfirmationSource, ConfirmationStatus, UtxoEntry, UtxoSource,
};
use crate::orchestrator::error::{NetworkError, NetworkResult};

#[derive(Debug, Deserialize)]
struct UtxoResponse {
    txid: String,
    vout: u32,
    value: u64,
    status: TxStatusResponse,
}

#[derive(Debug, Deserialize)]
struct TxStatusResponse {
    confirmed: bool,
    #[serde(default)]
    block_height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AddressResponse {
    chain_stats: ChainStats,
}

#[derive(Debug, Deserialize)]
struct ChainStats {
    funded_txo_sum: u64,
    spent_txo_sum: u64,
}

enum Method {
    Get,
    Post(String),
}

/// Esplora HTTP client with failover.
#[derive(Debug, Clone)]
pub struct EsploraClient {
    http: reqwest::Client,
    base_urls: Vec<String>,
    network: Network,
    timeout_duration: Duration,
}

impl EsploraClient {
    /// Create a client for the given base URLs (primary first).
    pub fn new(base_urls: Vec<String>, network: Network, request_timeout: Duration) -> Self {
        let base_urls = base_urls
            .into_iter()
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .collect();
        Self {
            http: reqwest::Client::new(),
            base_urls,
            network,
            timeout_duration: request_timeout,
        }
    }

    /// Create a client from the UTXO-chain section of the config.
    pub fn from_config(config: &BitcoinConfig) -> Self {
        let mut urls = vec![config.esplora_url.clone()];
        urls.extend(config.failover_urls.iter().cloned());
        Self::new(
            urls,
            config.network,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn network(&self) -> Network {
        self.network
    }

    async fn request(&self, operation: &'static str, path: &str, method: Method) -> NetworkResult<String> {
        let mut last_error = NetworkError::NotAvailable("no Esplora URLs configured".to_string());

        for (i, base) in self.base_urls.iter().enumerate() {
            let url = format!("{}{}", base, path);
            let builder = match &method {
                Method::Get => self.http.get(&url),
                Method::Post(body) => self.http.post(&url).body(body.clone()),
            };

            let attempt = async {
                let response = builder.send().await.map_err(classify_reqwest_error)?;
                let status = response.status();
                let body = response.text().await.map_err(classify_reqwest_error)?;
                classify_status(status, body)
            };

            match timeout(self.timeout_duration, attempt).await {
                Ok(Ok(body)) => return Ok(body),
                Ok(Err(e)) if !e.is_transient() => return Err(e),
                Ok(Err(e)) => {
                    tracing::warn!(url_idx = i, operation, error = %e, "Esplora error, trying next URL");
                    last_error = e;
                }
                Err(_) => {
                    tracing::warn!(url_idx = i, operation, "Esplora timeout, trying next URL");
                    last_error = NetworkError::Timeout(self.timeout_duration);
                }
            }
        }

        Err(NetworkError::Transport(format!(
            "All Esplora URLs failed ({}): {}",
            operation, last_error
        )))
    }

    /// Unspent outputs paying to `address`.
    pub async fn get_utxos(&self, address: &str) -> NetworkResult<Vec<UtxoEntry>> {
        let script_pubkey = script_for_address(address, self.network)
            .map_err(|e| NetworkError::Decode(format!("cannot derive locking script: {}", e)))?;

        let body = self
            .request("address_utxo", &format!("/address/{}/utxo", address), Method::Get)
            .await?;
        let utxos: Vec<UtxoResponse> = parse_json(&body)?;

        utxos
            .into_iter()
            .map(|u| {
                let txid = txid_from_hex(&u.txid).map_err(|e| NetworkError::Decode(e.to_string()))?;
                Ok(UtxoEntry {
                    reference: SpendableRef {
                        txid,
                        vout: u.vout,
                        script_pubkey: script_pubkey.clone(),
                        value: u.value,
                        witness_script: None,
                    },
                    confirmed: u.status.confirmed,
                })
            })
            .collect()
    }

    /// Confirmed balance of `address` in satoshis.
    pub async fn get_confirmed_balance(&self, address: &str) -> NetworkResult<u64> {
        let body = self
            .request("address", &format!("/address/{}", address), Method::Get)
            .await?;
        let info: AddressResponse = parse_json(&body)?;
        Ok(info
            .chain_stats
            .funded_txo_sum
            .saturating_sub(info.chain_stats.spent_txo_sum))
    }

    /// Broadcast a raw transaction; returns the txid reported by the server.
    pub async fn broadcast_hex(&self, raw_hex: &str) -> NetworkResult<String> {
        let body = self
            .request("broadcast", "/tx", Method::Post(raw_hex.to_string()))
            .await?;
        let txid = body.trim();
        if txid.len() != 64 || hex::decode(txid).is_err() {
            return Err(NetworkError::Decode(format!("unexpected broadcast answer '{}'", txid)));
        }
        Ok(txid.to_string())
    }

    /// Height of the best block.
    pub async fn get_tip_height(&self) -> NetworkResult<u64> {
        let body = self
            .request("tip_height", "/blocks/tip/height", Method::Get)
            .await?;
        body.trim()
            .parse()
            .map_err(|_| NetworkError::Decode(format!("tip height '{}' is not a number", body.trim())))
    }

    /// Confirmation status of `txid`. An unknown transaction reads as pending.
    pub async fn get_confirmation_status(&self, txid: &str, required: u32) -> NetworkResult<ConfirmationStatus> {
        let body = match self
            .request("tx_status", &format!("/tx/{}/status", txid), Method::Get)
            .await
        {
            Ok(body) => body,
            Err(NetworkError::Rejected(reason)) if reason.starts_with("404") => {
                return Ok(ConfirmationStatus::Pending)
            }
            Err(e) => return Err(e),
        };
        let status: TxStatusResponse = parse_json(&body)?;

        if !status.confirmed {
            return Ok(ConfirmationStatus::Pending);
        }
        let tip = self.get_tip_height().await?;
        Ok(ConfirmationStatus::from_depth(status.block_height, tip, required))
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> NetworkError {
    if e.is_timeout() {
        NetworkError::Transport(format!("timed out: {}", e))
    } else if e.is_decode() {
        NetworkError::Decode(e.to_string())
    } else {
        NetworkError::Transport(e.to_string())
    }
}

fn classify_status(status: StatusCode, body: String) -> NetworkResult<String> {
    if status.is_success() {
        Ok(body)
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(NetworkError::Transport(format!("{}: {}", status.as_u16(), body.trim())))
    } else {
        Err(NetworkError::Rejected(format!("{}: {}", status.as_u16(), body.trim())))
    }
}

fn parse_json<T: for<'de> Deserialize<'de>>(body: &str) -> NetworkResult<T> {
    serde_json::from_str(body).map_err(|e| NetworkError::Decode(e.to_string()))
}

#[async_trait]
impl UtxoSource for EsploraClient {
    async fn spendable(&self, address: &str) -> NetworkResult<Vec<UtxoEntry>> {
        self.get_utxos(address).await
    }

    async fn confirmed_balance(&self, address: &str) -> NetworkResult<u64> {
        self.get_confirmed_balance(address).await
    }
}

#[async_trait]
impl Broadcaster for EsploraClient {
    async fn broadcast(&self, raw: &[u8]) -> NetworkResult<String> {
        match self.broadcast_hex(&hex::encode(raw)).await {
            Err(e) if e.is_already_known() => {
                let txid = decode_transaction(raw)
                    .map_err(|decode| NetworkError::Decode(decode.to_string()))?
                    .compute_txid()
                    .to_string();
                tracing::info!(txid = %txid, reason = %e, "Esplora already holds the transaction");
                Ok(txid)
            }
            other => other,
        }
    }
}

#[async_trait]
impl ConfirmationSource for EsploraClient {
    async fn status(&self, txid: &str, required: u32) -> NetworkResult<ConfirmationStatus> {
        self.get_confirmation_status(txid, required).await
    }
}
