//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, multiplier >= 1)
//! - Check URLs, addresses and pinned references of enabled chains
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SenderConfig → Result<(), Vec<ValidationError>>
//! - Disabled chain sections are not checked

use std::fmt;

use crate::bitcoin::{BitcoinAddress, SpendPath, SpendableRef};
use crate::config::schema::{BitcoinConfig, EthereumConfig, SenderConfig};
use crate::ethereum::parse_address;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration.
pub fn validate_config(config: &SenderConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.bitcoin.enabled {
        validate_bitcoin(&config.bitcoin, &mut errors);
    }
    if config.ethereum.enabled {
        validate_ethereum(&config.ethereum, &mut errors);
    }

    let retries = &config.retries;
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    let confirmation = &config.confirmation;
    if confirmation.poll_interval_secs == 0 {
        errors.push(ValidationError::new(
            "confirmation.poll_interval_secs",
            "must be greater than 0",
        ));
    }
    if confirmation.timeout_secs < confirmation.poll_interval_secs {
        errors.push(ValidationError::new(
            "confirmation.timeout_secs",
            "must be at least confirmation.poll_interval_secs",
        ));
    }

    if config.observability.log_level.trim().is_empty() {
        errors.push(ValidationError::new("observability.log_level", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_url(field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {}", e))),
    }
}

fn validate_bitcoin(config: &BitcoinConfig, errors: &mut Vec<ValidationError>) {
    validate_url("bitcoin.esplora_url", &config.esplora_url, errors);
    for (i, url) in config.failover_urls.iter().enumerate() {
        validate_url(&format!("bitcoin.failover_urls[{}]", i), url, errors);
    }

    if config.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "bitcoin.request_timeout_secs",
            "must be greater than 0",
        ));
    }
    if config.source == SpendPath::LegacyP2pk {
        errors.push(ValidationError::new(
            "bitcoin.source",
            "pay-to-pubkey outputs have no address to query",
        ));
    }
    if config.confirmation_blocks == 0 {
        errors.push(ValidationError::new(
            "bitcoin.confirmation_blocks",
            "must be greater than 0",
        ));
    }

    if !config.destination.is_empty() {
        if let Err(e) = BitcoinAddress::parse(&config.destination, config.network) {
            errors.push(ValidationError::new("bitcoin.destination", e.to_string()));
        }
    }

    if let Some(pinned) = &config.pinned_reference {
        if let Err(e) = SpendableRef::from_hex(&pinned.txid, pinned.vout, &pinned.script_pubkey, pinned.value) {
            errors.push(ValidationError::new("bitcoin.pinned_reference", e.to_string()));
        }
        if let Some(ws) = &pinned.witness_script {
            if hex::decode(ws).is_err() {
                errors.push(ValidationError::new(
                    "bitcoin.pinned_reference.witness_script",
                    "is not hex",
                ));
            }
        }
    }
}

fn validate_ethereum(config: &EthereumConfig, errors: &mut Vec<ValidationError>) {
    validate_url("ethereum.rpc_url", &config.rpc_url, errors);
    for (i, url) in config.failover_urls.iter().enumerate() {
        validate_url(&format!("ethereum.failover_urls[{}]", i), url, errors);
    }

    if config.chain_id == 0 {
        errors.push(ValidationError::new("ethereum.chain_id", "must be greater than 0"));
    }
    if config.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "ethereum.rpc_timeout_secs",
            "must be greater than 0",
        ));
    }
    if !config.gas_price_multiplier.is_finite() || config.gas_price_multiplier < 1.0 {
        errors.push(ValidationError::new(
            "ethereum.gas_price_multiplier",
            "must be a finite number >= 1.0",
        ));
    }
    if config.max_gas_price_gwei == 0 {
        errors.push(ValidationError::new(
            "ethereum.max_gas_price_gwei",
            "must be greater than 0",
        ));
    }
    if config.gas_limit < crate::ethereum::TRANSFER_GAS_LIMIT {
        errors.push(ValidationError::new(
            "ethereum.gas_limit",
            format!("must be at least {}", crate::ethereum::TRANSFER_GAS_LIMIT),
        ));
    }
    if config.amount_wei.parse::<alloy::primitives::U256>().is_err() {
        errors.push(ValidationError::new(
            "ethereum.amount_wei",
            "must be a decimal integer",
        ));
    }
    if !config.destination.is_empty() {
        if let Err(e) = parse_address(&config.destination) {
            errors.push(ValidationError::new("ethereum.destination", e.to_string()));
        }
    }
}
