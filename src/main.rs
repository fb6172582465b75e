//! chain-sender
//!
//! Sends one test transfer on a UTXO chain or an account chain.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml + env
//!         │
//!         ▼
//!   ┌───────────┐      ┌────────────────────────────────────────────┐
//!   │  config   │─────▶│               orchestrator                 │
//!   └───────────┘      │  Sender ─▶ builder ─▶ Broadcaster ─▶ poll  │
//!                      └──────┬─────────────────────────┬───────────┘
//!                             │                         │
//!                   ┌─────────▼────────┐      ┌─────────▼────────┐
//!                   │ bitcoin          │      │ ethereum         │
//!                   │ builder (pure)   │      │ builder (pure)   │
//!                   │ EsploraClient    │      │ EthereumClient   │
//!                   └──────────────────┘      └──────────────────┘
//!
//!   cross-cutting: resilience (timeouts, retries) · observability · lifecycle
//! ```

use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use chain_sender::bitcoin::{EsploraClient, Network};
use chain_sender::config::load_config;
use chain_sender::ethereum::EthereumClient;
use chain_sender::keygen::generate_keys;
use chain_sender::lifecycle::signals::spawn_ctrl_c_listener;
use chain_sender::lifecycle::Shutdown;
use chain_sender::observability::logging::init_logging;
use chain_sender::orchestrator::{
    BalanceEntry, BitcoinBackend, BitcoinTransfer, EthereumBackend, EthereumTransfer, Sender,
};

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "chain-sender")]
#[command(about = "Build, sign and broadcast a test transfer", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Return after broadcasting instead of waiting for confirmations
    #[arg(long)]
    no_wait: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send an account-chain (Ethereum) transfer
    Eth {
        /// Destination address, overrides `ethereum.destination`
        #[arg(long)]
        to: Option<String>,
        /// Amount in wei, overrides `ethereum.amount_wei`
        #[arg(long)]
        amount: Option<String>,
    },
    /// Send a UTXO-chain (Bitcoin) transfer
    Btc {
        /// Destination address, overrides `bitcoin.destination`
        #[arg(long)]
        to: Option<String>,
        /// Amount in satoshis, overrides `bitcoin.amount_sat`
        #[arg(long)]
        amount: Option<u64>,
    },
    /// Show balances of the configured addresses
    Balances,
    /// Generate a fresh key for each chain and print it
    Keygen {
        /// UTXO-chain network the WIF and addresses are encoded for
        #[arg(long, default_value = "testnet")]
        network: Network,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run(Cli::parse()).await {
        tracing::error!(error = %e, "chain-sender failed");
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    if let Commands::Keygen { network } = cli.command {
        let keys = generate_keys(network)?;
        println!("{}", serde_json::to_string_pretty(&keys)?);
        return Ok(());
    }

    let mut config = load_config(&cli.config)?;
    init_logging(&config.observability.log_level, config.observability.log_format)?;

    tracing::info!(config = %cli.config.display(), "chain-sender v0.1.0 starting");

    match &cli.command {
        Commands::Eth { to, amount } => {
            if let Some(to) = to {
                config.ethereum.destination = to.clone();
            }
            if let Some(amount) = amount {
                config.ethereum.amount_wei = amount.clone();
            }
        }
        Commands::Btc { to, amount } => {
            if let Some(to) = to {
                config.bitcoin.destination = to.clone();
            }
            if let Some(amount) = amount {
                config.bitcoin.amount_sat = *amount;
            }
        }
        Commands::Balances | Commands::Keygen { .. } => {}
    }
    if cli.no_wait {
        config.confirmation.wait = false;
    }

    let wants_bitcoin = matches!(cli.command, Commands::Btc { .. } | Commands::Balances);
    let wants_ethereum = matches!(cli.command, Commands::Eth { .. } | Commands::Balances);

    let shutdown = Arc::new(Shutdown::new());
    spawn_ctrl_c_listener(shutdown.clone());

    let mut sender = Sender::new(Arc::new(config.clone())).with_shutdown(shutdown);
    if wants_bitcoin && config.bitcoin.enabled {
        sender = sender.with_bitcoin(BitcoinBackend::from_client(EsploraClient::from_config(
            &config.bitcoin,
        )));
    }
    if wants_ethereum && config.ethereum.enabled {
        let client = EthereumClient::new(config.ethereum.clone()).await?;
        sender = sender.with_ethereum(EthereumBackend::from_client(client));
    }

    let output = match cli.command {
        Commands::Balances | Commands::Keygen { .. } => {
            serde_json::json!({ "balances": sender.balances().await? })
        }
        Commands::Eth { .. } => {
            if !config.ethereum.enabled {
                return Err("account-chain transfers are disabled in config".into());
            }
            let transfer = EthereumTransfer::from_config(&config)?;
            let before = best_effort_balances(&sender).await;
            let report = sender.send_ether(&transfer).await?;
            let after = best_effort_balances(&sender).await;
            serde_json::json!({
                "balances_before": before,
                "transfer": report,
                "balances_after": after,
            })
        }
        Commands::Btc { .. } => {
            if !config.bitcoin.enabled {
                return Err("UTXO-chain transfers are disabled in config".into());
            }
            let transfer = BitcoinTransfer::from_config(&config)?;
            let before = best_effort_balances(&sender).await;
            let report = sender.send_bitcoin(&transfer).await?;
            let after = best_effort_balances(&sender).await;
            serde_json::json!({
                "balances_before": before,
                "transfer": report,
                "balances_after": after,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Balances for the report; lookup failures are logged and skipped.
async fn best_effort_balances(sender: &Sender) -> Option<Vec<BalanceEntry>> {
    match sender.balances().await {
        Ok(balances) => Some(balances),
        Err(e) => {
            tracing::warn!(error = %e, "Balance lookup failed");
            None
        }
    }
}
