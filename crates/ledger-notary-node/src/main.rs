//! # Ledger Notary Node
//!
//! Entry point for the `ledger-notary-node` binary.
//!
//! - `run`: open the store, start the expiry monitor, serve the HTTP API
//! - `keygen`: print a fresh signing seed and its public key

mod api;
mod cli;
mod error;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use ledger_notary::{Ledger, NotaryConfig};
use ledger_notary_core::Keypair;
use ledger_notary_store::SqliteStore;

use cli::{Commands, NotaryNodeCli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = NotaryNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Keygen => {
            keygen();
            Ok(())
        }
    }
}

async fn run_node(args: cli::RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => NotaryConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => NotaryConfig::default(),
    };
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    logging::init_logging(&config.log_level, config.log_format);

    let notary = config
        .notary_context()
        .context("failed to load signing identity")?;
    tracing::info!(
        signer = %notary.signer(),
        public_key = %notary.public_key().to_hex(),
        "signing identity loaded"
    );

    // --- Store ---
    let ledger_config = config.ledger_config();
    let store = if config.is_memory_database() {
        tracing::warn!("using in-memory database; state is lost on exit");
        SqliteStore::open_memory().context("failed to open in-memory database")?
    } else {
        SqliteStore::open(&config.database)
            .with_context(|| format!("failed to open database at {}", config.database))?
    };
    let store = store
        .with_op_timeout(ledger_config.store_timeout)
        .context("failed to configure database timeout")?;
    tracing::info!(database = %config.database, "database opened");

    // --- Ledger ---
    let ledger = Ledger::with_system_clock(Arc::new(store), Arc::new(notary), ledger_config);
    ledger
        .bootstrap(&config.bootstrap_config())
        .await
        .context("failed to provision accounts")?;

    // --- Expiry monitor ---
    let monitor = Arc::new(ledger.expiry_monitor());
    let monitor_handle = monitor.clone().spawn(config.sweep_interval());

    // --- API server ---
    let router = api::create_router(api::AppState { ledger, monitor });
    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.listen))?;
    tracing::info!(listen = %config.listen, "API server listening");

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    monitor_handle.shutdown().await;
    served.context("API server error")?;

    tracing::info!("ledger-notary-node stopped");
    Ok(())
}

/// Prints a new seed and its public key as YAML, ready for a config file.
fn keygen() {
    let keypair = Keypair::generate();
    println!("signing_seed: {}", hex::encode(keypair.seed()));
    println!("# public_key: {}", keypair.public_key().to_hex());
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// If a handler cannot be installed that branch never completes.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received, draining connections");
}
