//! # CLI Interface
//!
//! Command-line arguments for `ledger-notary-node`, via `clap` derive.
//! Every `run` flag can also come from an environment variable and overrides
//! the matching field of the YAML config file.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use ledger_notary::{LogFormat, NotaryConfig};

/// Ledger notary node.
///
/// Serves signed transfer state receipts over HTTP and rejects expired
/// transfers in the background.
#[derive(Parser, Debug)]
#[command(
    name = "ledger-notary-node",
    about = "Ledger notary node",
    version,
    propagate_version = true
)]
pub struct NotaryNodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Generate a signing seed and print it with its public key.
    Keygen,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Path to a YAML configuration file.
    #[arg(long, short = 'c', env = "LEDGER_NOTARY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Socket address for the HTTP API.
    #[arg(long, env = "LEDGER_NOTARY_LISTEN")]
    pub listen: Option<String>,

    /// SQLite database path, or `:memory:`.
    #[arg(long, env = "LEDGER_NOTARY_DATABASE")]
    pub database: Option<String>,

    /// Hex-encoded 32-byte Ed25519 seed.
    #[arg(long, env = "LEDGER_NOTARY_SIGNING_SEED", hide_env_values = true)]
    pub signing_seed: Option<String>,

    /// Identity URI published as the envelope signer.
    #[arg(long, env = "LEDGER_NOTARY_BASE_URI")]
    pub base_uri: Option<String>,

    /// Milliseconds between expiry sweeps.
    #[arg(long, env = "LEDGER_NOTARY_SWEEP_INTERVAL_MS")]
    pub sweep_interval_ms: Option<u64>,

    /// Upper bound on a single store call, in milliseconds.
    #[arg(long, env = "LEDGER_NOTARY_STORE_TIMEOUT_MS")]
    pub store_timeout_ms: Option<u64>,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, env = "LEDGER_NOTARY_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// `pretty` or `json`.
    #[arg(long, env = "LEDGER_NOTARY_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
}

impl RunArgs {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut NotaryConfig) {
        if let Some(listen) = &self.listen {
            config.listen = listen.clone();
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if let Some(seed) = &self.signing_seed {
            config.signing_seed = Some(seed.clone());
        }
        if let Some(base_uri) = &self.base_uri {
            config.base_uri = base_uri.clone();
        }
        if let Some(ms) = self.sweep_interval_ms {
            config.sweep_interval_ms = ms;
        }
        if let Some(ms) = self.store_timeout_ms {
            config.store_timeout_ms = ms;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
    }
}
