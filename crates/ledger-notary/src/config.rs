//! Notary configuration.
//!
//! [`NotaryConfig`] is read from YAML at startup, overridden from the command
//! line, and then frozen into a [`NotaryContext`], a [`LedgerConfig`] and a
//! [`BootstrapConfig`]. Nothing reads it after that.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ledger_notary_core::{validate_account_name, CoreError, Keypair, NotaryContext};

/// Errors raised while loading or checking configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("signing_seed is required")]
    MissingSigningSeed,

    #[error("invalid signing_seed: {0}")]
    InvalidSigningSeed(#[source] CoreError),

    #[error("invalid {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output for development.
    #[default]
    Pretty,
    /// One JSON object per line for log aggregation.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other} (expected pretty or json)")),
        }
    }
}

/// An administrator account provisioned at startup.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminConfig {
    pub name: String,
    pub password: String,
}

impl fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminConfig")
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Top-level node configuration.
///
/// Every field has a default except `signing_seed`, which must be supplied
/// either in the file or on the command line.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotaryConfig {
    /// Identity URI written into every envelope's `signer` field.
    pub base_uri: String,
    /// 32-byte Ed25519 seed, hex encoded.
    pub signing_seed: Option<String>,
    /// Socket address for the HTTP API.
    pub listen: String,
    /// SQLite file path, or `:memory:`.
    pub database: String,
    pub sweep_interval_ms: u64,
    pub store_timeout_ms: u64,
    /// Maximum transfers examined per sweep.
    pub sweep_batch_size: usize,
    pub admin: Option<AdminConfig>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for NotaryConfig {
    fn default() -> Self {
        Self {
            base_uri: "urn:ledger-notary:local".to_string(),
            signing_seed: None,
            listen: "127.0.0.1:8080".to_string(),
            database: "ledger-notary.db".to_string(),
            sweep_interval_ms: 1_000,
            store_timeout_ms: 5_000,
            sweep_batch_size: 500,
            admin: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl fmt::Debug for NotaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotaryConfig")
            .field("base_uri", &self.base_uri)
            .field("signing_seed", &self.signing_seed.as_ref().map(|_| "<redacted>"))
            .field("listen", &self.listen)
            .field("database", &self.database)
            .field("sweep_interval_ms", &self.sweep_interval_ms)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("sweep_batch_size", &self.sweep_batch_size)
            .field("admin", &self.admin)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl NotaryConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Check value ranges and formats.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_uri.trim().is_empty() {
            return Err(invalid("base_uri", "must not be empty"));
        }
        if self.sweep_interval_ms == 0 {
            return Err(invalid("sweep_interval_ms", "must be greater than zero"));
        }
        if self.store_timeout_ms == 0 {
            return Err(invalid("store_timeout_ms", "must be greater than zero"));
        }
        if self.sweep_batch_size == 0 {
            return Err(invalid("sweep_batch_size", "must be greater than zero"));
        }
        if let Some(admin) = &self.admin {
            validate_account_name(&admin.name)
                .map_err(|e| invalid("admin.name", e.to_string()))?;
            if admin.password.is_empty() {
                return Err(invalid("admin.password", "must not be empty"));
            }
        }
        Ok(())
    }

    /// Build the signing identity. Fails if the seed is absent or malformed.
    pub fn notary_context(&self) -> Result<NotaryContext, ConfigError> {
        let seed = self
            .signing_seed
            .as_deref()
            .ok_or(ConfigError::MissingSigningSeed)?;
        let keypair = Keypair::from_hex_seed(seed.trim()).map_err(ConfigError::InvalidSigningSeed)?;
        Ok(NotaryContext::new(keypair, self.base_uri.clone()))
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            sweep_batch_size: self.sweep_batch_size,
        }
    }

    pub fn bootstrap_config(&self) -> BootstrapConfig {
        BootstrapConfig {
            admin: self.admin.clone(),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Whether the store should live in memory only.
    pub fn is_memory_database(&self) -> bool {
        self.database == ":memory:"
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

/// Runtime knobs for [`Ledger`](crate::Ledger).
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Upper bound on any single store call.
    pub store_timeout: Duration,
    /// Maximum expiry candidates fetched per sweep.
    pub sweep_batch_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            sweep_batch_size: 500,
        }
    }
}

/// Accounts provisioned by [`Ledger::bootstrap`](crate::Ledger::bootstrap).
#[derive(Debug, Clone, Default)]
pub struct BootstrapConfig {
    pub admin: Option<AdminConfig>,
}
