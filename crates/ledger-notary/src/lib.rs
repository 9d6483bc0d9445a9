//! # Ledger Notary
//!
//! Signed state receipts for ledger transfers, an expiry monitor that rejects
//! transfers whose deadline passed before every debit was authorized, and the
//! fulfillment path that executes authorized ones.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ledger_notary::{Ledger, LedgerConfig};
//! use ledger_notary_core::{Credit, Debit, Keypair, NotaryContext, Transfer, TransferId};
//! use ledger_notary_store::SqliteStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let notary = NotaryContext::new(Keypair::generate(), "https://notary.example.com");
//!     let store = Arc::new(SqliteStore::open("notary.db")?);
//!     let ledger = Ledger::with_system_clock(store, Arc::new(notary), LedgerConfig::default());
//!
//!     let transfer = Transfer::new(
//!         TransferId::new_v4(),
//!         vec![Debit::new("alice", "10")],
//!         vec![Credit::new("bob", "10")],
//!     )
//!     .expires_at(ledger.now_millis() + 60_000);
//!     let transfer = ledger.create_transfer(transfer).await?;
//!
//!     let envelope = ledger.get_state(&transfer.id).await?;
//!     envelope.verify()?;
//!
//!     let report = ledger.expiry_monitor().sweep().await?;
//!     println!("rejected {}", report.rejected);
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod expiry;
pub mod ledger;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AdminConfig, BootstrapConfig, ConfigError, LedgerConfig, LogFormat, NotaryConfig};
pub use error::{LedgerError, Result};
pub use expiry::{ExpiryMonitor, MonitorHandle, SweepReport};
pub use ledger::Ledger;
