//! # Ledger Notary Store
//!
//! Persistence for transfers and accounts behind the [`TransferStore`] and
//! [`AccountStore`] traits, with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`TransferStore`] - Create, read, compare-and-swap, expiry scan
//! - [`AccountStore`] - Account lookup and bootstrap writes
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`Transition`] / [`TransitionOutcome`] - The conditional update and its result
//! - [`AuthorizeOutcome`] - Result of attaching a debit authorization
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ledger_notary_core::{RejectionReason, TransferId, TransferState};
//! use ledger_notary_store::{SqliteStore, TransferStore, Transition, TransitionOutcome};
//!
//! async fn example(id: TransferId, now: i64) -> ledger_notary_store::Result<()> {
//!     let store = SqliteStore::open("notary.db")?;
//!
//!     let reject = Transition::reject(TransferState::Prepared, now, RejectionReason::Expired);
//!     match store.conditional_transition(&id, &reject).await? {
//!         TransitionOutcome::Applied(transfer) => println!("rejected {}", transfer.id),
//!         TransitionOutcome::Conflict { current } => println!("lost race, now {current}"),
//!         TransitionOutcome::Missing => println!("no such transfer"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent creates**: creating the same id twice returns `AlreadyExists`
//! - **Single state path**: state only changes through a conditional transition
//! - **Terminal is final**: transitions out of `executed`/`rejected` are refused
//! - **Bounded writes**: a write reported unavailable never commits

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    AccountStore, AuthorizeOutcome, CreateResult, TransferStore, Transition, TransitionOutcome,
};
