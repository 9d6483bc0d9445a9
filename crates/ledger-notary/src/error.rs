//! Error types for ledger operations.

use ledger_notary_core::{CoreError, TransferId, TransferState, ValidationError};
use ledger_notary_store::StoreError;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No transfer with that id.
    #[error("transfer not found: {0}")]
    NotFound(TransferId),

    /// No account with that name.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// A transfer with that id was already recorded.
    #[error("transfer already exists: {0}")]
    AlreadyExists(TransferId),

    /// Another writer moved the transfer first.
    #[error("transfer {id} changed concurrently: expected {expected}, found {current}")]
    Conflict {
        id: TransferId,
        expected: TransferState,
        current: TransferState,
    },

    /// The operation is not allowed from the transfer's current state.
    #[error("transfer {id} is {state}: {reason}")]
    InvalidState {
        id: TransferId,
        state: TransferState,
        reason: &'static str,
    },

    /// No debit of the transfer draws from that account.
    #[error("transfer {id} has no debit from account {account}")]
    UnknownDebit { id: TransferId, account: String },

    /// At least one debit lacks an authorization artifact.
    #[error("transfer {id} has unauthorized debits: {accounts:?}")]
    Unauthorized { id: TransferId, accounts: Vec<String> },

    /// The submitted record is malformed.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Canonicalization or signing failed; no envelope was produced.
    #[error("receipt error: {0}")]
    Receipt(#[from] CoreError),

    /// The store did not answer in time or could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Any other storage failure.
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
            other => Self::Store(other),
        }
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
