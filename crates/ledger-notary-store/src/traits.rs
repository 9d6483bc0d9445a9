//! Store traits: the abstract interface for ledger persistence.
//!
//! These traits let the ledger be storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use ledger_notary_core::{
    Account, RejectionReason, TimestampField, Transfer, TransferId, TransferState,
};

use crate::error::Result;

/// Result of inserting a record keyed by a unique id or name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateResult {
    /// The record was new and has been written.
    Created,
    /// A record with the same key already exists; nothing was written.
    AlreadyExists,
}

/// A compare-and-swap request on a transfer's `state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// The state the caller last observed.
    pub expected: TransferState,
    /// The state to move to.
    pub to: TransferState,
    /// Timestamp column stamped with `at` when the swap applies.
    pub field: TimestampField,
    /// Unix ms.
    pub at: i64,
    /// Written alongside a move to `rejected`.
    pub reason: Option<RejectionReason>,
    /// Only apply while at least one debit is still unauthorized.
    pub require_unauthorized: bool,
}

impl Transition {
    /// A transition stamping the target state's own timestamp column.
    pub fn new(expected: TransferState, to: TransferState, at: i64) -> Self {
        Self {
            expected,
            to,
            field: to.timestamp_field(),
            at,
            reason: None,
            require_unauthorized: false,
        }
    }

    /// `expected -> rejected`, stamping `rejected_at`.
    pub fn reject(expected: TransferState, at: i64, reason: RejectionReason) -> Self {
        Self::new(expected, TransferState::Rejected, at).with_reason(reason)
    }

    /// `expected -> rejected` for a passed deadline.
    ///
    /// Applies only if the transfer is still waiting on an authorization, so
    /// an authorization that commits first wins over the sweep.
    pub fn expire(expected: TransferState, at: i64) -> Self {
        Self {
            require_unauthorized: true,
            ..Self::reject(expected, at, RejectionReason::Expired)
        }
    }

    pub fn with_reason(mut self, reason: RejectionReason) -> Self {
        self.reason = Some(reason);
        self
    }

    /// Whether the lifecycle allows this edge at all.
    pub fn is_lifecycle_edge(&self) -> bool {
        self.expected.can_transition_to(self.to)
    }

    /// Whether `transfer` satisfies every precondition besides existence.
    pub fn matches(&self, transfer: &Transfer) -> bool {
        transfer.state == self.expected
            && !(self.require_unauthorized && transfer.is_fully_authorized())
    }

    /// Apply the transition to an in-memory record already checked with
    /// [`matches`](Self::matches).
    pub fn apply_to(&self, transfer: &mut Transfer) {
        transfer.state = self.to;
        let slot = match self.field {
            TimestampField::ProposedAt => &mut transfer.proposed_at,
            TimestampField::PreparedAt => &mut transfer.prepared_at,
            TimestampField::ExecutedAt => &mut transfer.executed_at,
            TimestampField::RejectedAt => &mut transfer.rejected_at,
        };
        *slot = Some(self.at);
        if self.to == TransferState::Rejected {
            transfer.rejection_reason = self.reason;
        }
    }
}

/// Outcome of a conditional transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The swap applied; carries the record as committed.
    Applied(Transfer),
    /// The stored record no longer matched the transition's preconditions;
    /// nothing was written. `current` may equal `expected` when an
    /// authorization landed first.
    Conflict {
        /// The state found at apply time.
        current: TransferState,
    },
    /// No transfer with that id.
    Missing,
}

/// Outcome of attaching a debit authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeOutcome {
    /// The artifact was recorded; carries the record as committed.
    Applied(Transfer),
    /// No debit of the transfer draws from that account; nothing was written.
    UnknownDebit,
    /// The transfer is terminal; nothing was written.
    Conflict { current: TransferState },
    /// No transfer with that id.
    Missing,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Async interface for transfer persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` is used internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Create is idempotent by id**: a second create returns `AlreadyExists`.
/// - **State moves only through [`conditional_transition`](Self::conditional_transition)**:
///   a compare-and-swap on `state`, atomic with respect to every other writer
///   of the same backend, including other processes sharing the database.
///   [`authorize_debit`](Self::authorize_debit) is the only other write.
/// - **Writes are bounded by the store**: a write that reports
///   `StoreError::Unavailable` has not committed, and one that committed
///   reports its outcome. Callers do not cancel write futures.
#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Insert a new transfer.
    async fn create_transfer(&self, transfer: &Transfer) -> Result<CreateResult>;

    /// Get a transfer by id.
    async fn get_transfer(&self, id: &TransferId) -> Result<Option<Transfer>>;

    /// Atomically move `id` from `transition.expected` to `transition.to`.
    ///
    /// # Returns
    /// - `Applied` if the stored state equalled `expected` at apply time.
    /// - `Conflict` if it did not (nothing is written).
    /// - `Missing` if there is no such transfer.
    ///
    /// Returns `StoreError::InvalidTransition` if the edge is not part of the
    /// lifecycle, so terminal records can never be rewritten.
    async fn conditional_transition(
        &self,
        id: &TransferId,
        transition: &Transition,
    ) -> Result<TransitionOutcome>;

    /// Attach `artifact` to the unauthorized debits drawn from `account`,
    /// atomically and only while the transfer is non-terminal.
    async fn authorize_debit(
        &self,
        id: &TransferId,
        account: &str,
        artifact: &str,
    ) -> Result<AuthorizeOutcome>;

    /// Transfers matching the expiry predicate at `now`: non-terminal,
    /// `expires_at <= now`, and at least one unauthorized debit. Ordered by
    /// `(expires_at, id)`, at most `limit` of them.
    ///
    /// Transfers without a deadline are never returned.
    async fn list_expiry_candidates(&self, now: i64, limit: usize) -> Result<Vec<Transfer>>;
}

/// Async interface for the account collaborator.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Get an account by name.
    async fn get_account(&self, name: &str) -> Result<Option<Account>>;

    /// Insert the account if no account with that name exists.
    ///
    /// Never modifies an existing account.
    async fn ensure_account(&self, account: &Account) -> Result<CreateResult>;

    /// Create the account if needed, then mark it admin and set its credential.
    ///
    /// Balance of an existing account is left untouched.
    async fn upsert_admin(&self, name: &str, password_hash: &str) -> Result<CreateResult>;
}
