//! The Ledger: unified API over the transfer store and the notary key.
//!
//! The Ledger brings together storage, the signing context and a clock. Every
//! state change it makes goes through the store's conditional transition.
//!
//! Reads are bounded by [`LedgerConfig::store_timeout`]. Writes are never
//! cancelled from here: the store bounds them itself, so a write reported as
//! unavailable has not committed and a committed write is never reported as
//! failed.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use ledger_notary_core::{
    build_receipt, validate_account_name, validate_new_transfer, Account, NotaryContext,
    RejectionReason, SignedEnvelope, Transfer, TransferId, TransferState, ValidationError,
    HOLD_ACCOUNT,
};
use ledger_notary_store::{
    AccountStore, AuthorizeOutcome, CreateResult, Result as StoreResult, TransferStore,
    Transition, TransitionOutcome,
};

use crate::clock::{Clock, SystemClock};
use crate::config::{BootstrapConfig, LedgerConfig};
use crate::credential::hash_password;
use crate::error::{LedgerError, Result};
use crate::expiry::ExpiryMonitor;

/// The main Ledger struct.
///
/// Cheap to clone: every field is shared.
pub struct Ledger<S> {
    store: Arc<S>,
    notary: Arc<NotaryContext>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl<S> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            notary: self.notary.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S> Ledger<S>
where
    S: TransferStore + AccountStore + 'static,
{
    /// Create a new ledger instance.
    pub fn new(
        store: Arc<S>,
        notary: Arc<NotaryContext>,
        clock: Arc<dyn Clock>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            store,
            notary,
            clock,
            config,
        }
    }

    /// Create a ledger reading wall-clock time.
    pub fn with_system_clock(
        store: Arc<S>,
        notary: Arc<NotaryContext>,
        config: LedgerConfig,
    ) -> Self {
        Self::new(store, notary, Arc::new(SystemClock), config)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn notary(&self) -> &NotaryContext {
        &self.notary
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// An expiry monitor sharing this ledger's store, key and clock.
    pub fn expiry_monitor(&self) -> ExpiryMonitor<S> {
        ExpiryMonitor::new(self.clone())
    }

    /// Await a store read, failing with `StoreUnavailable` past the timeout.
    pub(crate) async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.config.store_timeout, fut).await {
            Ok(result) => result.map_err(LedgerError::from),
            Err(_) => {
                warn!(
                    op,
                    timeout_ms = self.config.store_timeout.as_millis() as u64,
                    "store call timed out"
                );
                Err(LedgerError::StoreUnavailable(format!(
                    "{op} timed out after {:?}",
                    self.config.store_timeout
                )))
            }
        }
    }

    /// Await a store write to completion.
    ///
    /// Dropping a write future does not stop a commit already handed to the
    /// backend, so past the timeout this only warns and keeps waiting for the
    /// outcome the store reports.
    pub(crate) async fn write<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        tokio::pin!(fut);
        match tokio::time::timeout(self.config.store_timeout, &mut fut).await {
            Ok(result) => result.map_err(LedgerError::from),
            Err(_) => {
                warn!(
                    op,
                    timeout_ms = self.config.store_timeout.as_millis() as u64,
                    "store write slow, awaiting outcome"
                );
                fut.await.map_err(LedgerError::from)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transfer Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a new transfer in `proposed` or `prepared`.
    ///
    /// The timestamp of the initial state is stamped with the current time if
    /// the caller left it empty.
    pub async fn create_transfer(&self, mut transfer: Transfer) -> Result<Transfer> {
        validate_new_transfer(&transfer)?;

        let now = self.now_millis();
        match transfer.state {
            TransferState::Proposed => {
                transfer.proposed_at.get_or_insert(now);
            }
            TransferState::Prepared => {
                transfer.prepared_at.get_or_insert(now);
            }
            TransferState::Executed | TransferState::Rejected => {}
        }

        let created = self
            .write("create_transfer", self.store.create_transfer(&transfer))
            .await?;
        if created == CreateResult::AlreadyExists {
            return Err(LedgerError::AlreadyExists(transfer.id));
        }

        info!(
            transfer_id = %transfer.id,
            state = %transfer.state,
            expires_at = ?transfer.expires_at,
            "transfer created"
        );
        Ok(transfer)
    }

    /// Latest committed record of a transfer.
    pub async fn get_transfer(&self, id: &TransferId) -> Result<Transfer> {
        self.bounded("get_transfer", self.store.get_transfer(id))
            .await?
            .ok_or(LedgerError::NotFound(*id))
    }

    /// A freshly signed envelope attesting the transfer's current state.
    pub async fn get_state(&self, id: &TransferId) -> Result<SignedEnvelope> {
        let transfer = self.get_transfer(id).await?;
        let envelope = build_receipt(&transfer, &self.notary)?;
        debug!(transfer_id = %id, state = %transfer.state, "state notarized");
        Ok(envelope)
    }

    /// Move a `proposed` transfer to `prepared`.
    pub async fn prepare_transfer(&self, id: &TransferId) -> Result<Transfer> {
        let transfer = self.get_transfer(id).await?;
        if transfer.state != TransferState::Proposed {
            return Err(LedgerError::InvalidState {
                id: *id,
                state: transfer.state,
                reason: "only proposed transfers can be prepared",
            });
        }

        let transition = Transition::new(
            TransferState::Proposed,
            TransferState::Prepared,
            self.now_millis(),
        );
        self.apply(&transfer, &transition).await
    }

    /// Attach `artifact` to every unauthorized debit drawn from `account`.
    ///
    /// Accepted until the transfer is terminal, deadline or not. The expiry
    /// monitor re-checks authorization when it applies its rejection, so an
    /// authorization that commits first keeps the transfer alive.
    pub async fn authorize_debit(
        &self,
        id: &TransferId,
        account: &str,
        artifact: &str,
    ) -> Result<Transfer> {
        if artifact.is_empty() {
            return Err(ValidationError::EmptyAuthorization.into());
        }

        let outcome = self
            .write(
                "authorize_debit",
                self.store.authorize_debit(id, account, artifact),
            )
            .await?;

        match outcome {
            AuthorizeOutcome::Applied(committed) => {
                info!(
                    transfer_id = %id,
                    account,
                    unauthorized = committed.unauthorized_debits(),
                    "debit authorized"
                );
                Ok(committed)
            }
            AuthorizeOutcome::UnknownDebit => Err(LedgerError::UnknownDebit {
                id: *id,
                account: account.to_string(),
            }),
            AuthorizeOutcome::Conflict { current } => Err(LedgerError::InvalidState {
                id: *id,
                state: current,
                reason: "terminal transfers cannot be authorized",
            }),
            AuthorizeOutcome::Missing => Err(LedgerError::NotFound(*id)),
        }
    }

    /// Execute a `prepared` transfer whose debits are all authorized.
    ///
    /// Losing a race against the expiry monitor (or another executor) is
    /// reported as [`LedgerError::Conflict`].
    pub async fn execute_transfer(&self, id: &TransferId) -> Result<Transfer> {
        let transfer = self.get_transfer(id).await?;
        if transfer.state != TransferState::Prepared {
            return Err(LedgerError::InvalidState {
                id: *id,
                state: transfer.state,
                reason: "only prepared transfers can be executed",
            });
        }

        let missing: Vec<String> = transfer
            .debits
            .iter()
            .filter(|d| !d.is_authorized())
            .map(|d| d.account.clone())
            .collect();
        if !missing.is_empty() {
            return Err(LedgerError::Unauthorized {
                id: *id,
                accounts: missing,
            });
        }

        let transition = Transition::new(
            TransferState::Prepared,
            TransferState::Executed,
            self.now_millis(),
        );
        self.apply(&transfer, &transition).await
    }

    /// Reject a non-terminal transfer on a participant's request.
    pub async fn cancel_transfer(&self, id: &TransferId) -> Result<Transfer> {
        let transfer = self.get_transfer(id).await?;
        if transfer.state.is_terminal() {
            return Err(LedgerError::InvalidState {
                id: *id,
                state: transfer.state,
                reason: "terminal transfers cannot be cancelled",
            });
        }

        let transition =
            Transition::reject(transfer.state, self.now_millis(), RejectionReason::Cancelled);
        self.apply(&transfer, &transition).await
    }

    async fn apply(&self, observed: &Transfer, transition: &Transition) -> Result<Transfer> {
        let outcome = self
            .write(
                "conditional_transition",
                self.store.conditional_transition(&observed.id, transition),
            )
            .await?;

        match outcome {
            TransitionOutcome::Applied(committed) => {
                info!(
                    transfer_id = %committed.id,
                    from = %transition.expected,
                    to = %committed.state,
                    at = transition.at,
                    "transfer transitioned"
                );
                Ok(committed)
            }
            TransitionOutcome::Conflict { current } => {
                debug!(
                    transfer_id = %observed.id,
                    expected = %transition.expected,
                    current = %current,
                    "transition lost race"
                );
                Err(LedgerError::Conflict {
                    id: observed.id,
                    expected: transition.expected,
                    current,
                })
            }
            TransitionOutcome::Missing => Err(LedgerError::NotFound(observed.id)),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Account Operations
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_account(&self, name: &str) -> Result<Account> {
        self.bounded("get_account", self.store.get_account(name))
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(name.to_string()))
    }

    /// Ensure the `hold` account exists and provision the configured admin.
    ///
    /// Existing accounts keep their balance. Nothing is ever deleted.
    pub async fn bootstrap(&self, config: &BootstrapConfig) -> Result<()> {
        let hold = Account::new(HOLD_ACCOUNT, "0");
        let created = self
            .write("ensure_account", self.store.ensure_account(&hold))
            .await?;
        info!(
            account = HOLD_ACCOUNT,
            created = created == CreateResult::Created,
            "hold account ready"
        );

        if let Some(admin) = &config.admin {
            validate_account_name(&admin.name)?;
            let password_hash = hash_password(&admin.password);
            let created = self
                .write(
                    "upsert_admin",
                    self.store.upsert_admin(&admin.name, &password_hash),
                )
                .await?;
            info!(
                account = %admin.name,
                created = created == CreateResult::Created,
                "admin account provisioned"
            );
        }

        Ok(())
    }
}
