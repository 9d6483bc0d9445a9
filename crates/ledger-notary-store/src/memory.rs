//! In-memory implementation of the store traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence. The compare-and-swap
//! runs under the write lock, which makes it atomic for every caller sharing
//! this instance.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use ledger_notary_core::{Account, Transfer, TransferId};

use crate::error::{Result, StoreError};
use crate::traits::{
    AccountStore, AuthorizeOutcome, CreateResult, TransferStore, Transition, TransitionOutcome,
};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    transfers: HashMap<TransferId, Transfer>,
    accounts: HashMap<String, Account>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransferStore for MemoryStore {
    async fn create_transfer(&self, transfer: &Transfer) -> Result<CreateResult> {
        let mut inner = self.write()?;
        if inner.transfers.contains_key(&transfer.id) {
            return Ok(CreateResult::AlreadyExists);
        }
        inner.transfers.insert(transfer.id, transfer.clone());
        Ok(CreateResult::Created)
    }

    async fn get_transfer(&self, id: &TransferId) -> Result<Option<Transfer>> {
        Ok(self.read()?.transfers.get(id).cloned())
    }

    async fn conditional_transition(
        &self,
        id: &TransferId,
        transition: &Transition,
    ) -> Result<TransitionOutcome> {
        if !transition.is_lifecycle_edge() {
            return Err(StoreError::InvalidTransition {
                from: transition.expected,
                to: transition.to,
            });
        }

        let mut inner = self.write()?;
        let Some(transfer) = inner.transfers.get_mut(id) else {
            return Ok(TransitionOutcome::Missing);
        };

        if !transition.matches(transfer) {
            return Ok(TransitionOutcome::Conflict {
                current: transfer.state,
            });
        }

        transition.apply_to(transfer);
        Ok(TransitionOutcome::Applied(transfer.clone()))
    }

    async fn authorize_debit(
        &self,
        id: &TransferId,
        account: &str,
        artifact: &str,
    ) -> Result<AuthorizeOutcome> {
        let mut inner = self.write()?;
        let Some(transfer) = inner.transfers.get_mut(id) else {
            return Ok(AuthorizeOutcome::Missing);
        };
        if transfer.state.is_terminal() {
            return Ok(AuthorizeOutcome::Conflict {
                current: transfer.state,
            });
        }
        if transfer.authorize_debit(account, artifact) == 0 {
            return Ok(AuthorizeOutcome::UnknownDebit);
        }
        Ok(AuthorizeOutcome::Applied(transfer.clone()))
    }

    async fn list_expiry_candidates(&self, now: i64, limit: usize) -> Result<Vec<Transfer>> {
        let inner = self.read()?;

        let mut candidates: Vec<Transfer> = inner
            .transfers
            .values()
            .filter(|t| t.is_expired(now))
            .cloned()
            .collect();

        candidates.sort_by_key(|t| (t.expires_at, t.id));
        candidates.truncate(limit);
        Ok(candidates)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get_account(&self, name: &str) -> Result<Option<Account>> {
        Ok(self.read()?.accounts.get(name).cloned())
    }

    async fn ensure_account(&self, account: &Account) -> Result<CreateResult> {
        let mut inner = self.write()?;
        if inner.accounts.contains_key(&account.name) {
            return Ok(CreateResult::AlreadyExists);
        }
        inner.accounts.insert(account.name.clone(), account.clone());
        Ok(CreateResult::Created)
    }

    async fn upsert_admin(&self, name: &str, password_hash: &str) -> Result<CreateResult> {
        let mut inner = self.write()?;
        let mut result = CreateResult::AlreadyExists;
        let account = inner.accounts.entry(name.to_string()).or_insert_with(|| {
            result = CreateResult::Created;
            Account::new(name, "0")
        });
        account.is_admin = true;
        account.password_hash = Some(password_hash.to_string());
        Ok(result)
    }
}
