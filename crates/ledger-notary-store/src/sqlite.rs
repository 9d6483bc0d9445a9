//! SQLite implementation of the store traits.
//!
//! This is the primary storage backend for the notary. It uses rusqlite with
//! bundled SQLite, wrapped in async via `tokio::task::spawn_blocking`.
//!
//! The compare-and-swap is a single `UPDATE ... WHERE id = ? AND state = ?`
//! inside an immediate transaction, so it stays atomic when several processes
//! share one database file.
//!
//! Every operation is bounded by the store's operation timeout. A write whose
//! caller has already been told "unavailable" never commits: the worker must
//! pass a commit gate before `COMMIT`, and the caller closes the gate
//! when it gives up.

use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;

use ledger_notary_core::{Account, Credit, Debit, Transfer, TransferId, TransferState};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{
    AccountStore, AuthorizeOutcome, CreateResult, TransferStore, Transition, TransitionOutcome,
};

/// Default bound on one store operation, lock waits included.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

const GATE_PENDING: u8 = 0;
const GATE_COMMITTING: u8 = 1;
const GATE_ABANDONED: u8 = 2;

/// Hand-off between a blocking worker and the caller waiting on it.
///
/// Exactly one side wins: either the worker enters the commit, or the caller
/// abandons the operation first.
#[derive(Clone, Default)]
struct CommitGate(Arc<AtomicU8>);

impl CommitGate {
    fn is_abandoned(&self) -> bool {
        self.0.load(Ordering::Acquire) == GATE_ABANDONED
    }

    /// Claim the right to commit. Fails if the caller already gave up, in
    /// which case the open transaction rolls back on drop.
    fn enter(&self) -> Result<()> {
        self.0
            .compare_exchange(GATE_PENDING, GATE_COMMITTING, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| StoreError::Unavailable("operation abandoned before commit".into()))
    }

    /// Give up on the operation. Returns false if the commit already started.
    fn abandon(&self) -> bool {
        self.0
            .compare_exchange(GATE_PENDING, GATE_ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

const TRANSFER_COLUMNS: &str = "id, debits, credits, state, expires_at, proposed_at, \
     prepared_at, executed_at, rejected_at, rejection_reason";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    op_timeout: Duration,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut conn = Connection::open(path)?;
        conn.busy_timeout(DEFAULT_OP_TIMEOUT)?;
        migration::migrate(&mut conn)?;
        tracing::debug!(path = %path.display(), "opened sqlite store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            op_timeout: DEFAULT_OP_TIMEOUT,
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            op_timeout: DEFAULT_OP_TIMEOUT,
        })
    }

    /// Bound every operation, and SQLite's wait on a locked database, by
    /// `timeout`.
    pub fn with_op_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {e}")))?
            .busy_timeout(timeout)?;
        self.op_timeout = timeout;
        Ok(self)
    }

    /// Run `f` against the connection on the blocking pool.
    ///
    /// If `f` has not entered its commit when the operation timeout fires,
    /// the result is `Unavailable` and nothing is committed. If the commit
    /// already started, the real outcome is awaited and returned.
    async fn run<F, T>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection, &CommitGate) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        let gate = CommitGate::default();
        let worker_gate = gate.clone();

        let mut handle = tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {e}")))?;
            if worker_gate.is_abandoned() {
                return Err(StoreError::Unavailable(
                    "operation abandoned before start".into(),
                ));
            }
            f(&mut conn, &worker_gate)
        });

        let joined = tokio::select! {
            joined = &mut handle => joined,
            _ = tokio::time::sleep(self.op_timeout) => {
                if gate.abandon() {
                    tracing::warn!(
                        op,
                        timeout_ms = self.op_timeout.as_millis() as u64,
                        "sqlite operation timed out"
                    );
                    return Err(StoreError::Unavailable(format!(
                        "{op} timed out after {}ms",
                        self.op_timeout.as_millis()
                    )));
                }
                handle.await
            }
        };
        joined.map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {e}")))?
    }
}

/// Raw column values of one `transfers` row.
struct TransferRow {
    id: String,
    debits: Vec<u8>,
    credits: Vec<u8>,
    state: String,
    expires_at: Option<i64>,
    proposed_at: Option<i64>,
    prepared_at: Option<i64>,
    executed_at: Option<i64>,
    rejected_at: Option<i64>,
    rejection_reason: Option<String>,
}

impl TransferRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            debits: row.get("debits")?,
            credits: row.get("credits")?,
            state: row.get("state")?,
            expires_at: row.get("expires_at")?,
            proposed_at: row.get("proposed_at")?,
            prepared_at: row.get("prepared_at")?,
            executed_at: row.get("executed_at")?,
            rejected_at: row.get("rejected_at")?,
            rejection_reason: row.get("rejection_reason")?,
        })
    }

    fn into_transfer(self) -> Result<Transfer> {
        let id = TransferId::parse(&self.id)
            .map_err(|e| StoreError::InvalidData(format!("transfer id {:?}: {e}", self.id)))?;
        let state = self.state.parse().map_err(StoreError::InvalidData)?;
        let rejection_reason = self
            .rejection_reason
            .map(|r| r.parse())
            .transpose()
            .map_err(StoreError::InvalidData)?;

        Ok(Transfer {
            id,
            debits: decode_cbor::<Vec<Debit>>(&self.debits)?,
            credits: decode_cbor::<Vec<Credit>>(&self.credits)?,
            state,
            expires_at: self.expires_at,
            proposed_at: self.proposed_at,
            prepared_at: self.prepared_at,
            executed_at: self.executed_at,
            rejected_at: self.rejected_at,
            rejection_reason,
        })
    }
}

fn encode_cbor<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

pub(crate) fn decode_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn select_transfer(conn: &Connection, id: &str) -> Result<Option<Transfer>> {
    let row = conn
        .query_row(
            &format!("SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = ?1"),
            params![id],
            TransferRow::read,
        )
        .optional()?;
    row.map(TransferRow::into_transfer).transpose()
}

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        name: row.get("name")?,
        balance: row.get("balance")?,
        password_hash: row.get("password_hash")?,
        is_admin: row.get("is_admin")?,
    })
}

#[async_trait]
impl TransferStore for SqliteStore {
    async fn create_transfer(&self, transfer: &Transfer) -> Result<CreateResult> {
        let transfer = transfer.clone();

        self.run("create_transfer", move |conn, gate| {
            let debits = encode_cbor(&transfer.debits)?;
            let credits = encode_cbor(&transfer.credits)?;

            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO transfers (
                    id, debits, credits, state, expires_at, proposed_at, prepared_at,
                    executed_at, rejected_at, rejection_reason, created_at,
                    unauthorized_debits
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    transfer.id.to_string(),
                    debits,
                    credits,
                    transfer.state.as_str(),
                    transfer.expires_at,
                    transfer.proposed_at,
                    transfer.prepared_at,
                    transfer.executed_at,
                    transfer.rejected_at,
                    transfer.rejection_reason.map(|r| r.as_str()),
                    now_millis(),
                    transfer.unauthorized_debits() as i64,
                ],
            )?;
            gate.enter()?;
            tx.commit()?;

            Ok(if inserted == 0 {
                CreateResult::AlreadyExists
            } else {
                CreateResult::Created
            })
        })
        .await
    }

    async fn get_transfer(&self, id: &TransferId) -> Result<Option<Transfer>> {
        let id = id.to_string();
        self.run("get_transfer", move |conn, _| select_transfer(conn, &id))
            .await
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

        let id = id.to_string();
        let transition = *transition;

        self.run("conditional_transition", move |conn, gate| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            // The column name comes from a closed enum, never from input.
            let sql = format!(
                "UPDATE transfers
                 SET state = ?1,
                     {column} = ?2,
                     rejection_reason = CASE WHEN ?1 = 'rejected' THEN ?3 ELSE rejection_reason END
                 WHERE id = ?4 AND state = ?5 AND (?6 = 0 OR unauthorized_debits > 0)",
                column = transition.field.column(),
            );
            let changed = tx.execute(
                &sql,
                params![
                    transition.to.as_str(),
                    transition.at,
                    transition.reason.map(|r| r.as_str()),
                    id,
                    transition.expected.as_str(),
                    transition.require_unauthorized,
                ],
            )?;

            if changed == 0 {
                let current: Option<String> = tx
                    .query_row(
                        "SELECT state FROM transfers WHERE id = ?1",
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()?;
                return match current {
                    None => Ok(TransitionOutcome::Missing),
                    Some(state) => {
                        let current: TransferState =
                            state.parse().map_err(StoreError::InvalidData)?;
                        Ok(TransitionOutcome::Conflict { current })
                    }
                };
            }

            let committed = select_transfer(&tx, &id)?.ok_or_else(|| {
                StoreError::InvalidData(format!("transfer {id} vanished mid-transition"))
            })?;
            gate.enter()?;
            tx.commit()?;
            Ok(TransitionOutcome::Applied(committed))
        })
        .await
    }

    async fn authorize_debit(
        &self,
        id: &TransferId,
        account: &str,
        artifact: &str,
    ) -> Result<AuthorizeOutcome> {
        let id = id.to_string();
        let account = account.to_string();
        let artifact = artifact.to_string();

        self.run("authorize_debit", move |conn, gate| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(mut transfer) = select_transfer(&tx, &id)? else {
                return Ok(AuthorizeOutcome::Missing);
            };
            if transfer.state.is_terminal() {
                return Ok(AuthorizeOutcome::Conflict {
                    current: transfer.state,
                });
            }
            if transfer.authorize_debit(&account, &artifact) == 0 {
                return Ok(AuthorizeOutcome::UnknownDebit);
            }

            tx.execute(
                "UPDATE transfers SET debits = ?1, unauthorized_debits = ?2 WHERE id = ?3",
                params![
                    encode_cbor(&transfer.debits)?,
                    transfer.unauthorized_debits() as i64,
                    id,
                ],
            )?;
            gate.enter()?;
            tx.commit()?;
            Ok(AuthorizeOutcome::Applied(transfer))
        })
        .await
    }

    async fn list_expiry_candidates(&self, now: i64, limit: usize) -> Result<Vec<Transfer>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.run("list_expiry_candidates", move |conn, _| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TRANSFER_COLUMNS} FROM transfers
                 WHERE state IN ('proposed', 'prepared')
                   AND unauthorized_debits > 0
                   AND expires_at IS NOT NULL
                   AND expires_at <= ?1
                 ORDER BY expires_at, id
                 LIMIT ?2"
            ))?;

            let rows = stmt
                .query_map(params![now, limit], TransferRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter().map(TransferRow::into_transfer).collect()
        })
        .await
    }
}

#[async_trait]
impl AccountStore for SqliteStore {
    async fn get_account(&self, name: &str) -> Result<Option<Account>> {
        let name = name.to_string();
        self.run("get_account", move |conn, _| {
            conn.query_row(
                "SELECT name, balance, password_hash, is_admin FROM accounts WHERE name = ?1",
                params![name],
                row_to_account,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn ensure_account(&self, account: &Account) -> Result<CreateResult> {
        let account = account.clone();
        self.run("ensure_account", move |conn, gate| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO accounts (name, balance, password_hash, is_admin, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    account.name,
                    account.balance,
                    account.password_hash,
                    account.is_admin,
                    now_millis(),
                ],
            )?;
            gate.enter()?;
            tx.commit()?;
            Ok(if inserted == 0 {
                CreateResult::AlreadyExists
            } else {
                CreateResult::Created
            })
        })
        .await
    }

    async fn upsert_admin(&self, name: &str, password_hash: &str) -> Result<CreateResult> {
        let name = name.to_string();
        let password_hash = password_hash.to_string();

        self.run("upsert_admin", move |conn, gate| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO accounts (name, balance, password_hash, is_admin, created_at)
                 VALUES (?1, '0', ?2, 1, ?3)",
                params![name, password_hash, now_millis()],
            )?;
            if inserted == 0 {
                tx.execute(
                    "UPDATE accounts SET password_hash = ?2, is_admin = 1 WHERE name = ?1",
                    params![name, password_hash],
                )?;
            }
            gate.enter()?;
            tx.commit()?;

            Ok(if inserted == 0 {
                CreateResult::AlreadyExists
            } else {
                CreateResult::Created
            })
        })
        .await
    }
}
