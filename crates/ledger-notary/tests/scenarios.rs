//! End-to-end scenarios over both store backends.

use std::sync::Arc;
use std::time::Duration;

use ledger_notary::{Ledger, LedgerConfig, LedgerError, ManualClock, SweepReport};
use ledger_notary_core::{
    Credit, Debit, Keypair, NotaryContext, RejectionReason, SignedEnvelope, StateReceipt,
    Transfer, TransferId, TransferState,
};
use ledger_notary_store::{AccountStore, MemoryStore, SqliteStore, TransferStore};

const T0: i64 = 1_700_000_000_000;
const SEED: [u8; 32] = [42u8; 32];

fn ledger_with<S>(store: S) -> (Ledger<S>, Arc<ManualClock>)
where
    S: TransferStore + AccountStore + 'static,
{
    ledger_with_config(store, LedgerConfig::default())
}

fn ledger_with_config<S>(store: S, config: LedgerConfig) -> (Ledger<S>, Arc<ManualClock>)
where
    S: TransferStore + AccountStore + 'static,
{
    let clock = Arc::new(ManualClock::new(T0));
    let notary = NotaryContext::new(Keypair::from_seed(&SEED), "https://notary.example.com");
    let ledger = Ledger::new(Arc::new(store), Arc::new(notary), clock.clone(), config);
    (ledger, clock)
}

fn unauthorized_transfer(expires_at: i64) -> Transfer {
    Transfer::new(
        TransferId::new_v4(),
        vec![Debit::new("alice", "25.00")],
        vec![Credit::new("bob", "25.00")],
    )
    .expires_at(expires_at)
}

fn authorized_transfer(expires_at: i64) -> Transfer {
    Transfer::new(
        TransferId::new_v4(),
        vec![Debit::new("alice", "25.00").authorized("alice-signature")],
        vec![Credit::new("bob", "25.00")],
    )
    .expires_at(expires_at)
}

fn assert_attests(envelope: &SignedEnvelope, id: TransferId, state: TransferState) {
    assert_eq!(envelope.message, StateReceipt::new(id, state));
    assert_eq!(envelope.algorithm, "ed25519-sha512");
    assert_eq!(
        envelope.public_key,
        Keypair::from_seed(&SEED).public_key().to_hex()
    );
    envelope.verify().unwrap();
}

async fn expiry_end_to_end<S>(store: S)
where
    S: TransferStore + AccountStore + 'static,
{
    let (ledger, clock) = ledger_with(store);
    let monitor = ledger.expiry_monitor();
    let mut events = monitor.subscribe();

    let t = ledger
        .create_transfer(unauthorized_transfer(T0 + 100))
        .await
        .unwrap();
    assert_attests(
        &ledger.get_state(&t.id).await.unwrap(),
        t.id,
        TransferState::Prepared,
    );

    clock.advance(100);
    let report = monitor.sweep().await.unwrap();
    assert_eq!(report.rejected, 1);

    let envelope = ledger.get_state(&t.id).await.unwrap();
    assert_attests(&envelope, t.id, TransferState::Rejected);
    assert_eq!(events.try_recv().unwrap(), envelope);

    let stored = ledger.get_transfer(&t.id).await.unwrap();
    assert_eq!(stored.rejected_at, Some(T0 + 100));
    assert_eq!(stored.rejection_reason, Some(RejectionReason::Expired));
}

#[tokio::test]
async fn test_expiry_end_to_end_memory() {
    expiry_end_to_end(MemoryStore::new()).await;
}

#[tokio::test]
async fn test_expiry_end_to_end_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    expiry_end_to_end(SqliteStore::open(dir.path().join("notary.db")).unwrap()).await;
}

#[tokio::test]
async fn test_executed_transfer_survives_later_sweeps() {
    let (ledger, clock) = ledger_with(SqliteStore::open_memory().unwrap());
    let monitor = ledger.expiry_monitor();

    let t = ledger
        .create_transfer(authorized_transfer(T0 + 50))
        .await
        .unwrap();
    let executed = ledger.execute_transfer(&t.id).await.unwrap();
    assert_eq!(executed.executed_at, Some(T0));

    for _ in 0..3 {
        clock.advance(1_000);
        assert_eq!(monitor.sweep().await.unwrap(), SweepReport::default());
    }

    assert_eq!(ledger.get_transfer(&t.id).await.unwrap(), executed);
    assert_attests(
        &ledger.get_state(&t.id).await.unwrap(),
        t.id,
        TransferState::Executed,
    );
}

#[tokio::test]
async fn test_expired_transfer_cannot_execute() {
    let (ledger, clock) = ledger_with(MemoryStore::new());
    let monitor = ledger.expiry_monitor();

    let t = ledger
        .create_transfer(unauthorized_transfer(T0 + 10))
        .await
        .unwrap();
    clock.advance(10);
    monitor.sweep().await.unwrap();

    assert!(matches!(
        ledger.execute_transfer(&t.id).await,
        Err(LedgerError::InvalidState {
            state: TransferState::Rejected,
            ..
        })
    ));
}

#[tokio::test]
async fn test_receipt_is_deterministic() {
    let (ledger, _) = ledger_with(MemoryStore::new());
    let t = ledger
        .create_transfer(unauthorized_transfer(T0 + 10))
        .await
        .unwrap();

    let first = ledger.get_state(&t.id).await.unwrap();
    let second = ledger.get_state(&t.id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.message.digest().unwrap().to_hex(),
        StateReceipt::new(t.id, TransferState::Prepared)
            .digest()
            .unwrap()
            .to_hex()
    );
}

#[tokio::test]
async fn test_state_query_unknown_id() {
    let (ledger, _) = ledger_with(SqliteStore::open_memory().unwrap());
    let id = TransferId::new_v4();
    assert!(matches!(
        ledger.get_state(&id).await,
        Err(LedgerError::NotFound(missing)) if missing == id
    ));
}

/// A participant cancels an expired transfer while a sweep is running.
/// Exactly one rejection commits, and the loser learns who won.
async fn cancel_vs_sweep<S>(store: S)
where
    S: TransferStore + AccountStore + 'static,
{
    let (ledger, clock) = ledger_with(store);
    let monitor = Arc::new(ledger.expiry_monitor());

    let t = ledger
        .create_transfer(unauthorized_transfer(T0 + 10))
        .await
        .unwrap();
    clock.advance(10);

    let sweep = {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.sweep().await })
    };
    let cancel = {
        let ledger = ledger.clone();
        let id = t.id;
        tokio::spawn(async move { ledger.cancel_transfer(&id).await })
    };

    let report = sweep.await.unwrap().unwrap();
    let cancelled = cancel.await.unwrap();

    let stored = ledger.get_transfer(&t.id).await.unwrap();
    assert_eq!(stored.state, TransferState::Rejected);

    match cancelled {
        Ok(committed) => {
            assert_eq!(committed.rejection_reason, Some(RejectionReason::Cancelled));
            assert_eq!(report.rejected, 0);
            assert_eq!(stored, committed);
        }
        Err(LedgerError::Conflict { current, .. })
        | Err(LedgerError::InvalidState { state: current, .. }) => {
            assert_eq!(current, TransferState::Rejected);
            assert_eq!(report.rejected, 1);
            assert_eq!(stored.rejection_reason, Some(RejectionReason::Expired));
        }
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_race_memory_store_single_winner() {
    for _ in 0..25 {
        cancel_vs_sweep(MemoryStore::new()).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_race_sqlite_store_single_winner() {
    for _ in 0..10 {
        cancel_vs_sweep(SqliteStore::open_memory().unwrap()).await;
    }
}

#[tokio::test]
async fn test_execute_loses_to_sweep_with_conflict() {
    // An executor that read `prepared` before the sweep committed.
    let (ledger, clock) = ledger_with(MemoryStore::new());
    let monitor = ledger.expiry_monitor();

    let stale = ledger
        .create_transfer(unauthorized_transfer(T0))
        .await
        .unwrap();
    clock.advance(1);
    assert_eq!(monitor.sweep().await.unwrap().rejected, 1);

    let transition = ledger_notary_store::Transition::new(
        TransferState::Prepared,
        TransferState::Executed,
        clock.advance(1),
    );
    let outcome = ledger
        .store()
        .conditional_transition(&stale.id, &transition)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ledger_notary_store::TransitionOutcome::Conflict {
            current: TransferState::Rejected
        }
    );
    assert_eq!(
        ledger.get_transfer(&stale.id).await.unwrap().executed_at,
        None
    );
}

/// Authorized transfers with early deadlines fill more than a whole batch;
/// the one transfer that can actually expire must still be rejected.
async fn authorized_backlog_does_not_starve<S>(store: S)
where
    S: TransferStore + AccountStore + 'static,
{
    let config = LedgerConfig {
        sweep_batch_size: 2,
        ..LedgerConfig::default()
    };
    let (ledger, clock) = ledger_with_config(store, config);
    let monitor = ledger.expiry_monitor();

    for _ in 0..3 {
        ledger.create_transfer(authorized_transfer(T0)).await.unwrap();
    }
    let victim = ledger
        .create_transfer(unauthorized_transfer(T0 + 1))
        .await
        .unwrap();

    clock.advance(10);
    let report = monitor.sweep().await.unwrap();
    assert_eq!(report.rejected, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(
        ledger.get_transfer(&victim.id).await.unwrap().state,
        TransferState::Rejected
    );
}

#[tokio::test]
async fn test_authorized_backlog_memory() {
    authorized_backlog_does_not_starve(MemoryStore::new()).await;
}

#[tokio::test]
async fn test_authorized_backlog_sqlite() {
    authorized_backlog_does_not_starve(SqliteStore::open_memory().unwrap()).await;
}

/// A participant authorizes then executes a past-deadline transfer while a
/// sweep runs. Exactly one of `executed` and `rejected` commits.
async fn authorize_execute_vs_sweep<S>(store: S)
where
    S: TransferStore + AccountStore + 'static,
{
    let (ledger, clock) = ledger_with(store);
    let monitor = Arc::new(ledger.expiry_monitor());

    let t = ledger
        .create_transfer(unauthorized_transfer(T0 + 10))
        .await
        .unwrap();
    clock.advance(10);

    let sweep = {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.sweep().await })
    };
    let fulfil = {
        let ledger = ledger.clone();
        let id = t.id;
        tokio::spawn(async move {
            ledger.authorize_debit(&id, "alice", "alice-signature").await?;
            ledger.execute_transfer(&id).await
        })
    };

    let report = sweep.await.unwrap().unwrap();
    let fulfilled = fulfil.await.unwrap();
    let stored = ledger.get_transfer(&t.id).await.unwrap();

    match fulfilled {
        Ok(executed) => {
            assert_eq!(report.rejected, 0);
            assert_eq!(stored, executed);
            assert_eq!(stored.state, TransferState::Executed);
            assert_eq!(stored.rejected_at, None);
        }
        Err(LedgerError::Conflict { current, .. })
        | Err(LedgerError::InvalidState { state: current, .. }) => {
            assert_eq!(current, TransferState::Rejected);
            assert_eq!(report.rejected, 1);
            assert_eq!(stored.state, TransferState::Rejected);
            assert_eq!(stored.rejection_reason, Some(RejectionReason::Expired));
            assert_eq!(stored.executed_at, None);
        }
        Err(other) => panic!("unexpected error: {other}"),
    }
    assert_attests(&ledger.get_state(&t.id).await.unwrap(), t.id, stored.state);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_authorize_race_memory_store_single_winner() {
    for _ in 0..25 {
        authorize_execute_vs_sweep(MemoryStore::new()).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_authorize_race_sqlite_store_single_winner() {
    for _ in 0..10 {
        authorize_execute_vs_sweep(SqliteStore::open_memory().unwrap()).await;
    }
}

#[tokio::test]
async fn test_authorization_after_expiry_is_refused() {
    let (ledger, clock) = ledger_with(SqliteStore::open_memory().unwrap());
    let monitor = ledger.expiry_monitor();
    let t = ledger
        .create_transfer(unauthorized_transfer(T0 + 10))
        .await
        .unwrap();

    clock.advance(10);
    assert_eq!(monitor.sweep().await.unwrap().rejected, 1);
    assert!(matches!(
        ledger.authorize_debit(&t.id, "alice", "too-late").await,
        Err(LedgerError::InvalidState {
            state: TransferState::Rejected,
            ..
        })
    ));
    assert_eq!(
        ledger.get_transfer(&t.id).await.unwrap().debits[0].authorization,
        None
    );
}

/// Another process holds the write lock past the store's timeout. The write
/// reports unavailable, nothing commits, and a retry succeeds.
#[tokio::test]
async fn test_locked_database_write_is_unavailable_and_retryable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notary.db");
    let store = SqliteStore::open(&path)
        .unwrap()
        .with_op_timeout(Duration::from_millis(200))
        .unwrap();
    let (ledger, _) = ledger_with(store);
    let t = ledger
        .create_transfer(authorized_transfer(T0 + 1_000))
        .await
        .unwrap();

    let blocker = rusqlite::Connection::open(&path).unwrap();
    blocker.execute_batch("BEGIN IMMEDIATE").unwrap();

    assert!(matches!(
        ledger.execute_transfer(&t.id).await,
        Err(LedgerError::StoreUnavailable(_))
    ));

    blocker.execute_batch("COMMIT").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let stored = ledger.get_transfer(&t.id).await.unwrap();
    assert_eq!(stored.state, TransferState::Prepared);
    assert_eq!(stored.executed_at, None);
    assert_eq!(
        ledger.execute_transfer(&t.id).await.unwrap().state,
        TransferState::Executed
    );
}
