//! Expiry monitor.
//!
//! A sweep finds non-terminal transfers whose deadline has passed while at
//! least one debit is still unauthorized, and moves each one to `rejected`
//! with a conditional transition. Every transition it wins is notarized and
//! published on a broadcast channel.
//!
//! The store filters on the full predicate, so fully authorized transfers
//! never occupy a batch. A sweep keeps fetching batches while they come back
//! full and the previous one settled something.
//!
//! ## Races
//!
//! The monitor reads a candidate, then asks the store to swap `current ->
//! rejected` on condition that a debit is still unauthorized. If an executor,
//! an authorization or another sweep got there first the store answers
//! `Conflict` and the monitor simply counts it. Nothing is reported as an
//! error, so sweeps may overlap freely.
//!
//! ## Shutdown
//!
//! [`ExpiryMonitor::spawn`] runs sweeps on an interval until the returned
//! [`MonitorHandle`] is shut down. The loop only checks for shutdown between
//! sweeps; since each transition is a single compare-and-swap no transfer is
//! ever left half-written.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use ledger_notary_core::{build_receipt, SignedEnvelope, Transfer};
use ledger_notary_store::{AccountStore, TransferStore, Transition, TransitionOutcome};

use crate::error::Result;
use crate::ledger::Ledger;

/// Buffered envelopes per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 256;

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Candidates returned by the store, over all batches.
    pub scanned: usize,
    /// Transitions this sweep won.
    pub rejected: usize,
    /// Candidates already settled by someone else.
    pub conflicts: usize,
    /// Candidates that no longer matched the expiry predicate when checked.
    pub skipped: usize,
}

/// Rejects expired transfers and publishes their receipts.
pub struct ExpiryMonitor<S> {
    ledger: Ledger<S>,
    events: broadcast::Sender<SignedEnvelope>,
}

impl<S> ExpiryMonitor<S>
where
    S: TransferStore + AccountStore + 'static,
{
    pub fn new(ledger: Ledger<S>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { ledger, events }
    }

    /// Receive an envelope for every transfer this monitor rejects from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SignedEnvelope> {
        self.events.subscribe()
    }

    /// Run one pass.
    ///
    /// Store failures abort the pass and are returned; everything already
    /// rejected stays rejected. A signing failure after a won transition is
    /// also returned, and the rejection stands: `get_state` re-notarizes it.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let now = self.ledger.now_millis();
        let limit = self.ledger.config().sweep_batch_size.max(1);
        let mut report = SweepReport::default();

        loop {
            let batch = self
                .ledger
                .bounded(
                    "list_expiry_candidates",
                    self.ledger.store().list_expiry_candidates(now, limit),
                )
                .await?;
            let full = batch.len() == limit;
            let settled_before = report.rejected + report.conflicts;
            report.scanned += batch.len();

            for candidate in batch {
                self.expire(candidate, now, &mut report).await?;
            }

            // Settled transfers leave the candidate set, so the next batch is new work.
            if !full || report.rejected + report.conflicts == settled_before {
                break;
            }
        }

        if report.scanned > 0 {
            info!(
                scanned = report.scanned,
                rejected = report.rejected,
                conflicts = report.conflicts,
                skipped = report.skipped,
                "expiry sweep complete"
            );
        }
        Ok(report)
    }

    async fn expire(&self, candidate: Transfer, now: i64, report: &mut SweepReport) -> Result<()> {
        if !candidate.is_expired(now) {
            report.skipped += 1;
            return Ok(());
        }

        let transition = Transition::expire(candidate.state, now);
        let outcome = self
            .ledger
            .write(
                "conditional_transition",
                self.ledger
                    .store()
                    .conditional_transition(&candidate.id, &transition),
            )
            .await?;

        match outcome {
            TransitionOutcome::Applied(committed) => {
                report.rejected += 1;
                info!(
                    transfer_id = %committed.id,
                    from = %candidate.state,
                    expires_at = ?committed.expires_at,
                    rejected_at = now,
                    "transfer expired"
                );

                let envelope = build_receipt(&committed, self.ledger.notary())?;
                // No subscribers is fine.
                let _ = self.events.send(envelope);
            }
            TransitionOutcome::Conflict { current } => {
                report.conflicts += 1;
                debug!(
                    transfer_id = %candidate.id,
                    observed = %candidate.state,
                    current = %current,
                    "expiry lost race"
                );
            }
            TransitionOutcome::Missing => {
                report.conflicts += 1;
                warn!(transfer_id = %candidate.id, "expiry candidate vanished");
            }
        }
        Ok(())
    }

    /// Run [`sweep`](Self::sweep) every `interval` on a background task.
    ///
    /// A failed sweep is logged and the next tick tries again.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> MonitorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "expiry monitor starting");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep().await {
                            error!(error = %e, "expiry sweep failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("expiry monitor stopped");
        });

        MonitorHandle { shutdown_tx, task }
    }
}

/// Handle to a running monitor task.
pub struct MonitorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Ask the loop to stop and wait for the in-flight sweep to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "expiry monitor task panicked");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::LedgerConfig;
    use ledger_notary_core::{
        Credit, Debit, Keypair, NotaryContext, RejectionReason, TransferId, TransferState,
    };
    use ledger_notary_store::MemoryStore;

    const T0: i64 = 1_700_000_000_000;

    fn setup() -> (Ledger<MemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        let notary = NotaryContext::new(Keypair::from_seed(&[2u8; 32]), "https://notary.test");
        let ledger = Ledger::new(
            Arc::new(MemoryStore::new()),
            Arc::new(notary),
            clock.clone(),
            LedgerConfig::default(),
        );
        (ledger, clock)
    }

    fn setup_with_batch(sweep_batch_size: usize) -> (Ledger<MemoryStore>, Arc<ManualClock>) {
        let (ledger, clock) = setup();
        let config = LedgerConfig {
            sweep_batch_size,
            ..LedgerConfig::default()
        };
        let ledger = Ledger::new(
            ledger.store().clone(),
            Arc::new(ledger.notary().clone()),
            clock.clone(),
            config,
        );
        (ledger, clock)
    }

    fn expiring(authorized: bool, expires_at: i64) -> Transfer {
        let debit = Debit::new("alice", "10");
        let debit = if authorized { debit.authorized("sig") } else { debit };
        Transfer::new(TransferId::new_v4(), vec![debit], vec![Credit::new("bob", "10")])
            .expires_at(expires_at)
    }

    #[tokio::test]
    async fn test_sweep_rejects_expired_and_publishes() {
        let (ledger, clock) = setup();
        let monitor = ledger.expiry_monitor();
        let mut events = monitor.subscribe();

        let t = ledger.create_transfer(expiring(false, T0 + 100)).await.unwrap();

        assert_eq!(monitor.sweep().await.unwrap(), SweepReport::default());

        clock.advance(100);
        let report = monitor.sweep().await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.rejected, 1);

        let stored = ledger.get_transfer(&t.id).await.unwrap();
        assert_eq!(stored.state, TransferState::Rejected);
        assert_eq!(stored.rejected_at, Some(T0 + 100));
        assert_eq!(stored.rejection_reason, Some(RejectionReason::Expired));

        let envelope = events.try_recv().unwrap();
        assert_eq!(envelope.message.id, t.id);
        assert_eq!(envelope.message.state, TransferState::Rejected);
        envelope.verify().unwrap();
    }

    #[tokio::test]
    async fn test_second_sweep_is_a_no_op() {
        let (ledger, clock) = setup();
        let monitor = ledger.expiry_monitor();
        let t = ledger.create_transfer(expiring(false, T0)).await.unwrap();

        assert_eq!(monitor.sweep().await.unwrap().rejected, 1);
        let after_first = ledger.get_transfer(&t.id).await.unwrap();

        clock.advance(1_000);
        assert_eq!(monitor.sweep().await.unwrap(), SweepReport::default());
        assert_eq!(ledger.get_transfer(&t.id).await.unwrap(), after_first);
    }

    #[tokio::test]
    async fn test_fully_authorized_transfer_is_not_a_candidate() {
        let (ledger, clock) = setup();
        let monitor = ledger.expiry_monitor();
        let t = ledger.create_transfer(expiring(true, T0)).await.unwrap();

        clock.advance(10);
        assert_eq!(monitor.sweep().await.unwrap(), SweepReport::default());
        assert_eq!(
            ledger.get_transfer(&t.id).await.unwrap().state,
            TransferState::Prepared
        );
    }

    #[tokio::test]
    async fn test_sweep_drains_past_one_batch() {
        let (ledger, clock) = setup_with_batch(2);
        let monitor = ledger.expiry_monitor();
        for offset in 0..5 {
            ledger
                .create_transfer(expiring(false, T0 + offset))
                .await
                .unwrap();
        }

        clock.advance(10);
        let report = monitor.sweep().await.unwrap();
        assert_eq!(report.rejected, 5);
        assert_eq!(report.scanned, 5);
        assert_eq!(monitor.sweep().await.unwrap(), SweepReport::default());
    }

    #[tokio::test]
    async fn test_no_deadline_never_expires() {
        let (ledger, clock) = setup();
        let monitor = ledger.expiry_monitor();
        let t = Transfer::new(
            TransferId::new_v4(),
            vec![Debit::new("alice", "1")],
            vec![Credit::new("bob", "1")],
        );
        ledger.create_transfer(t).await.unwrap();

        clock.advance(i64::from(u32::MAX));
        assert_eq!(monitor.sweep().await.unwrap().scanned, 0);
    }

    #[tokio::test]
    async fn test_proposed_transfer_expires() {
        let (ledger, _) = setup();
        let monitor = ledger.expiry_monitor();
        let t = ledger
            .create_transfer(expiring(false, T0).with_state(TransferState::Proposed))
            .await
            .unwrap();

        assert_eq!(monitor.sweep().await.unwrap().rejected, 1);
        let stored = ledger.get_transfer(&t.id).await.unwrap();
        assert_eq!(stored.state, TransferState::Rejected);
        assert_eq!(stored.proposed_at, Some(T0));
    }

    #[tokio::test]
    async fn test_spawned_monitor_sweeps_and_shuts_down() {
        let (ledger, _) = setup();
        let monitor = Arc::new(ledger.expiry_monitor());
        let mut events = monitor.subscribe();
        let t = ledger.create_transfer(expiring(false, T0)).await.unwrap();

        let handle = monitor.clone().spawn(Duration::from_millis(10));
        let envelope = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(envelope.message.id, t.id);

        handle.shutdown().await;
    }
}
