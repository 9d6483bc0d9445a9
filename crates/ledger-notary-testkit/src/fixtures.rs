//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a ledger over a memory store,
//! driven by a manual clock so expiry can be stepped deterministically.

use std::sync::Arc;

use ledger_notary::{ExpiryMonitor, Ledger, LedgerConfig, ManualClock};
use ledger_notary_core::{
    Credit, Debit, Ed25519PublicKey, Keypair, NotaryContext, Transfer, TransferId, TransferState,
};
use ledger_notary_store::MemoryStore;

/// Start time of every fixture clock: 2023-11-14T22:13:20Z.
pub const FIXTURE_EPOCH_MS: i64 = 1_700_000_000_000;

/// Signer URI used by fixtures.
pub const FIXTURE_SIGNER: &str = "https://notary.test";

/// A ledger with a deterministic key, a memory store and a manual clock.
pub struct TestFixture {
    pub keypair: Keypair,
    pub clock: Arc<ManualClock>,
    pub ledger: Ledger<MemoryStore>,
}

impl TestFixture {
    /// Create a new fixture with a random keypair.
    pub fn new() -> Self {
        Self::with_keypair(Keypair::generate())
    }

    /// Create with a deterministic keypair from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self::with_keypair(Keypair::from_seed(&seed))
    }

    fn with_keypair(keypair: Keypair) -> Self {
        let clock = Arc::new(ManualClock::new(FIXTURE_EPOCH_MS));
        let notary = NotaryContext::new(keypair.clone(), FIXTURE_SIGNER);
        let ledger = Ledger::new(
            Arc::new(MemoryStore::new()),
            Arc::new(notary),
            clock.clone(),
            LedgerConfig::default(),
        );
        Self {
            keypair,
            clock,
            ledger,
        }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// Current fixture time.
    pub fn now(&self) -> i64 {
        self.ledger.now_millis()
    }

    /// Move the clock forward and return the new time.
    pub fn advance(&self, ms: i64) -> i64 {
        self.clock.advance(ms)
    }

    /// An expiry monitor over the fixture's ledger.
    pub fn monitor(&self) -> ExpiryMonitor<MemoryStore> {
        self.ledger.expiry_monitor()
    }

    /// A `prepared` alice → bob transfer that waits on alice's authorization
    /// and expires `ttl_ms` from now.
    pub fn pending_transfer(&self, ttl_ms: i64) -> Transfer {
        Transfer::new(
            TransferId::new_v4(),
            vec![Debit::new("alice", "10.00")],
            vec![Credit::new("bob", "10.00")],
        )
        .expires_at(self.now() + ttl_ms)
    }

    /// Like [`pending_transfer`](Self::pending_transfer) but already authorized.
    pub fn authorized_transfer(&self, ttl_ms: i64) -> Transfer {
        Transfer::new(
            TransferId::new_v4(),
            vec![Debit::new("alice", "10.00").authorized("alice-signature")],
            vec![Credit::new("bob", "10.00")],
        )
        .expires_at(self.now() + ttl_ms)
    }

    /// A `proposed` transfer with two debits, only the first authorized.
    pub fn proposed_split_transfer(&self, ttl_ms: i64) -> Transfer {
        Transfer::new(
            TransferId::new_v4(),
            vec![
                Debit::new("alice", "5.00").authorized("alice-signature"),
                Debit::new("carol", "5.00"),
            ],
            vec![Credit::new("bob", "10.00")],
        )
        .with_state(TransferState::Proposed)
        .expires_at(self.now() + ttl_ms)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixtures with distinct, deterministic signing keys.
pub fn multi_notary_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[..8].copy_from_slice(&(i as u64).to_le_bytes());
            TestFixture::with_seed(seed)
        })
        .collect()
}
