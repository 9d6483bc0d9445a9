//! Lifecycle properties exercised through the public ledger API.

use proptest::prelude::*;

use ledger_notary_core::TransferState;
use ledger_notary_testkit::generators::{debit, transfer_id};
use ledger_notary_testkit::{FIXTURE_EPOCH_MS, TestFixture};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever the deadline and authorizations, a sweep at `now` rejects a
    /// transfer exactly when the expiry predicate holds, and the signed state
    /// always matches the stored one.
    #[test]
    fn sweep_matches_expiry_predicate(
        id in transfer_id(),
        debits in prop::collection::vec(debit(), 1..4),
        ttl in -1_000i64..1_000,
        elapsed in 0i64..2_000,
    ) {
        let rt = runtime();
        rt.block_on(async {
            let fixture = TestFixture::with_seed([5u8; 32]);
            let mut transfer = fixture.pending_transfer(ttl);
            transfer.id = id;
            transfer.debits = debits;
            let expected = transfer.is_expired(FIXTURE_EPOCH_MS + elapsed);

            fixture.ledger.create_transfer(transfer).await.unwrap();
            fixture.advance(elapsed);
            let report = fixture.monitor().sweep().await.unwrap();

            let stored = fixture.ledger.get_transfer(&id).await.unwrap();
            let envelope = fixture.ledger.get_state(&id).await.unwrap();
            assert_eq!(report.rejected, usize::from(expected));
            assert_eq!(stored.state == TransferState::Rejected, expected);
            assert_eq!(envelope.message.state, stored.state);
            envelope.verify_with(&fixture.public_key()).unwrap();
        });
    }
}

#[tokio::test]
async fn terminal_transfers_are_frozen() {
    let fixture = TestFixture::new();
    let monitor = fixture.monitor();

    let executed = fixture
        .ledger
        .create_transfer(fixture.authorized_transfer(10))
        .await
        .unwrap();
    let executed = fixture.ledger.execute_transfer(&executed.id).await.unwrap();

    let expired = fixture
        .ledger
        .create_transfer(fixture.proposed_split_transfer(10))
        .await
        .unwrap();
    fixture.advance(10);
    assert_eq!(monitor.sweep().await.unwrap().rejected, 1);
    let expired = fixture.ledger.get_transfer(&expired.id).await.unwrap();

    for _ in 0..3 {
        fixture.advance(1_000);
        monitor.sweep().await.unwrap();
        assert!(fixture.ledger.cancel_transfer(&executed.id).await.is_err());
        assert!(fixture.ledger.execute_transfer(&expired.id).await.is_err());
    }

    assert_eq!(fixture.ledger.get_transfer(&executed.id).await.unwrap(), executed);
    assert_eq!(fixture.ledger.get_transfer(&expired.id).await.unwrap(), expired);
}
