//! Proptest generators for property-based testing.

use proptest::prelude::*;
use uuid::Uuid;

use ledger_notary_core::{
    Credit, Debit, Keypair, RejectionReason, Transfer, TransferId, TransferState,
};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random TransferId.
pub fn transfer_id() -> impl Strategy<Value = TransferId> {
    any::<u128>().prop_map(|n| TransferId::from_uuid(Uuid::from_u128(n)))
}

/// Generate any lifecycle state.
pub fn transfer_state() -> impl Strategy<Value = TransferState> {
    prop_oneof![
        Just(TransferState::Proposed),
        Just(TransferState::Prepared),
        Just(TransferState::Executed),
        Just(TransferState::Rejected),
    ]
}

/// Generate a state a new transfer may start in.
pub fn initial_state() -> impl Strategy<Value = TransferState> {
    prop_oneof![Just(TransferState::Proposed), Just(TransferState::Prepared)]
}

/// Generate a valid account name.
pub fn account_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_.-]{0,15}".prop_map(String::from)
}

/// Generate a positive decimal amount string.
pub fn amount() -> impl Strategy<Value = String> {
    (1u64..=1_000_000, 0u32..100).prop_map(|(units, cents)| format!("{units}.{cents:02}"))
}

/// Generate a debit, authorized or not.
pub fn debit() -> impl Strategy<Value = Debit> {
    (account_name(), amount(), any::<bool>()).prop_map(|(account, amount, authorized)| {
        let debit = Debit::new(account, amount);
        if authorized {
            debit.authorized("sig")
        } else {
            debit
        }
    })
}

pub fn credit() -> impl Strategy<Value = Credit> {
    (account_name(), amount()).prop_map(|(account, amount)| Credit::new(account, amount))
}

/// Generate a reasonable deadline, or none.
pub fn deadline() -> impl Strategy<Value = Option<i64>> {
    prop::option::of(0i64..=2_000_000_000_000i64)
}

/// Parameters for generating a transfer in any reachable state.
#[derive(Debug, Clone)]
pub struct TransferParams {
    pub id: TransferId,
    pub state: TransferState,
    pub debits: Vec<Debit>,
    pub credits: Vec<Credit>,
    pub expires_at: Option<i64>,
}

impl Arbitrary for TransferParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            transfer_id(),
            transfer_state(),
            prop::collection::vec(debit(), 1..4),
            prop::collection::vec(credit(), 1..4),
            deadline(),
        )
            .prop_map(|(id, state, debits, credits, expires_at)| TransferParams {
                id,
                state,
                debits,
                credits,
                expires_at,
            })
            .boxed()
    }
}

/// Build a transfer from parameters. Terminal states get a timestamp.
pub fn transfer_from_params(params: &TransferParams) -> Transfer {
    let mut transfer = Transfer::new(params.id, params.debits.clone(), params.credits.clone())
        .with_state(params.state);
    transfer.expires_at = params.expires_at;
    match params.state {
        TransferState::Executed => transfer.executed_at = Some(0),
        TransferState::Rejected => {
            transfer.rejected_at = Some(0);
            transfer.rejection_reason = Some(RejectionReason::Expired);
        }
        TransferState::Proposed | TransferState::Prepared => {}
    }
    transfer
}
