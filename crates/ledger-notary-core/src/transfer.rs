//! Transfer and account records.
//!
//! A [`Transfer`] moves value from the accounts in `debits` to the accounts in
//! `credits`. Its `state` only ever moves forward along the lifecycle described
//! by [`TransferState`]; once terminal the record is frozen.

use serde::{Deserialize, Serialize};

use crate::types::{RejectionReason, TransferId, TransferState};

/// Name of the escrow account that must always exist.
pub const HOLD_ACCOUNT: &str = "hold";

/// One source of funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debit {
    pub account: String,
    /// Positive decimal string.
    pub amount: String,
    /// Opaque authorization artifact. A debit without one blocks execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,
}

impl Debit {
    pub fn new(account: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            amount: amount.into(),
            authorization: None,
        }
    }

    pub fn authorized(mut self, artifact: impl Into<String>) -> Self {
        self.authorization = Some(artifact.into());
        self
    }

    pub fn is_authorized(&self) -> bool {
        self.authorization.is_some()
    }
}

/// One destination of funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub account: String,
    pub amount: String,
}

impl Credit {
    pub fn new(account: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            amount: amount.into(),
        }
    }
}

/// A transfer record as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub debits: Vec<Debit>,
    pub credits: Vec<Credit>,
    pub state: TransferState,
    /// Deadline (Unix ms). `None` means the transfer never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepared_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<RejectionReason>,
}

impl Transfer {
    /// A new `prepared` transfer with no deadline.
    pub fn new(id: TransferId, debits: Vec<Debit>, credits: Vec<Credit>) -> Self {
        Self {
            id,
            debits,
            credits,
            state: TransferState::Prepared,
            expires_at: None,
            proposed_at: None,
            prepared_at: None,
            executed_at: None,
            rejected_at: None,
            rejection_reason: None,
        }
    }

    pub fn with_state(mut self, state: TransferState) -> Self {
        self.state = state;
        self
    }

    pub fn expires_at(mut self, at: i64) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// True when every debit carries an authorization artifact.
    pub fn is_fully_authorized(&self) -> bool {
        self.debits.iter().all(Debit::is_authorized)
    }

    /// Debits still waiting on an authorization artifact.
    pub fn unauthorized_debits(&self) -> usize {
        self.debits.iter().filter(|d| !d.is_authorized()).count()
    }

    /// Attach `artifact` to every unauthorized debit drawn from `account`.
    ///
    /// Debits that already carry an artifact keep it. Returns how many debits
    /// draw from `account`; zero means the account is not a party.
    pub fn authorize_debit(&mut self, account: &str, artifact: &str) -> usize {
        let mut matched = 0;
        for debit in self.debits.iter_mut().filter(|d| d.account == account) {
            matched += 1;
            if debit.authorization.is_none() {
                debit.authorization = Some(artifact.to_string());
            }
        }
        matched
    }

    /// True when the deadline is set and `now` has reached it.
    pub fn is_past_deadline(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(deadline) if deadline <= now)
    }

    /// The expiry predicate: non-terminal, past its deadline, and still
    /// waiting on at least one debit authorization.
    pub fn is_expired(&self, now: i64) -> bool {
        !self.state.is_terminal() && self.is_past_deadline(now) && !self.is_fully_authorized()
    }
}

/// A ledger account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    /// Decimal string. Never interpreted by the notary.
    pub balance: String,
    /// Salted digest of the account password, if one was provisioned.
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl Account {
    pub fn new(name: impl Into<String>, balance: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            balance: balance.into(),
            password_hash: None,
            is_admin: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(debits: Vec<Debit>) -> Transfer {
        Transfer::new(TransferId::new_v4(), debits, vec![Credit::new("bob", "10")])
    }

    #[test]
    fn test_no_deadline_never_expires() {
        let t = transfer(vec![Debit::new("alice", "10")]);
        assert!(!t.is_expired(i64::MAX));
    }

    #[test]
    fn test_deadline_is_inclusive() {
        let t = transfer(vec![Debit::new("alice", "10")]).expires_at(1_000);
        assert!(!t.is_expired(999));
        assert!(t.is_expired(1_000));
        assert!(t.is_expired(1_001));
    }

    #[test]
    fn test_fully_authorized_transfer_does_not_expire() {
        let t = transfer(vec![Debit::new("alice", "10").authorized("sig")]).expires_at(1_000);
        assert!(t.is_fully_authorized());
        assert!(!t.is_expired(2_000));
    }

    #[test]
    fn test_partially_authorized_transfer_expires() {
        let t = transfer(vec![
            Debit::new("alice", "5").authorized("sig"),
            Debit::new("carol", "5"),
        ])
        .expires_at(1_000);
        assert!(!t.is_fully_authorized());
        assert!(t.is_expired(1_000));
    }

    #[test]
    fn test_authorize_debit_completes_authorization() {
        let mut t = transfer(vec![
            Debit::new("alice", "5").authorized("old"),
            Debit::new("carol", "3"),
            Debit::new("carol", "2"),
        ])
        .expires_at(1_000);
        assert_eq!(t.unauthorized_debits(), 2);

        assert_eq!(t.authorize_debit("dave", "sig"), 0);
        assert_eq!(t.authorize_debit("carol", "sig-c"), 2);
        assert_eq!(t.authorize_debit("alice", "new"), 1);

        assert_eq!(t.unauthorized_debits(), 0);
        assert_eq!(t.debits[0].authorization.as_deref(), Some("old"));
        assert_eq!(t.debits[2].authorization.as_deref(), Some("sig-c"));
        assert!(!t.is_expired(2_000));
    }

    #[test]
    fn test_terminal_transfer_never_expires() {
        let base = transfer(vec![Debit::new("alice", "10")]).expires_at(1_000);
        assert!(!base.clone().with_state(TransferState::Executed).is_expired(5_000));
        assert!(!base.with_state(TransferState::Rejected).is_expired(5_000));
    }

    #[test]
    fn test_account_json_hides_credential() {
        let mut account = Account::new("admin", "0");
        account.password_hash = Some("deadbeef".into());
        let json = serde_json::to_value(&account).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["name"], "admin");
    }

    #[test]
    fn test_transfer_json_omits_unset_fields() {
        let t = transfer(vec![Debit::new("alice", "10")]);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["state"], "prepared");
        assert!(json.get("expires_at").is_none());
        assert!(json["debits"][0].get("authorization").is_none());
    }
}
