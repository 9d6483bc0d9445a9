//! Strong type definitions for the ledger notary.
//!
//! Identifiers and lifecycle states are newtypes/enums so that a raw string
//! can never be confused with a transfer id or a state name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a transfer. Always a UUID.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(pub Uuid);

impl TransferId {
    /// Generate a fresh random id.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse from the hyphenated textual form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Debug for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransferId({})", self.0)
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for TransferId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for TransferId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Lifecycle state of a transfer.
///
/// ```text
/// proposed ──► prepared ──► executed
///     │            │
///     └────────────┴──────► rejected
/// ```
///
/// `executed` and `rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    Proposed,
    Prepared,
    Executed,
    Rejected,
}

impl TransferState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Prepared => "prepared",
            Self::Executed => "executed",
            Self::Rejected => "rejected",
        }
    }

    /// Whether the state can never change again.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Rejected)
    }

    /// Whether `self -> next` is an edge of the lifecycle graph.
    pub const fn can_transition_to(&self, next: TransferState) -> bool {
        matches!(
            (self, next),
            (Self::Proposed, Self::Prepared)
                | (Self::Prepared, Self::Executed)
                | (Self::Proposed, Self::Rejected)
                | (Self::Prepared, Self::Rejected)
        )
    }

    /// The timestamp column stamped when entering this state.
    pub const fn timestamp_field(&self) -> TimestampField {
        match self {
            Self::Proposed => TimestampField::ProposedAt,
            Self::Prepared => TimestampField::PreparedAt,
            Self::Executed => TimestampField::ExecutedAt,
            Self::Rejected => TimestampField::RejectedAt,
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proposed" => Ok(Self::Proposed),
            "prepared" => Ok(Self::Prepared),
            "executed" => Ok(Self::Executed),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown transfer state: {other}")),
        }
    }
}

/// Timestamp column written by a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampField {
    ProposedAt,
    PreparedAt,
    ExecutedAt,
    RejectedAt,
}

impl TimestampField {
    pub const fn column(&self) -> &'static str {
        match self {
            Self::ProposedAt => "proposed_at",
            Self::PreparedAt => "prepared_at",
            Self::ExecutedAt => "executed_at",
            Self::RejectedAt => "rejected_at",
        }
    }
}

/// Why a transfer ended up `rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// The expiry deadline passed before every debit was authorized.
    Expired,
    /// A participant cancelled the transfer.
    Cancelled,
}

impl RejectionReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for RejectionReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown rejection reason: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_id_display_roundtrip() {
        let id = TransferId::new_v4();
        let parsed: TransferId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_transfer_id_rejects_garbage() {
        assert!(TransferId::parse("not-a-uuid").is_err());
        assert!(TransferId::parse("").is_err());
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&TransferState::Prepared).unwrap();
        assert_eq!(json, "\"prepared\"");
        let back: TransferState = serde_json::from_str("\"rejected\"").unwrap();
        assert_eq!(back, TransferState::Rejected);
    }

    #[test]
    fn test_lifecycle_edges() {
        use TransferState::*;

        assert!(Proposed.can_transition_to(Prepared));
        assert!(Prepared.can_transition_to(Executed));
        assert!(Prepared.can_transition_to(Rejected));
        assert!(Proposed.can_transition_to(Rejected));

        assert!(!Proposed.can_transition_to(Executed));
        assert!(!Executed.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Executed));
        assert!(!Rejected.can_transition_to(Prepared));
    }

    #[test]
    fn test_terminal_states() {
        assert!(TransferState::Executed.is_terminal());
        assert!(TransferState::Rejected.is_terminal());
        assert!(!TransferState::Prepared.is_terminal());
        assert!(!TransferState::Proposed.is_terminal());
    }

    #[test]
    fn test_state_from_str_matches_as_str() {
        for state in [
            TransferState::Proposed,
            TransferState::Prepared,
            TransferState::Executed,
            TransferState::Rejected,
        ] {
            assert_eq!(state.as_str().parse::<TransferState>().unwrap(), state);
        }
        assert!("pending".parse::<TransferState>().is_err());
    }
}
