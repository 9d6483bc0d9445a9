//! Error types for the ledger notary core.

use thiserror::Error;

/// Errors raised while producing the canonical form of a value.
///
/// These indicate a programming error upstream: the value handed to the
/// canonicalizer is not something a verifier could reproduce byte-for-byte.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CanonicalizationError {
    #[error("unsupported number {0}: only integers have a canonical form")]
    UnsupportedNumber(String),

    #[error("value nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("value could not be serialized: {0}")]
    Serialize(String),
}

/// Core errors that can occur while notarizing a transfer.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

/// Validation errors for transfer and account records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("transfer must have at least one debit")]
    NoDebits,

    #[error("transfer must have at least one credit")]
    NoCredits,

    #[error("invalid amount {amount:?} for account {account:?}")]
    InvalidAmount { account: String, amount: String },

    #[error("invalid account name {0:?}")]
    InvalidAccountName(String),

    #[error("transfer cannot be created in state {0}")]
    InvalidInitialState(String),

    #[error("{0} must not be set on a new transfer")]
    UnexpectedTimestamp(&'static str),

    #[error("authorization artifact must not be empty")]
    EmptyAuthorization,
}
