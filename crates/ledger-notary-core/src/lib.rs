//! # Ledger Notary Core
//!
//! Pure primitives for the ledger notary: transfer records, canonicalization,
//! digests, and signed state receipts.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over transfer records and key material.
//!
//! ## Key Types
//!
//! - [`Transfer`] - A value movement between accounts with a lifecycle state
//! - [`TransferState`] - `proposed`, `prepared`, `executed`, `rejected`
//! - [`StateReceipt`] - The `{id, state}` projection that gets signed
//! - [`SignedEnvelope`] - A receipt plus algorithm, signer, key and signature
//! - [`NotaryContext`] - The node's immutable signing identity
//!
//! ## Notarization pipeline
//!
//! `Transfer → StateReceipt → canonical JSON → SHA-512 → Ed25519`. See the
//! [`canonical`] module for the byte-level rules.

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod receipt;
pub mod transfer;
pub mod types;
pub mod validation;

pub use canonical::{canonicalize, canonicalize_serializable};
pub use crypto::{Ed25519PublicKey, Ed25519Signature, Keypair, Sha512Digest, ALGORITHM};
pub use error::{CanonicalizationError, CoreError, ValidationError};
pub use receipt::{build_receipt, NotaryContext, SignedEnvelope, StateReceipt};
pub use transfer::{Account, Credit, Debit, Transfer, HOLD_ACCOUNT};
pub use types::{RejectionReason, TimestampField, TransferId, TransferState};
pub use validation::{validate_account_name, validate_new_transfer};
