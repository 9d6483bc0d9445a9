//! State receipts: signed attestations of a transfer's current state.
//!
//! A receipt is the minimal projection `{id, state}` of a [`Transfer`]. It is
//! canonicalized, hashed with SHA-512 and signed with the node's Ed25519 key.
//! The resulting [`SignedEnvelope`] is what callers receive:
//!
//! ```json
//! {
//!   "message": {"id": "…", "state": "prepared"},
//!   "algorithm": "ed25519-sha512",
//!   "signer": "https://ledger.example",
//!   "public_key": "<hex>",
//!   "signature": "<hex>"
//! }
//! ```
//!
//! Any verifier can recompute `SHA-512(canonical(message))` and check the
//! signature against `public_key` without talking to the ledger.

use serde::{Deserialize, Serialize};

use crate::canonical::canonicalize_serializable;
use crate::crypto::{Ed25519PublicKey, Ed25519Signature, Keypair, Sha512Digest, ALGORITHM};
use crate::error::CoreError;
use crate::transfer::Transfer;
use crate::types::{TransferId, TransferState};

/// The exact payload that gets signed. No other fields, ever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateReceipt {
    pub id: TransferId,
    pub state: TransferState,
}

impl StateReceipt {
    pub fn new(id: TransferId, state: TransferState) -> Self {
        Self { id, state }
    }

    /// Project a transfer at this instant.
    pub fn of(transfer: &Transfer) -> Self {
        Self::new(transfer.id, transfer.state)
    }

    /// Canonical bytes of the receipt.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CoreError> {
        Ok(canonicalize_serializable(self)?)
    }

    /// SHA-512 of the canonical bytes.
    pub fn digest(&self) -> Result<Sha512Digest, CoreError> {
        Ok(Sha512Digest::hash(&self.canonical_bytes()?))
    }
}

/// A receipt plus the metadata needed to verify it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub message: StateReceipt,
    pub algorithm: String,
    /// Base URI identifying the signing ledger node.
    pub signer: String,
    /// Hex-encoded Ed25519 public key.
    pub public_key: String,
    /// Hex-encoded Ed25519 signature over `SHA-512(canonical(message))`.
    pub signature: String,
}

impl SignedEnvelope {
    /// Verify the envelope against the public key it carries.
    pub fn verify(&self) -> Result<(), CoreError> {
        let public_key = Ed25519PublicKey::from_hex(&self.public_key)?;
        self.verify_with(&public_key)
    }

    /// Verify the envelope against a key the caller already trusts.
    ///
    /// Prefer this over [`verify`](Self::verify): the embedded key only
    /// proves self-consistency, not who signed.
    pub fn verify_with(&self, public_key: &Ed25519PublicKey) -> Result<(), CoreError> {
        if self.algorithm != ALGORITHM {
            return Err(CoreError::UnsupportedAlgorithm(self.algorithm.clone()));
        }
        if self.public_key != public_key.to_hex() {
            return Err(CoreError::MalformedEnvelope(
                "public_key does not match the trusted key".into(),
            ));
        }
        let signature = Ed25519Signature::from_hex(&self.signature)?;
        let digest = self.message.digest()?;
        public_key.verify(&digest, &signature)
    }
}

/// Immutable signing context, built once at startup.
///
/// Holds the node's keypair and the base URI published as `signer`.
#[derive(Debug, Clone)]
pub struct NotaryContext {
    keypair: Keypair,
    signer: String,
}

impl NotaryContext {
    pub fn new(keypair: Keypair, signer: impl Into<String>) -> Self {
        Self {
            keypair,
            signer: signer.into(),
        }
    }

    pub fn algorithm(&self) -> &'static str {
        ALGORITHM
    }

    pub fn signer(&self) -> &str {
        &self.signer
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// Notarize the current state of a transfer.
    pub fn notarize(&self, transfer: &Transfer) -> Result<SignedEnvelope, CoreError> {
        build_receipt(transfer, self)
    }
}

/// Build the signed envelope for a transfer.
///
/// Pure: the output depends only on `(transfer.id, transfer.state)` and the
/// context's key. Nothing is returned unless the signature was produced.
pub fn build_receipt(transfer: &Transfer, context: &NotaryContext) -> Result<SignedEnvelope, CoreError> {
    let message = StateReceipt::of(transfer);
    let digest = message.digest()?;
    let signature = context.keypair.sign(&digest)?;

    Ok(SignedEnvelope {
        message,
        algorithm: ALGORITHM.to_string(),
        signer: context.signer.clone(),
        public_key: context.public_key().to_hex(),
        signature: signature.to_hex(),
    })
}
