//! # Ledger Notary Testkit
//!
//! Testing utilities for the ledger notary.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Pinned canonical bytes, digests and signatures for cross-language verification
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: A ledger over a memory store with a manual clock
//!
//! ## Golden Vectors
//!
//! ```rust
//! use ledger_notary_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, _) in verify_all_vectors() {
//!     assert!(matches, "{name}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use ledger_notary_testkit::generators::{transfer_from_params, TransferParams};
//!
//! proptest! {
//!     #[test]
//!     fn receipt_depends_on_state(params: TransferParams) {
//!         let t = transfer_from_params(&params);
//!         prop_assert_eq!(StateReceipt::of(&t).state, t.state);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use ledger_notary_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let transfer = fixture.pending_transfer(1_000);
//! fixture.advance(1_000);
//! assert!(transfer.is_expired(fixture.now()));
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_notary_fixtures, TestFixture, FIXTURE_EPOCH_MS, FIXTURE_SIGNER};
pub use generators::{transfer_from_params, TransferParams};
pub use vectors::{all_vectors, envelope_from_vector, verify_all_vectors, GoldenVector};
