//! Golden test vectors for state receipts.
//!
//! Each vector pins the canonical bytes, the SHA-512 digest and the Ed25519
//! signature for one `(seed, id, state)` triple. Any verifier, in any
//! language, must reproduce these exactly.

use ledger_notary_core::{
    build_receipt, Credit, Debit, Keypair, NotaryContext, SignedEnvelope, StateReceipt, Transfer,
    TransferId, TransferState,
};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Seed for deterministic key generation.
    pub seed: [u8; 32],
    pub transfer_id: &'static str,
    pub state: TransferState,
    /// Expected canonical JSON of the receipt.
    pub canonical: &'static str,
    /// Expected SHA-512 of `canonical` (hex).
    pub digest: &'static str,
    /// Expected public key for `seed` (hex).
    pub public_key: &'static str,
    /// Expected signature over `digest` (hex).
    pub signature: &'static str,
}

const RFC8032_SEED: [u8; 32] = [
    0x9d, 0x61, 0xb1, 0x9d, 0xef, 0xfd, 0x5a, 0x60, 0xba, 0x84, 0x4a, 0xf4, 0x92, 0xec, 0x2c, 0xc4,
    0x44, 0x49, 0xc5, 0x69, 0x7b, 0x32, 0x69, 0x19, 0x70, 0x3b, 0xac, 0x03, 0x1c, 0xae, 0x7f, 0x60,
];

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "prepared transfer, seed 0x42",
            seed: [0x42; 32],
            transfer_id: "3fa85f64-5717-4562-b3fc-2c963f66afa6",
            state: TransferState::Prepared,
            canonical: r#"{"id":"3fa85f64-5717-4562-b3fc-2c963f66afa6","state":"prepared"}"#,
            digest: "9c08dc6d0b2d33165ee84aa804ff87c2433a3503c79628759515802743f0a79216d9dd9215aa1611cab3aadde090429d2a72b298ff87c93b93db57edd36a1fd6",
            public_key: "2152f8d19b791d24453242e15f2eab6cb7cffa7b6a5ed30097960e069881db12",
            signature: "d5e2a9626a9105da616bd89edefa7de82e7bf9edb83cf02c71bbf21f8d7872db9631e1dbf0bd53b8710528d007d6eb1daddb9447a98c69f276c2a0751beb790c",
        },
        GoldenVector {
            name: "executed transfer, seed 0x42",
            seed: [0x42; 32],
            transfer_id: "3fa85f64-5717-4562-b3fc-2c963f66afa6",
            state: TransferState::Executed,
            canonical: r#"{"id":"3fa85f64-5717-4562-b3fc-2c963f66afa6","state":"executed"}"#,
            digest: "389cd06544b5bfd6e79f5a30fed4432d08e497ca641269228bf75cd205a81556ebde47cd3d70c211037fe4ebfce2a06a16e089b9a9858bd88a9b2a381a3ab210",
            public_key: "2152f8d19b791d24453242e15f2eab6cb7cffa7b6a5ed30097960e069881db12",
            signature: "38ae9192c27f113f4f656d0579ee17c94ad9d79515abc62c0b855dfa197584c178c81f86a85549d0cf4ba24854e115111b1fc1bb9a3c69a64a52370d1ed45b02",
        },
        GoldenVector {
            name: "rejected transfer, zero seed",
            seed: [0x00; 32],
            transfer_id: "00000000-0000-4000-8000-000000000000",
            state: TransferState::Rejected,
            canonical: r#"{"id":"00000000-0000-4000-8000-000000000000","state":"rejected"}"#,
            digest: "061db43e7ac8bb54f43fcb2e0013b6fea9f4311f50037d349d9b4eee43096637f51e3e6271c17193d27de6877848dec66f3fc9877a027d4cc8873137e6ce68d1",
            public_key: "3b6a27bcceb6a42d62a3a8d02a6f0d73653215771de243a63ac048a18b59da29",
            signature: "162ec041e7946f58d8bd6113c1b762886e679a9ff7f405635dea6bcd1033eb017839aada3502e734cad58da0465a0d81d8123a20cecb93b70e9fd68630aade04",
        },
        GoldenVector {
            name: "proposed transfer, RFC 8032 test 1 seed",
            seed: RFC8032_SEED,
            transfer_id: "c0ffee00-1234-4abc-8def-0123456789ab",
            state: TransferState::Proposed,
            canonical: r#"{"id":"c0ffee00-1234-4abc-8def-0123456789ab","state":"proposed"}"#,
            digest: "4b46b7b89d24617f377cac48352ab80719f081508d11e691c89f8c94da5420e22b6278455af3c9fff0f00bdf77d0857a13b38dce72d09ec35670f1f3a4c31783",
            public_key: "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a",
            signature: "f4f6147307de47f97bed13f7101cb54df08ea599cf2303c02b192d4ec5dcbb9eaf1a813a4a15f0d7ec795b8fe0354f8e74e1a3c916892ad849262874e732630b",
        },
    ]
}

/// A transfer in the vector's state. Legs are arbitrary: they never reach
/// the signed message.
///
/// # Panics
///
/// If the vector's transfer id is not a UUID.
pub fn transfer_from_vector(vector: &GoldenVector) -> Transfer {
    let id = TransferId::parse(vector.transfer_id).expect("golden vector id is a UUID");
    Transfer::new(
        id,
        vec![Debit::new("alice", "1")],
        vec![Credit::new("bob", "1")],
    )
    .with_state(vector.state)
}

/// Notarize the vector's transfer with the vector's key.
///
/// # Panics
///
/// If signing fails.
pub fn envelope_from_vector(vector: &GoldenVector) -> SignedEnvelope {
    let context = NotaryContext::new(Keypair::from_seed(&vector.seed), "urn:ledger-notary:golden");
    build_receipt(&transfer_from_vector(vector), &context).expect("golden vector signs")
}

/// Check every vector. Returns `(name, matches, signature_hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let envelope = envelope_from_vector(v);
            let receipt = StateReceipt::of(&transfer_from_vector(v));
            let canonical = receipt
                .canonical_bytes()
                .map(|b| b == v.canonical.as_bytes())
                .unwrap_or(false);
            let digest = receipt
                .digest()
                .map(|d| d.to_hex() == v.digest)
                .unwrap_or(false);

            let matches = canonical
                && digest
                && envelope.public_key == v.public_key
                && envelope.signature == v.signature
                && envelope.verify().is_ok();

            (v.name.to_string(), matches, envelope.signature)
        })
        .collect()
}
