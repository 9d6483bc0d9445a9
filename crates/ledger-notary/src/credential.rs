//! Account credentials.
//!
//! Passwords are stored as `sha256:<salt hex>:<digest hex>` where the digest
//! is SHA-256 over `salt || password` with a random 16-byte salt.

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    hash_password_with_salt(password, &salt)
}

/// Hash a password with a caller-chosen salt.
pub fn hash_password_with_salt(password: &str, salt: &[u8; SALT_LEN]) -> String {
    format!("{SCHEME}:{}:{}", hex::encode(salt), hex::encode(digest(salt, password)))
}

/// Check `password` against a stored credential. Malformed credentials never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, ':');
    let (Some(SCHEME), Some(salt_hex), Some(digest_hex)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(digest_hex)) else {
        return false;
    };

    let actual = digest(&salt, password);
    expected.as_slice().ct_eq(&actual[..]).into()
}

fn digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}
