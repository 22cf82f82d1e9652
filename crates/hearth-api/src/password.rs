//! Password hashing.
//!
//! New hashes are always Argon2id. Accounts carried over from the previous
//! deployment may still hold an unsalted hex SHA-256 digest; those verify
//! once and are reported as [`Verification::Legacy`] so the caller can
//! rehash them.

use anyhow::{Result, anyhow};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use sha2::{Digest, Sha256};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Valid,
    /// Matched a legacy SHA-256 digest; the stored hash should be upgraded.
    Legacy,
    Invalid,
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, stored: &str) -> Verification {
    if is_legacy_digest(stored) {
        let digest = hex::encode(Sha256::digest(password.as_bytes()));
        return if digest.eq_ignore_ascii_case(stored) {
            Verification::Legacy
        } else {
            Verification::Invalid
        };
    }

    let parsed = match PasswordHash::new(stored) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Unparseable password hash: {}", e);
            return Verification::Invalid;
        }
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Verification::Valid,
        Err(_) => Verification::Invalid,
    }
}

fn is_legacy_digest(stored: &str) -> bool {
    stored.len() == 64 && stored.bytes().all(|b| b.is_ascii_hexdigit())
}
