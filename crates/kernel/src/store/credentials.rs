//! Admin password hashing and verification.

use anyhow::Result;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use subtle::ConstantTimeEq;

/// Prefix of Argon2 PHC strings.
const ARGON2_PREFIX: &str = "$argon2";

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Check a submitted password against the stored value.
///
/// Stored values may be Argon2 PHC strings or legacy plaintext, which is
/// compared in constant time.
pub fn verify_password(stored: &str, password: &str) -> bool {
    if stored.is_empty() {
        return false;
    }

    if stored.starts_with(ARGON2_PREFIX) {
        let Ok(parsed_hash) = PasswordHash::new(stored) else {
            return false;
        };

        return Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok();
    }

    stored.as_bytes().ct_eq(password.as_bytes()).into()
}
