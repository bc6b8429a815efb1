//! Account password hashing.
//!
//! Argon2id with the crate's default parameters and a random salt per hash.
//! Hashes are PHC strings (`$argon2id$v=19$...`), so parameters and salt
//! travel with the hash. These calls are CPU-heavy; async callers should run
//! them on a blocking thread.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::PasswordError;

/// Fixed salt for [`burn_verification`]. Its output is never stored.
const DUMMY_SALT: &str = "bmV4dXMtZHVtbXktc2FsdA";

/// Hash a password with Argon2id and a fresh salt.
///
/// # Errors
///
/// Returns [`PasswordError::Hash`] if Argon2 rejects the input.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash {
            reason: e.to_string(),
        })
}

/// Check a password against a stored PHC hash.
///
/// A malformed stored hash counts as a mismatch.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        tracing::warn!("stored password hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Spend the same work as one verification without a stored hash.
///
/// Login calls this when the account does not exist so response time does
/// not reveal which identifiers are registered.
pub fn burn_verification(password: &str) {
    if let Ok(salt) = SaltString::from_b64(DUMMY_SALT) {
        let _ = Argon2::default().hash_password(password.as_bytes(), &salt);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_argon2id_phc() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn verify_accepts_correct_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(!verify_password("battery staple", &hash));
    }

    #[test]
    fn same_password_hashes_differently() {
        let h1 = hash_password("pw").unwrap();
        let h2 = hash_password("pw").unwrap();
        assert_ne!(h1, h2);
        assert!(verify_password("pw", &h1));
        assert!(verify_password("pw", &h2));
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        assert!(!verify_password("pw", "not-a-phc-string"));
        assert!(!verify_password("pw", ""));
    }

    #[test]
    fn dummy_salt_is_valid() {
        assert!(SaltString::from_b64(DUMMY_SALT).is_ok());
    }
}
