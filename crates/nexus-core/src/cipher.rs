//! Encryption of stored access secrets.
//!
//! A single deployment-wide AES-256-GCM key protects every stored secret.
//! Each encryption draws a fresh 96-bit nonce from `OsRng`. The stored form
//! is the base64url (padded) encoding of `nonce (12) || ciphertext || tag (16)`,
//! so it fits a text column.
//!
//! The key arrives as configuration text: 32 raw bytes, base64url-encoded
//! with padding, which is always exactly 44 characters.

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Length of the textual key: base64 of 32 bytes with padding.
pub const ENCODED_KEY_LEN: usize = 44;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const MIN_CIPHERTEXT_LEN: usize = NONCE_LEN + TAG_LEN;

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct EncryptionKey([u8; KEY_LEN]);

/// Encrypts and decrypts secret strings with the deployment key.
///
/// Built once at startup and shared read-only. The key never appears in
/// `Debug` output.
#[derive(Clone)]
pub struct SecretCipher {
    key: EncryptionKey,
}

impl fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SecretCipher {
    /// Parse the configured key text.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if the text is not 44 characters
    /// of padded base64url that decode to exactly 32 bytes.
    pub fn from_base64_key(encoded: &str) -> Result<Self, CryptoError> {
        let encoded = encoded.trim();
        if encoded.len() != ENCODED_KEY_LEN {
            return Err(CryptoError::InvalidKey {
                reason: format!(
                    "expected {ENCODED_KEY_LEN} base64url characters, got {}",
                    encoded.len()
                ),
            });
        }
        let mut raw = URL_SAFE
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidKey {
                reason: e.to_string(),
            })?;
        let bytes: Result<[u8; KEY_LEN], _> = raw.as_slice().try_into();
        raw.zeroize();
        let bytes = bytes.map_err(|_| CryptoError::InvalidKey {
            reason: format!("key must decode to {KEY_LEN} bytes"),
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Build a cipher from raw key bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            key: EncryptionKey(bytes),
        }
    }

    /// Generate a random key and return the cipher together with the key's
    /// configuration text.
    #[must_use]
    pub fn generate() -> (Self, String) {
        let key = Aes256Gcm::generate_key(OsRng);
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&key);
        let encoded = URL_SAFE.encode(bytes);
        let cipher = Self::from_bytes(bytes);
        bytes.zeroize();
        (cipher, encoded)
    }

    fn aead(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key.0))
    }

    /// Encrypt a secret into its stored form.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encryption`] if the AEAD operation fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .aead()
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::Encryption {
                reason: e.to_string(),
            })?;

        let mut combined = Vec::with_capacity(NONCE_LEN.saturating_add(ciphertext.len()));
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(URL_SAFE.encode(combined))
    }

    /// Decrypt a stored value produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// - [`CryptoError::Encoding`] if the value is not base64url
    /// - [`CryptoError::CiphertextTooShort`] if it cannot hold a nonce and tag
    /// - [`CryptoError::Decryption`] if authentication fails
    /// - [`CryptoError::Utf8`] if the plaintext is not UTF-8
    pub fn decrypt(&self, stored: &str) -> Result<String, CryptoError> {
        let combined = URL_SAFE
            .decode(stored.trim())
            .map_err(|_| CryptoError::Encoding)?;
        if combined.len() < MIN_CIPHERTEXT_LEN {
            return Err(CryptoError::CiphertextTooShort {
                expected: MIN_CIPHERTEXT_LEN,
                actual: combined.len(),
            });
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .aead()
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::Decryption)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::Utf8)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let (cipher, _) = SecretCipher::generate();
        let stored = cipher.encrypt("p@ss w0rd çã").unwrap();
        assert_eq!(cipher.decrypt(&stored).unwrap(), "p@ss w0rd çã");
    }

    #[test]
    fn stored_form_hides_plaintext() {
        let (cipher, _) = SecretCipher::generate();
        let stored = cipher.encrypt("hunter2").unwrap();
        assert!(!stored.contains("hunter2"));
        assert!(URL_SAFE.decode(&stored).is_ok());
    }

    #[test]
    fn two_encryptions_differ() {
        let (cipher, _) = SecretCipher::generate();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn wrong_key_fails() {
        let (k1, _) = SecretCipher::generate();
        let (k2, _) = SecretCipher::generate();
        let stored = k1.encrypt("secret").unwrap();
        assert!(matches!(k2.decrypt(&stored), Err(CryptoError::Decryption)));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let (cipher, _) = SecretCipher::generate();
        let mut raw = URL_SAFE.decode(cipher.encrypt("secret").unwrap()).unwrap();
        if let Some(byte) = raw.get_mut(NONCE_LEN) {
            *byte ^= 0x01;
        }
        let tampered = URL_SAFE.encode(raw);
        assert!(matches!(cipher.decrypt(&tampered), Err(CryptoError::Decryption)));
    }

    #[test]
    fn truncated_ciphertext_fails() {
        let (cipher, _) = SecretCipher::generate();
        let short = URL_SAFE.encode([0u8; 10]);
        assert!(matches!(
            cipher.decrypt(&short),
            Err(CryptoError::CiphertextTooShort {
                expected: 28,
                actual: 10
            })
        ));
    }

    #[test]
    fn non_base64_fails() {
        let (cipher, _) = SecretCipher::generate();
        assert!(matches!(cipher.decrypt("not base64 !!"), Err(CryptoError::Encoding)));
    }

    #[test]
    fn generated_key_text_parses_back() {
        let (cipher, encoded) = SecretCipher::generate();
        assert_eq!(encoded.len(), ENCODED_KEY_LEN);
        let parsed = SecretCipher::from_base64_key(&encoded).unwrap();
        let stored = cipher.encrypt("shared").unwrap();
        assert_eq!(parsed.decrypt(&stored).unwrap(), "shared");
    }

    #[test]
    fn key_of_wrong_length_is_rejected() {
        let short = URL_SAFE.encode([7u8; 16]);
        assert!(matches!(
            SecretCipher::from_base64_key(&short),
            Err(CryptoError::InvalidKey { .. })
        ));
        assert!(SecretCipher::from_base64_key("").is_err());
    }

    #[test]
    fn key_with_bad_alphabet_is_rejected() {
        let bad = "!".repeat(ENCODED_KEY_LEN);
        assert!(matches!(
            SecretCipher::from_base64_key(&bad),
            Err(CryptoError::InvalidKey { .. })
        ));
    }

    #[test]
    fn debug_redacts_key() {
        let (cipher, encoded) = SecretCipher::generate();
        let debug = format!("{cipher:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(&encoded));
    }
}
