//! Error types for `nexus-core`.

/// Errors from the secret cipher.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The configured key is not a 44-character base64url encoding of 32 bytes.
    #[error("invalid encryption key: {reason}")]
    InvalidKey { reason: String },

    /// AES-256-GCM encryption failed.
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },

    /// The stored value is not valid base64url.
    #[error("stored secret is not valid base64url")]
    Encoding,

    /// The stored value is too short to contain a nonce and a tag.
    #[error("ciphertext too short: expected at least {expected} bytes, got {actual}")]
    CiphertextTooShort { expected: usize, actual: usize },

    /// Authentication failed: wrong key, corrupted ciphertext or tampered tag.
    #[error("decryption failed")]
    Decryption,

    /// The decrypted bytes are not UTF-8.
    #[error("decrypted secret is not valid UTF-8")]
    Utf8,
}

/// Errors from password hashing.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed: {reason}")]
    Hash { reason: String },
}

/// Errors from session token handling.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Bad signature, malformed token, wrong algorithm, expired, or a
    /// subject that is not an account id. Callers never learn which.
    #[error("invalid or expired token")]
    InvalidToken,

    /// Signing a new token failed.
    #[error("token signing failed: {reason}")]
    Signing { reason: String },
}
