//! Core library for Nexus.
//!
//! Everything in this crate is synchronous and free of I/O:
//!
//! - [`cipher`]: AES-256-GCM encryption of stored access secrets
//! - [`password`]: Argon2id password hashing
//! - [`session`]: HS256 bearer tokens with a standard and an extended lifetime

pub mod cipher;
pub mod error;
pub mod password;
pub mod session;

pub use cipher::SecretCipher;
pub use error::{CryptoError, PasswordError, SessionError};
pub use session::{Claims, SessionKeys, TokenLifetime, TokenPolicy};
