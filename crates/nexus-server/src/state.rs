//! Shared application state for the Nexus server.
//!
//! A single [`AppState`] is built at startup and shared with every handler
//! through `Arc`. The keys inside are immutable after construction, so no
//! locking is needed.

use std::sync::Arc;

use nexus_core::{SecretCipher, SessionKeys};
use nexus_storage::Store;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// Ownership-scoped persistence.
    pub store: Arc<dyn Store>,
    /// Encrypts and decrypts stored access secrets.
    pub cipher: SecretCipher,
    /// Issues and validates session tokens.
    pub sessions: SessionKeys,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, cipher: SecretCipher, sessions: SessionKeys) -> Self {
        Self {
            store,
            cipher,
            sessions,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &"[Store]")
            .field("cipher", &self.cipher)
            .field("sessions", &self.sessions)
            .finish()
    }
}
