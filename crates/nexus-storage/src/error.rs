//! Storage error types.
//!
//! Variants are split by how the HTTP layer must treat them: missing or
//! foreign-owned targets, bad references in a payload, uniqueness and
//! referential conflicts, and opaque backend failures. Backend failures carry
//! a reason for the logs only.

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The target record does not exist or belongs to another account.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// A foreign key in the payload points at a record that does not exist
    /// or belongs to another account.
    #[error("{entity} does not exist or is not accessible")]
    InvalidReference { entity: &'static str },

    /// A uniqueness constraint was violated.
    #[error("{entity} already exists")]
    Conflict { entity: &'static str },

    /// The record cannot be deleted while other records reference it.
    #[error("{entity} is still referenced by other records")]
    InUse { entity: &'static str },

    /// Failed to connect to the backend or to prepare its schema.
    #[error("failed to open storage: {reason}")]
    Open { reason: String },

    /// A query failed for a reason not covered above.
    #[error("query on {entity} failed: {reason}")]
    Query { entity: &'static str, reason: String },

    /// Failed to begin or commit a transaction.
    #[error("transaction failed: {reason}")]
    Transaction { reason: String },
}
