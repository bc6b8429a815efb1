//! Ownership-scoped persistence for Nexus.
//!
//! This crate defines the [`Store`] trait, the relational persistence layer
//! behind the HTTP API. Every operation on an owned entity takes the caller's
//! account id as an explicit `owner` argument and filters on it: a record
//! owned by another account is indistinguishable from one that does not
//! exist. Foreign keys in a write are checked against the same owner inside
//! the write's transaction.
//!
//! Two implementations are provided:
//!
//! - [`PostgresStore`] (feature `postgres-backend`, default) for production
//! - [`MemoryStore`] for tests and local development

mod error;
mod memory;
pub mod models;
#[cfg(feature = "postgres-backend")]
mod postgres;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use models::{
    Account, Address, AddressFields, Client, ClientFields, Developer, DeveloperFields, InfraItem,
    InfraItemFields, InfraItemLinks, NewAccount, Project, ProjectFields, ProjectLinks,
    SecretChange,
};
#[cfg(feature = "postgres-backend")]
pub use postgres::PostgresStore;

use uuid::Uuid;

/// The persistence interface used by the HTTP layer.
///
/// Each write is atomic: either every row it touches changes, or none does.
/// Implementations must be safe to share across async tasks.
///
/// # Errors
///
/// All methods return [`StorageError::NotFound`] when the target is absent
/// or owned by someone else, [`StorageError::InvalidReference`] when a
/// payload foreign key fails the ownership check, [`StorageError::Conflict`]
/// on a uniqueness violation, [`StorageError::InUse`] when a delete would
/// orphan other records, and a backend variant for everything else.
#[async_trait::async_trait]
pub trait Store: Send + Sync + 'static {
    // Accounts

    /// Persist a new account. Name and email must be unique.
    async fn create_account(&self, account: NewAccount) -> Result<Account, StorageError>;

    /// Look up an account by display name or email.
    async fn find_account_by_login(&self, login: &str) -> Result<Option<Account>, StorageError>;

    /// Look up an account by id.
    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StorageError>;

    /// Link the account to one of its own developers, or unlink it with `None`.
    async fn link_account_developer(
        &self,
        owner: Uuid,
        developer_id: Option<Uuid>,
    ) -> Result<Account, StorageError>;

    // Addresses

    async fn get_address(&self, owner: Uuid, id: Uuid) -> Result<Address, StorageError>;

    async fn update_address(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: AddressFields,
    ) -> Result<Address, StorageError>;

    // Clients

    async fn list_clients(&self, owner: Uuid) -> Result<Vec<Client>, StorageError>;

    async fn get_client(&self, owner: Uuid, id: Uuid) -> Result<Client, StorageError>;

    /// Create a client and its address in one transaction.
    async fn create_client(
        &self,
        owner: Uuid,
        fields: ClientFields,
        address: AddressFields,
    ) -> Result<Client, StorageError>;

    /// Update a client and, when given, its address. A client without an
    /// address gets a new one.
    async fn update_client(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: ClientFields,
        address: Option<AddressFields>,
    ) -> Result<Client, StorageError>;

    /// Delete a client and its address.
    async fn delete_client(&self, owner: Uuid, id: Uuid) -> Result<(), StorageError>;

    // Developers

    async fn list_developers(&self, owner: Uuid) -> Result<Vec<Developer>, StorageError>;

    async fn get_developer(&self, owner: Uuid, id: Uuid) -> Result<Developer, StorageError>;

    /// Create a developer and its address in one transaction.
    async fn create_developer(
        &self,
        owner: Uuid,
        fields: DeveloperFields,
        address: AddressFields,
    ) -> Result<Developer, StorageError>;

    async fn update_developer(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: DeveloperFields,
        address: Option<AddressFields>,
    ) -> Result<Developer, StorageError>;

    /// Delete a developer and its address.
    async fn delete_developer(&self, owner: Uuid, id: Uuid) -> Result<(), StorageError>;

    // Projects

    async fn list_projects(&self, owner: Uuid) -> Result<Vec<Project>, StorageError>;

    async fn get_project(&self, owner: Uuid, id: Uuid) -> Result<Project, StorageError>;

    async fn create_project(
        &self,
        owner: Uuid,
        links: ProjectLinks,
        fields: ProjectFields,
    ) -> Result<Project, StorageError>;

    async fn update_project(
        &self,
        owner: Uuid,
        id: Uuid,
        links: ProjectLinks,
        fields: ProjectFields,
    ) -> Result<Project, StorageError>;

    async fn delete_project(&self, owner: Uuid, id: Uuid) -> Result<(), StorageError>;

    // Infrastructure items

    async fn list_infra_items(&self, owner: Uuid) -> Result<Vec<InfraItem>, StorageError>;

    async fn get_infra_item(&self, owner: Uuid, id: Uuid) -> Result<InfraItem, StorageError>;

    /// Create an item. `secret_ciphertext` must already be encrypted.
    async fn create_infra_item(
        &self,
        owner: Uuid,
        links: InfraItemLinks,
        fields: InfraItemFields,
        secret_ciphertext: Option<String>,
    ) -> Result<InfraItem, StorageError>;

    async fn update_infra_item(
        &self,
        owner: Uuid,
        id: Uuid,
        links: InfraItemLinks,
        fields: InfraItemFields,
        secret: SecretChange,
    ) -> Result<InfraItem, StorageError>;

    async fn delete_infra_item(&self, owner: Uuid, id: Uuid) -> Result<(), StorageError>;
}
