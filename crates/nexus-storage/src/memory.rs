//! In-memory store for tests and local development.
//!
//! All tables live in one `Tables` value behind a `RwLock`. A write clones
//! the tables, applies its changes to the copy and swaps the copy in only if
//! every step succeeded, so a failed write leaves nothing behind. Data is
//! lost when the process exits.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    Account, Address, AddressFields, Client, ClientFields, Developer, DeveloperFields, InfraItem,
    InfraItemFields, InfraItemLinks, NewAccount, Project, ProjectFields, ProjectLinks,
    SecretChange,
};
use crate::{Store, StorageError};

#[derive(Debug, Clone, Default)]
struct Tables {
    accounts: BTreeMap<Uuid, Account>,
    addresses: BTreeMap<Uuid, Address>,
    clients: BTreeMap<Uuid, Client>,
    developers: BTreeMap<Uuid, Developer>,
    projects: BTreeMap<Uuid, Project>,
    items: BTreeMap<Uuid, InfraItem>,
}

trait Owned {
    fn owner_id(&self) -> Uuid;
}

macro_rules! impl_owned {
    ($($ty:ty),*) => {
        $(impl Owned for $ty {
            fn owner_id(&self) -> Uuid {
                self.owner_id
            }
        })*
    };
}

impl_owned!(Address, Client, Developer, Project, InfraItem);

/// Row lookup filtered on the owner.
fn owned<T: Owned>(table: &BTreeMap<Uuid, T>, owner: Uuid, id: Uuid) -> Option<&T> {
    table.get(&id).filter(|row| row.owner_id() == owner)
}

fn owned_mut<T: Owned>(table: &mut BTreeMap<Uuid, T>, owner: Uuid, id: Uuid) -> Option<&mut T> {
    table.get_mut(&id).filter(|row| row.owner_id() == owner)
}

fn check_reference<T: Owned>(
    table: &BTreeMap<Uuid, T>,
    owner: Uuid,
    id: Uuid,
    entity: &'static str,
) -> Result<(), StorageError> {
    owned(table, owner, id)
        .map(|_| ())
        .ok_or(StorageError::InvalidReference { entity })
}

impl Tables {
    fn insert_address(&mut self, owner: Uuid, fields: AddressFields) -> Uuid {
        let id = Uuid::new_v4();
        self.addresses.insert(
            id,
            Address {
                id,
                owner_id: owner,
                fields,
                created_at: Utc::now(),
            },
        );
        id
    }

    fn email_taken_by_client(&self, owner: Uuid, email: &str, except: Option<Uuid>) -> bool {
        self.clients.values().any(|c| {
            c.owner_id == owner && c.fields.email == email && Some(c.id) != except
        })
    }

    fn email_taken_by_developer(&self, owner: Uuid, email: &str, except: Option<Uuid>) -> bool {
        self.developers.values().any(|d| {
            d.owner_id == owner && d.fields.email == email && Some(d.id) != except
        })
    }

    fn with_client_address(&self, client: &Client) -> Client {
        let mut client = client.clone();
        client.address = client
            .address_id
            .and_then(|id| owned(&self.addresses, client.owner_id, id))
            .cloned();
        client
    }

    fn with_developer_address(&self, developer: &Developer) -> Developer {
        let mut developer = developer.clone();
        developer.address = owned(&self.addresses, developer.owner_id, developer.address_id).cloned();
        developer
    }

    fn check_project_links(&self, owner: Uuid, links: &ProjectLinks) -> Result<(), StorageError> {
        check_reference(&self.clients, owner, links.client_id, "client")?;
        if let Some(developer_id) = links.developer_id {
            check_reference(&self.developers, owner, developer_id, "developer")?;
        }
        Ok(())
    }

    fn check_item_links(&self, owner: Uuid, links: &InfraItemLinks) -> Result<(), StorageError> {
        check_reference(&self.clients, owner, links.client_id, "client")?;
        if let Some(developer_id) = links.developer_id {
            check_reference(&self.developers, owner, developer_id, "developer")?;
        }
        if let Some(project_id) = links.project_id {
            check_reference(&self.projects, owner, project_id, "project")?;
        }
        Ok(())
    }
}

/// An in-memory [`Store`].
///
/// Cloning is cheap and clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn read<T>(&self, f: impl FnOnce(&Tables) -> Result<T, StorageError>) -> Result<T, StorageError> {
        let tables = self.tables.read().await;
        f(&tables)
    }

    /// Run `f` against a staged copy and commit the copy only on success.
    async fn transact<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();
        let out = f(&mut staged)?;
        *tables = staged;
        Ok(out)
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn create_account(&self, account: NewAccount) -> Result<Account, StorageError> {
        self.transact(|t| {
            // Name and email share one login namespace.
            let taken = t.accounts.values().any(|a| {
                a.answers_to(&account.name)
                    || account.email.as_deref().is_some_and(|e| a.answers_to(e))
            });
            if taken {
                return Err(StorageError::Conflict { entity: "account" });
            }
            let row = Account {
                id: Uuid::new_v4(),
                name: account.name,
                email: account.email,
                password_hash: account.password_hash,
                is_active: true,
                is_admin: false,
                created_at: Utc::now(),
                developer_id: None,
            };
            t.accounts.insert(row.id, row.clone());
            Ok(row)
        })
        .await
    }

    async fn find_account_by_login(&self, login: &str) -> Result<Option<Account>, StorageError> {
        self.read(|t| {
            let by_name = t.accounts.values().find(|a| a.name == login);
            Ok(by_name
                .or_else(|| t.accounts.values().find(|a| a.email.as_deref() == Some(login)))
                .cloned())
        })
        .await
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StorageError> {
        self.read(|t| Ok(t.accounts.get(&id).cloned())).await
    }

    async fn link_account_developer(
        &self,
        owner: Uuid,
        developer_id: Option<Uuid>,
    ) -> Result<Account, StorageError> {
        self.transact(|t| {
            if let Some(id) = developer_id {
                check_reference(&t.developers, owner, id, "developer")?;
            }
            let account = t
                .accounts
                .get_mut(&owner)
                .ok_or(StorageError::NotFound { entity: "account" })?;
            account.developer_id = developer_id;
            Ok(account.clone())
        })
        .await
    }

    async fn get_address(&self, owner: Uuid, id: Uuid) -> Result<Address, StorageError> {
        self.read(|t| {
            owned(&t.addresses, owner, id)
                .cloned()
                .ok_or(StorageError::NotFound { entity: "address" })
        })
        .await
    }

    async fn update_address(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: AddressFields,
    ) -> Result<Address, StorageError> {
        self.transact(|t| {
            let address = owned_mut(&mut t.addresses, owner, id)
                .ok_or(StorageError::NotFound { entity: "address" })?;
            address.fields = fields;
            Ok(address.clone())
        })
        .await
    }

    async fn list_clients(&self, owner: Uuid) -> Result<Vec<Client>, StorageError> {
        self.read(|t| {
            let mut rows: Vec<Client> = t
                .clients
                .values()
                .filter(|c| c.owner_id == owner)
                .map(|c| t.with_client_address(c))
                .collect();
            rows.sort_by(|a, b| a.fields.name.cmp(&b.fields.name));
            Ok(rows)
        })
        .await
    }

    async fn get_client(&self, owner: Uuid, id: Uuid) -> Result<Client, StorageError> {
        self.read(|t| {
            owned(&t.clients, owner, id)
                .map(|c| t.with_client_address(c))
                .ok_or(StorageError::NotFound { entity: "client" })
        })
        .await
    }

    async fn create_client(
        &self,
        owner: Uuid,
        fields: ClientFields,
        address: AddressFields,
    ) -> Result<Client, StorageError> {
        self.transact(|t| {
            if t.email_taken_by_client(owner, &fields.email, None) {
                return Err(StorageError::Conflict { entity: "client" });
            }
            let address_id = t.insert_address(owner, address);
            let row = Client {
                id: Uuid::new_v4(),
                owner_id: owner,
                address_id: Some(address_id),
                fields,
                created_at: Utc::now(),
                address: None,
            };
            t.clients.insert(row.id, row.clone());
            Ok(t.with_client_address(&row))
        })
        .await
    }

    async fn update_client(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: ClientFields,
        address: Option<AddressFields>,
    ) -> Result<Client, StorageError> {
        self.transact(|t| {
            let current = owned(&t.clients, owner, id)
                .cloned()
                .ok_or(StorageError::NotFound { entity: "client" })?;
            if t.email_taken_by_client(owner, &fields.email, Some(id)) {
                return Err(StorageError::Conflict { entity: "client" });
            }
            let mut address_id = current.address_id;
            if let Some(address) = address {
                match address_id.and_then(|aid| owned_mut(&mut t.addresses, owner, aid)) {
                    Some(existing) => existing.fields = address,
                    None => address_id = Some(t.insert_address(owner, address)),
                }
            }
            let row = Client {
                address_id,
                fields,
                ..current
            };
            t.clients.insert(id, row.clone());
            Ok(t.with_client_address(&row))
        })
        .await
    }

    async fn delete_client(&self, owner: Uuid, id: Uuid) -> Result<(), StorageError> {
        self.transact(|t| {
            let client = owned(&t.clients, owner, id)
                .cloned()
                .ok_or(StorageError::NotFound { entity: "client" })?;
            let referenced = t.projects.values().any(|p| p.links.client_id == id)
                || t.items.values().any(|i| i.links.client_id == id);
            if referenced {
                return Err(StorageError::InUse { entity: "client" });
            }
            t.clients.remove(&id);
            if let Some(address_id) = client.address_id {
                t.addresses.remove(&address_id);
            }
            Ok(())
        })
        .await
    }

    async fn list_developers(&self, owner: Uuid) -> Result<Vec<Developer>, StorageError> {
        self.read(|t| {
            let mut rows: Vec<Developer> = t
                .developers
                .values()
                .filter(|d| d.owner_id == owner)
                .map(|d| t.with_developer_address(d))
                .collect();
            rows.sort_by(|a, b| a.fields.name.cmp(&b.fields.name));
            Ok(rows)
        })
        .await
    }

    async fn get_developer(&self, owner: Uuid, id: Uuid) -> Result<Developer, StorageError> {
        self.read(|t| {
            owned(&t.developers, owner, id)
                .map(|d| t.with_developer_address(d))
                .ok_or(StorageError::NotFound { entity: "developer" })
        })
        .await
    }

    async fn create_developer(
        &self,
        owner: Uuid,
        fields: DeveloperFields,
        address: AddressFields,
    ) -> Result<Developer, StorageError> {
        self.transact(|t| {
            if t.email_taken_by_developer(owner, &fields.email, None) {
                return Err(StorageError::Conflict { entity: "developer" });
            }
            let address_id = t.insert_address(owner, address);
            let row = Developer {
                id: Uuid::new_v4(),
                owner_id: owner,
                address_id,
                fields,
                created_at: Utc::now(),
                address: None,
            };
            t.developers.insert(row.id, row.clone());
            Ok(t.with_developer_address(&row))
        })
        .await
    }

    async fn update_developer(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: DeveloperFields,
        address: Option<AddressFields>,
    ) -> Result<Developer, StorageError> {
        self.transact(|t| {
            let current = owned(&t.developers, owner, id)
                .cloned()
                .ok_or(StorageError::NotFound { entity: "developer" })?;
            if t.email_taken_by_developer(owner, &fields.email, Some(id)) {
                return Err(StorageError::Conflict { entity: "developer" });
            }
            if let Some(address) = address {
                let existing = owned_mut(&mut t.addresses, owner, current.address_id)
                    .ok_or(StorageError::NotFound { entity: "address" })?;
                existing.fields = address;
            }
            let row = Developer { fields, ..current };
            t.developers.insert(id, row.clone());
            Ok(t.with_developer_address(&row))
        })
        .await
    }

    async fn delete_developer(&self, owner: Uuid, id: Uuid) -> Result<(), StorageError> {
        self.transact(|t| {
            let developer = owned(&t.developers, owner, id)
                .cloned()
                .ok_or(StorageError::NotFound { entity: "developer" })?;
            let referenced = t.projects.values().any(|p| p.links.developer_id == Some(id))
                || t.items.values().any(|i| i.links.developer_id == Some(id))
                || t.accounts.values().any(|a| a.developer_id == Some(id));
            if referenced {
                return Err(StorageError::InUse { entity: "developer" });
            }
            t.developers.remove(&id);
            t.addresses.remove(&developer.address_id);
            Ok(())
        })
        .await
    }

    async fn list_projects(&self, owner: Uuid) -> Result<Vec<Project>, StorageError> {
        self.read(|t| {
            let mut rows: Vec<Project> = t
                .projects
                .values()
                .filter(|p| p.owner_id == owner)
                .cloned()
                .collect();
            rows.sort_by(|a, b| a.fields.title.cmp(&b.fields.title));
            Ok(rows)
        })
        .await
    }

    async fn get_project(&self, owner: Uuid, id: Uuid) -> Result<Project, StorageError> {
        self.read(|t| {
            owned(&t.projects, owner, id)
                .cloned()
                .ok_or(StorageError::NotFound { entity: "project" })
        })
        .await
    }

    async fn create_project(
        &self,
        owner: Uuid,
        links: ProjectLinks,
        fields: ProjectFields,
    ) -> Result<Project, StorageError> {
        self.transact(|t| {
            t.check_project_links(owner, &links)?;
            let row = Project {
                id: Uuid::new_v4(),
                owner_id: owner,
                links,
                fields,
            };
            t.projects.insert(row.id, row.clone());
            Ok(row)
        })
        .await
    }

    async fn update_project(
        &self,
        owner: Uuid,
        id: Uuid,
        links: ProjectLinks,
        fields: ProjectFields,
    ) -> Result<Project, StorageError> {
        self.transact(|t| {
            if owned(&t.projects, owner, id).is_none() {
                return Err(StorageError::NotFound { entity: "project" });
            }
            t.check_project_links(owner, &links)?;
            let row = Project {
                id,
                owner_id: owner,
                links,
                fields,
            };
            t.projects.insert(id, row.clone());
            Ok(row)
        })
        .await
    }

    async fn delete_project(&self, owner: Uuid, id: Uuid) -> Result<(), StorageError> {
        self.transact(|t| {
            if owned(&t.projects, owner, id).is_none() {
                return Err(StorageError::NotFound { entity: "project" });
            }
            if t.items.values().any(|i| i.links.project_id == Some(id)) {
                return Err(StorageError::InUse { entity: "project" });
            }
            t.projects.remove(&id);
            Ok(())
        })
        .await
    }

    async fn list_infra_items(&self, owner: Uuid) -> Result<Vec<InfraItem>, StorageError> {
        self.read(|t| {
            let mut rows: Vec<InfraItem> = t
                .items
                .values()
                .filter(|i| i.owner_id == owner)
                .cloned()
                .collect();
            rows.sort_by(|a, b| a.fields.description.cmp(&b.fields.description));
            Ok(rows)
        })
        .await
    }

    async fn get_infra_item(&self, owner: Uuid, id: Uuid) -> Result<InfraItem, StorageError> {
        self.read(|t| {
            owned(&t.items, owner, id)
                .cloned()
                .ok_or(StorageError::NotFound { entity: "infrastructure item" })
        })
        .await
    }

    async fn create_infra_item(
        &self,
        owner: Uuid,
        links: InfraItemLinks,
        fields: InfraItemFields,
        secret_ciphertext: Option<String>,
    ) -> Result<InfraItem, StorageError> {
        self.transact(|t| {
            t.check_item_links(owner, &links)?;
            let row = InfraItem {
                id: Uuid::new_v4(),
                owner_id: owner,
                links,
                fields,
                secret_ciphertext,
            };
            t.items.insert(row.id, row.clone());
            Ok(row)
        })
        .await
    }

    async fn update_infra_item(
        &self,
        owner: Uuid,
        id: Uuid,
        links: InfraItemLinks,
        fields: InfraItemFields,
        secret: SecretChange,
    ) -> Result<InfraItem, StorageError> {
        self.transact(|t| {
            let current = owned(&t.items, owner, id)
                .cloned()
                .ok_or(StorageError::NotFound { entity: "infrastructure item" })?;
            t.check_item_links(owner, &links)?;
            let secret_ciphertext = match secret {
                SecretChange::Keep => current.secret_ciphertext,
                SecretChange::Clear => None,
                SecretChange::Set(ciphertext) => Some(ciphertext),
            };
            let row = InfraItem {
                id,
                owner_id: owner,
                links,
                fields,
                secret_ciphertext,
            };
            t.items.insert(id, row.clone());
            Ok(row)
        })
        .await
    }

    async fn delete_infra_item(&self, owner: Uuid, id: Uuid) -> Result<(), StorageError> {
        self.transact(|t| {
            if owned(&t.items, owner, id).is_none() {
                return Err(StorageError::NotFound { entity: "infrastructure item" });
            }
            t.items.remove(&id);
            Ok(())
        })
        .await
    }
}
