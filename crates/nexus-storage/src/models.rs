//! Persisted records and the per-entity field sets used for writes.
//!
//! Rust names are English; column names keep the persisted Portuguese layout
//! (`#[sqlx(rename)]`) and the wire names match them (`#[serde(rename)]`).
//! Each `*Fields` struct enumerates exactly the columns a create or update may
//! set. Identity, ownership and timestamps are never part of a field set.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// A registered account. The password hash never leaves the server.
#[derive(Clone)]
#[cfg_attr(feature = "postgres-backend", derive(sqlx::FromRow))]
pub struct Account {
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "id_usuario"))]
    pub id: Uuid,
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "nome"))]
    pub name: String,
    pub email: Option<String>,
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "hashed_password"))]
    pub password_hash: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "id_desenvolvedor"))]
    pub developer_id: Option<Uuid>,
}

impl Account {
    /// Whether `login` names this account, by display name or email.
    pub fn answers_to(&self, login: &str) -> bool {
        self.name == login || self.email.as_deref() == Some(login)
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("is_active", &self.is_active)
            .field("is_admin", &self.is_admin)
            .field("created_at", &self.created_at)
            .field("developer_id", &self.developer_id)
            .finish()
    }
}

/// Input for account registration. The hash is computed by the caller.
#[derive(Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: Option<String>,
    pub password_hash: String,
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// Postal address columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres-backend", derive(sqlx::FromRow))]
pub struct AddressFields {
    #[serde(rename = "rua")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "rua"))]
    pub street: String,
    #[serde(rename = "numero")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "numero"))]
    pub number: String,
    #[serde(rename = "complemento")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "complemento"))]
    pub complement: Option<String>,
    #[serde(rename = "bairro")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "bairro"))]
    pub district: Option<String>,
    #[serde(rename = "cidade")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "cidade"))]
    pub city: String,
    #[serde(rename = "estado")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "estado"))]
    pub state: String,
    #[serde(rename = "cep")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "cep"))]
    pub postal_code: String,
}

/// A stored address, owned by the account that created its client or
/// developer.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "postgres-backend", derive(sqlx::FromRow))]
pub struct Address {
    #[serde(rename = "id_endereco")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "id_endereco"))]
    pub id: Uuid,
    #[serde(skip)]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "user_id"))]
    pub owner_id: Uuid,
    #[serde(flatten)]
    #[cfg_attr(feature = "postgres-backend", sqlx(flatten))]
    pub fields: AddressFields,
    #[serde(rename = "data_criacao")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "data_criacao"))]
    pub created_at: DateTime<Utc>,
}

/// Client columns a create or update may set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres-backend", derive(sqlx::FromRow))]
pub struct ClientFields {
    #[serde(rename = "nome")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "nome"))]
    pub name: String,
    pub email: String,
    #[serde(rename = "telefone")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "telefone"))]
    pub phone: Option<String>,
    #[serde(rename = "pessoa_contato")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "pessoa_contato"))]
    pub contact_person: Option<String>,
    #[serde(rename = "documento_fiscal")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "documento_fiscal"))]
    pub tax_document: Option<String>,
    #[serde(rename = "segmento")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "segmento"))]
    pub segment: Option<String>,
    #[serde(rename = "status_relacionamento")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "status_relacionamento"))]
    pub relationship_status: Option<String>,
    #[serde(rename = "origem")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "origem"))]
    pub origin: Option<String>,
    #[serde(rename = "observacoes")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "observacoes"))]
    pub notes: Option<String>,
    #[serde(rename = "data_ultimo_contato")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "data_ultimo_contato"))]
    pub last_contact_at: Option<DateTime<Utc>>,
}

/// A stored client together with its address.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "postgres-backend", derive(sqlx::FromRow))]
pub struct Client {
    #[serde(rename = "id_cliente")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "id_cliente"))]
    pub id: Uuid,
    #[serde(skip)]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "user_id"))]
    pub owner_id: Uuid,
    #[serde(rename = "id_endereco")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "id_endereco"))]
    pub address_id: Option<Uuid>,
    #[serde(flatten)]
    #[cfg_attr(feature = "postgres-backend", sqlx(flatten))]
    pub fields: ClientFields,
    #[serde(rename = "data_criacao")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "data_criacao"))]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "endereco_obj")]
    #[cfg_attr(feature = "postgres-backend", sqlx(skip))]
    pub address: Option<Address>,
}

/// Developer columns a create or update may set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres-backend", derive(sqlx::FromRow))]
pub struct DeveloperFields {
    #[serde(rename = "nome")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "nome"))]
    pub name: String,
    pub email: String,
    #[serde(rename = "telefone")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "telefone"))]
    pub phone: Option<String>,
    #[serde(rename = "documento_fiscal")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "documento_fiscal"))]
    pub tax_document: String,
    #[serde(rename = "tipo_contrato")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "tipo_contrato"))]
    pub contract_type: Option<String>,
    #[serde(rename = "taxa_horaria")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "taxa_horaria"))]
    pub hourly_rate: Option<Decimal>,
}

/// A stored developer together with its address.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "postgres-backend", derive(sqlx::FromRow))]
pub struct Developer {
    #[serde(rename = "id_desenvolvedor")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "id_desenvolvedor"))]
    pub id: Uuid,
    #[serde(skip)]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "user_id"))]
    pub owner_id: Uuid,
    #[serde(rename = "id_endereco")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "id_endereco"))]
    pub address_id: Uuid,
    #[serde(flatten)]
    #[cfg_attr(feature = "postgres-backend", sqlx(flatten))]
    pub fields: DeveloperFields,
    #[serde(rename = "data_criacao")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "data_criacao"))]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "endereco_obj")]
    #[cfg_attr(feature = "postgres-backend", sqlx(skip))]
    pub address: Option<Address>,
}

/// Project columns a create or update may set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres-backend", derive(sqlx::FromRow))]
pub struct ProjectFields {
    #[serde(rename = "titulo")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "titulo"))]
    pub title: String,
    #[serde(rename = "escopo")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "escopo"))]
    pub scope: String,
    #[serde(rename = "status_projeto")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "status_projeto"))]
    pub status: String,
    #[serde(rename = "data_inicio")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "data_inicio"))]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(rename = "data_limite")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "data_limite"))]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(rename = "orcamento")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "orcamento"))]
    pub budget: Option<Decimal>,
    #[serde(rename = "notas_internas")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "notas_internas"))]
    pub internal_notes: Option<String>,
}

/// Foreign keys of a project. Both are checked against the owner on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres-backend", derive(sqlx::FromRow))]
pub struct ProjectLinks {
    #[serde(rename = "id_cliente")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "id_cliente"))]
    pub client_id: Uuid,
    #[serde(rename = "id_desenvolvedor")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "id_desenvolvedor"))]
    pub developer_id: Option<Uuid>,
}

/// A stored project. Related records are referenced by id only.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "postgres-backend", derive(sqlx::FromRow))]
pub struct Project {
    #[serde(rename = "id_servico")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "id_servico"))]
    pub id: Uuid,
    #[serde(skip)]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "user_id"))]
    pub owner_id: Uuid,
    #[serde(flatten)]
    #[cfg_attr(feature = "postgres-backend", sqlx(flatten))]
    pub links: ProjectLinks,
    #[serde(flatten)]
    #[cfg_attr(feature = "postgres-backend", sqlx(flatten))]
    pub fields: ProjectFields,
}

/// Infrastructure item columns a create or update may set, excluding the
/// secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres-backend", derive(sqlx::FromRow))]
pub struct InfraItemFields {
    #[serde(rename = "tipo_item")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "tipo_item"))]
    pub kind: String,
    #[serde(rename = "descricao")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "descricao"))]
    pub description: String,
    #[serde(rename = "url_acesso")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "url_acesso"))]
    pub access_url: Option<String>,
    #[serde(rename = "usuario")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "usuario"))]
    pub username: Option<String>,
    #[serde(rename = "is_critico")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "is_critico"))]
    pub is_critical: bool,
    #[serde(rename = "data_expiracao")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "data_expiracao"))]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "notas_acesso")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "notas_acesso"))]
    pub access_notes: Option<String>,
}

/// Foreign keys of an infrastructure item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres-backend", derive(sqlx::FromRow))]
pub struct InfraItemLinks {
    #[serde(rename = "id_cliente")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "id_cliente"))]
    pub client_id: Uuid,
    #[serde(rename = "id_desenvolvedor")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "id_desenvolvedor"))]
    pub developer_id: Option<Uuid>,
    #[serde(rename = "id_servico")]
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "id_servico"))]
    pub project_id: Option<Uuid>,
}

/// A stored infrastructure item.
///
/// `secret_ciphertext` holds the encrypted secret exactly as persisted. Not
/// `Serialize`: responses are built from a masked projection.
#[derive(Clone)]
#[cfg_attr(feature = "postgres-backend", derive(sqlx::FromRow))]
pub struct InfraItem {
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "id_item"))]
    pub id: Uuid,
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "user_id"))]
    pub owner_id: Uuid,
    #[cfg_attr(feature = "postgres-backend", sqlx(flatten))]
    pub links: InfraItemLinks,
    #[cfg_attr(feature = "postgres-backend", sqlx(flatten))]
    pub fields: InfraItemFields,
    #[cfg_attr(feature = "postgres-backend", sqlx(rename = "referencia_senha"))]
    pub secret_ciphertext: Option<String>,
}

impl std::fmt::Debug for InfraItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfraItem")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("links", &self.links)
            .field("fields", &self.fields)
            .field(
                "secret_ciphertext",
                &self.secret_ciphertext.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// What an item update does to the stored secret.
#[derive(Clone, PartialEq, Eq)]
pub enum SecretChange {
    /// Leave the stored ciphertext untouched.
    Keep,
    /// Remove the stored secret.
    Clear,
    /// Replace the stored secret with this ciphertext.
    Set(String),
}

impl std::fmt::Debug for SecretChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keep => f.write_str("Keep"),
            Self::Clear => f.write_str("Clear"),
            Self::Set(_) => f.write_str("Set([REDACTED])"),
        }
    }
}
