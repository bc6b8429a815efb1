//! Infrastructure item routes.
//!
//! The plaintext secret (`referencia_senha`) only crosses this module in
//! two places: on write, where it is encrypted before reaching the store,
//! and in `GET /infra/decrypt/{id}`, which is audited. Every other
//! response goes through [`InfraItemView`], which has no field able to
//! hold the ciphertext.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use nexus_core::SecretCipher;
use nexus_storage::{InfraItem, InfraItemFields, InfraItemLinks, SecretChange};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::AppError;
use crate::extract::{present, ValidJson};
use crate::middleware::Caller;
use crate::state::AppState;

/// Shown in place of any stored secret.
pub const SECRET_MASK: &str = "*** CRIPTOGRAFADO ***";

const MAX_SECRET_LEN: usize = 512;

/// Item body for create and update.
///
/// `referencia_senha` is tri-state: absent keeps the stored secret,
/// `null` or `""` clears it, any other string replaces it.
#[derive(Deserialize, Validate)]
#[validate(schema(function = "secret_within_limit", skip_on_field_errors = false))]
pub struct InfraItemPayload {
    pub id_cliente: Uuid,
    pub id_desenvolvedor: Option<Uuid>,
    pub id_servico: Option<Uuid>,
    #[validate(length(min = 1, max = 50))]
    pub tipo_item: String,
    #[validate(length(min = 1, max = 255))]
    pub descricao: String,
    #[validate(length(max = 512))]
    pub url_acesso: Option<String>,
    #[validate(length(max = 100))]
    pub usuario: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub referencia_senha: Option<Option<String>>,
    #[serde(default)]
    pub is_critico: bool,
    pub data_expiracao: Option<DateTime<Utc>>,
    pub notas_acesso: Option<String>,
}

impl std::fmt::Debug for InfraItemPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfraItemPayload")
            .field("id_cliente", &self.id_cliente)
            .field("tipo_item", &self.tipo_item)
            .field("descricao", &self.descricao)
            .field("referencia_senha", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

fn secret_within_limit(payload: &InfraItemPayload) -> Result<(), ValidationError> {
    match &payload.referencia_senha {
        Some(Some(secret)) if secret.chars().count() > MAX_SECRET_LEN => {
            Err(ValidationError::new("secret_too_long"))
        }
        _ => Ok(()),
    }
}

/// What the body asks for, with the secret still in plaintext.
enum RequestedSecret {
    Keep,
    Clear,
    Set(String),
}

impl InfraItemPayload {
    fn into_parts(self) -> (InfraItemLinks, InfraItemFields, RequestedSecret) {
        let links = InfraItemLinks {
            client_id: self.id_cliente,
            developer_id: self.id_desenvolvedor,
            project_id: self.id_servico,
        };
        let fields = InfraItemFields {
            kind: self.tipo_item,
            description: self.descricao,
            access_url: self.url_acesso,
            username: self.usuario,
            is_critical: self.is_critico,
            expires_at: self.data_expiracao,
            access_notes: self.notas_acesso,
        };
        let secret = match self.referencia_senha {
            None => RequestedSecret::Keep,
            Some(None) => RequestedSecret::Clear,
            Some(Some(s)) if s.is_empty() => RequestedSecret::Clear,
            Some(Some(s)) => RequestedSecret::Set(s),
        };
        (links, fields, secret)
    }
}

impl RequestedSecret {
    /// Encrypt a new secret; pass the other cases through.
    fn seal(self, cipher: &SecretCipher) -> Result<SecretChange, AppError> {
        Ok(match self {
            Self::Keep => SecretChange::Keep,
            Self::Clear => SecretChange::Clear,
            Self::Set(plaintext) => SecretChange::Set(cipher.encrypt(&plaintext)?),
        })
    }
}

/// Masked projection of an item, the only shape read paths return.
#[derive(Debug, Serialize)]
pub struct InfraItemView {
    pub id_item: Uuid,
    #[serde(flatten)]
    pub links: InfraItemLinks,
    #[serde(flatten)]
    pub fields: InfraItemFields,
    pub referencia_senha: &'static str,
    pub has_secret: bool,
}

impl From<InfraItem> for InfraItemView {
    fn from(item: InfraItem) -> Self {
        Self {
            id_item: item.id,
            links: item.links,
            fields: item.fields,
            referencia_senha: SECRET_MASK,
            has_secret: item.secret_ciphertext.is_some(),
        }
    }
}

/// Body of the decrypt endpoint.
#[derive(Serialize)]
pub struct RevealedSecret {
    pub id_item: Uuid,
    pub secret: String,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/{id}", get(get_item).put(update_item).delete(delete_item))
        .route("/decrypt/{id}", get(reveal_secret))
}

async fn list_items(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<InfraItemView>>, AppError> {
    let items = state.store.list_infra_items(caller.id()).await?;
    Ok(Json(items.into_iter().map(InfraItemView::from).collect()))
}

async fn get_item(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<InfraItemView>, AppError> {
    let item = state.store.get_infra_item(caller.id(), id).await?;
    Ok(Json(item.into()))
}

async fn create_item(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ValidJson(body): ValidJson<InfraItemPayload>,
) -> Result<(StatusCode, Json<InfraItemView>), AppError> {
    let (links, fields, secret) = body.into_parts();
    let ciphertext = match secret.seal(&state.cipher)? {
        SecretChange::Set(ciphertext) => Some(ciphertext),
        SecretChange::Keep | SecretChange::Clear => None,
    };
    let item = state
        .store
        .create_infra_item(caller.id(), links, fields, ciphertext)
        .await?;
    tracing::info!(
        account_id = %caller.id(),
        item_id = %item.id,
        has_secret = item.secret_ciphertext.is_some(),
        "infra item created"
    );
    Ok((StatusCode::CREATED, Json(item.into())))
}

async fn update_item(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<InfraItemPayload>,
) -> Result<Json<InfraItemView>, AppError> {
    let (links, fields, secret) = body.into_parts();
    let change = secret.seal(&state.cipher)?;
    let item = state
        .store
        .update_infra_item(caller.id(), id, links, fields, change)
        .await?;
    Ok(Json(item.into()))
}

async fn delete_item(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store.delete_infra_item(caller.id(), id).await?;
    tracing::info!(account_id = %caller.id(), item_id = %id, "infra item deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn reveal_secret(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<RevealedSecret>, AppError> {
    let item = state.store.get_infra_item(caller.id(), id).await?;
    let Some(ciphertext) = item.secret_ciphertext else {
        return Err(AppError::NotFound("item has no stored secret".to_owned()));
    };

    let secret = match state.cipher.decrypt(&ciphertext) {
        Ok(secret) => secret,
        Err(err) => {
            tracing::warn!(
                target: "nexus::audit",
                account_id = %caller.id(),
                item_id = %id,
                outcome = "failed",
                "secret reveal"
            );
            return Err(AppError::Decryption(err));
        }
    };

    tracing::info!(
        target: "nexus::audit",
        account_id = %caller.id(),
        item_id = %id,
        outcome = "revealed",
        "secret reveal"
    );
    Ok(Json(RevealedSecret { id_item: id, secret }))
}
