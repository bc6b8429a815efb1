//! Client routes.
//!
//! A client is written together with its address (`endereco_obj`) in one
//! transaction. Email addresses are unique per account.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use nexus_storage::{Client, ClientFields};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::addresses::AddressPayload;
use crate::error::AppError;
use crate::extract::ValidJson;
use crate::middleware::Caller;
use crate::state::AppState;

/// Client body for create and update.
///
/// `endereco_obj` is required on create. On update it is optional and,
/// when present, replaces the stored address fields.
#[derive(Debug, Deserialize, Validate)]
pub struct ClientPayload {
    #[validate(length(min = 1, max = 255))]
    pub nome: String,
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(max = 50))]
    pub telefone: Option<String>,
    #[validate(length(max = 255))]
    pub pessoa_contato: Option<String>,
    #[validate(length(max = 50))]
    pub documento_fiscal: Option<String>,
    #[validate(length(max = 100))]
    pub segmento: Option<String>,
    #[validate(length(max = 50))]
    pub status_relacionamento: Option<String>,
    #[validate(length(max = 100))]
    pub origem: Option<String>,
    pub observacoes: Option<String>,
    pub data_ultimo_contato: Option<DateTime<Utc>>,
    #[validate(nested)]
    pub endereco_obj: Option<AddressPayload>,
}

impl ClientPayload {
    /// Split into the client columns and the optional address.
    fn into_parts(self) -> (ClientFields, Option<AddressPayload>) {
        let fields = ClientFields {
            name: self.nome,
            email: self.email,
            phone: self.telefone,
            contact_person: self.pessoa_contato,
            tax_document: self.documento_fiscal,
            segment: self.segmento,
            relationship_status: self.status_relacionamento,
            origin: self.origem,
            notes: self.observacoes,
            last_contact_at: self.data_ultimo_contato,
        };
        (fields, self.endereco_obj)
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_clients).post(create_client))
        .route("/{id}", get(get_client).put(update_client).delete(delete_client))
}

async fn list_clients(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<Client>>, AppError> {
    Ok(Json(state.store.list_clients(caller.id()).await?))
}

async fn get_client(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<Client>, AppError> {
    Ok(Json(state.store.get_client(caller.id(), id).await?))
}

async fn create_client(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ValidJson(body): ValidJson<ClientPayload>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    let (fields, address) = body.into_parts();
    let address =
        address.ok_or_else(|| AppError::BadRequest("endereco_obj is required".to_owned()))?;
    let client = state
        .store
        .create_client(caller.id(), fields, address.into_fields())
        .await?;
    tracing::info!(account_id = %caller.id(), client_id = %client.id, "client created");
    Ok((StatusCode::CREATED, Json(client)))
}

async fn update_client(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<ClientPayload>,
) -> Result<Json<Client>, AppError> {
    let (fields, address) = body.into_parts();
    let client = state
        .store
        .update_client(caller.id(), id, fields, address.map(AddressPayload::into_fields))
        .await?;
    Ok(Json(client))
}

async fn delete_client(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store.delete_client(caller.id(), id).await?;
    tracing::info!(account_id = %caller.id(), client_id = %id, "client deleted");
    Ok(StatusCode::NO_CONTENT)
}
