//! Address routes.
//!
//! Addresses are created and deleted together with their client or
//! developer; this module only reads and edits them in place.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use nexus_storage::{Address, AddressFields};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::extract::ValidJson;
use crate::middleware::Caller;
use crate::state::AppState;

/// Address body, used standalone and embedded as `endereco_obj`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddressPayload {
    #[validate(length(min = 1, max = 255))]
    pub rua: String,
    #[validate(length(min = 1, max = 50))]
    pub numero: String,
    #[validate(length(max = 100))]
    pub complemento: Option<String>,
    #[validate(length(max = 100))]
    pub bairro: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub cidade: String,
    #[validate(length(min = 1, max = 50))]
    pub estado: String,
    #[validate(length(min = 1, max = 20))]
    pub cep: String,
}

impl AddressPayload {
    pub fn into_fields(self) -> AddressFields {
        AddressFields {
            street: self.rua,
            number: self.numero,
            complement: self.complemento,
            district: self.bairro,
            city: self.cidade,
            state: self.estado,
            postal_code: self.cep,
        }
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/{id}", get(get_address).put(update_address))
}

async fn get_address(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<Address>, AppError> {
    Ok(Json(state.store.get_address(caller.id(), id).await?))
}

async fn update_address(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<AddressPayload>,
) -> Result<Json<Address>, AppError> {
    let address = state
        .store
        .update_address(caller.id(), id, body.into_fields())
        .await?;
    Ok(Json(address))
}
