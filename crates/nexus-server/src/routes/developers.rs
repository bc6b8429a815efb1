//! Developer routes.
//!
//! Same shape as the client routes, with a required tax document and an
//! optional non-negative hourly rate.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use nexus_storage::{Developer, DeveloperFields};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::addresses::AddressPayload;
use crate::error::AppError;
use crate::extract::ValidJson;
use crate::middleware::Caller;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct DeveloperPayload {
    #[validate(length(min = 1, max = 255))]
    pub nome: String,
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(max = 50))]
    pub telefone: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub documento_fiscal: String,
    #[validate(length(max = 50))]
    pub tipo_contrato: Option<String>,
    #[validate(custom(function = "non_negative"))]
    pub taxa_horaria: Option<Decimal>,
    #[validate(nested)]
    pub endereco_obj: Option<AddressPayload>,
}

/// Reject negative money amounts.
pub(crate) fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("negative_amount"));
    }
    Ok(())
}

impl DeveloperPayload {
    fn into_parts(self) -> (DeveloperFields, Option<AddressPayload>) {
        let fields = DeveloperFields {
            name: self.nome,
            email: self.email,
            phone: self.telefone,
            tax_document: self.documento_fiscal,
            contract_type: self.tipo_contrato,
            hourly_rate: self.taxa_horaria,
        };
        (fields, self.endereco_obj)
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_developers).post(create_developer))
        .route(
            "/{id}",
            get(get_developer)
                .put(update_developer)
                .delete(delete_developer),
        )
}

async fn list_developers(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<Developer>>, AppError> {
    Ok(Json(state.store.list_developers(caller.id()).await?))
}

async fn get_developer(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<Developer>, AppError> {
    Ok(Json(state.store.get_developer(caller.id(), id).await?))
}

async fn create_developer(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ValidJson(body): ValidJson<DeveloperPayload>,
) -> Result<(StatusCode, Json<Developer>), AppError> {
    let (fields, address) = body.into_parts();
    let address =
        address.ok_or_else(|| AppError::BadRequest("endereco_obj is required".to_owned()))?;
    let developer = state
        .store
        .create_developer(caller.id(), fields, address.into_fields())
        .await?;
    tracing::info!(account_id = %caller.id(), developer_id = %developer.id, "developer created");
    Ok((StatusCode::CREATED, Json(developer)))
}

async fn update_developer(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<DeveloperPayload>,
) -> Result<Json<Developer>, AppError> {
    let (fields, address) = body.into_parts();
    let developer = state
        .store
        .update_developer(caller.id(), id, fields, address.map(AddressPayload::into_fields))
        .await?;
    Ok(Json(developer))
}

async fn delete_developer(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store.delete_developer(caller.id(), id).await?;
    tracing::info!(account_id = %caller.id(), developer_id = %id, "developer deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn negative_rate_is_rejected() {
        let body: DeveloperPayload = serde_json::from_value(serde_json::json!({
            "nome": "Ana",
            "email": "ana@example.com",
            "documento_fiscal": "123",
            "taxa_horaria": "-1.50",
        }))
        .unwrap();
        assert!(body.validate().is_err());
    }

    #[test]
    fn rate_accepts_number_or_string() {
        for rate in [serde_json::json!(85.5), serde_json::json!("85.50")] {
            let body: DeveloperPayload = serde_json::from_value(serde_json::json!({
                "nome": "Ana",
                "email": "ana@example.com",
                "documento_fiscal": "123",
                "taxa_horaria": rate,
            }))
            .unwrap();
            assert!(body.validate().is_ok());
            assert!(body.taxa_horaria.is_some());
        }
    }
}
