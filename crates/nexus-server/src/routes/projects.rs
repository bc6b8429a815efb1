//! Project routes. Projects reference their client and developer by id.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use nexus_storage::{Project, ProjectFields, ProjectLinks};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::developers::non_negative;
use crate::error::AppError;
use crate::extract::ValidJson;
use crate::middleware::Caller;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ProjectPayload {
    pub id_cliente: Uuid,
    pub id_desenvolvedor: Option<Uuid>,
    #[validate(length(min = 1, max = 255))]
    pub titulo: String,
    pub escopo: String,
    #[validate(length(min = 1, max = 50))]
    pub status_projeto: String,
    pub data_inicio: Option<DateTime<Utc>>,
    pub data_limite: Option<DateTime<Utc>>,
    #[validate(custom(function = "non_negative"))]
    pub orcamento: Option<Decimal>,
    pub notas_internas: Option<String>,
}

impl ProjectPayload {
    fn into_parts(self) -> (ProjectLinks, ProjectFields) {
        let links = ProjectLinks {
            client_id: self.id_cliente,
            developer_id: self.id_desenvolvedor,
        };
        let fields = ProjectFields {
            title: self.titulo,
            scope: self.escopo,
            status: self.status_projeto,
            starts_at: self.data_inicio,
            due_at: self.data_limite,
            budget: self.orcamento,
            internal_notes: self.notas_internas,
        };
        (links, fields)
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route(
            "/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
}

async fn list_projects(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<Project>>, AppError> {
    Ok(Json(state.store.list_projects(caller.id()).await?))
}

async fn get_project(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    Ok(Json(state.store.get_project(caller.id(), id).await?))
}

async fn create_project(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ValidJson(body): ValidJson<ProjectPayload>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let (links, fields) = body.into_parts();
    let project = state.store.create_project(caller.id(), links, fields).await?;
    tracing::info!(account_id = %caller.id(), project_id = %project.id, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

async fn update_project(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<ProjectPayload>,
) -> Result<Json<Project>, AppError> {
    let (links, fields) = body.into_parts();
    let project = state
        .store
        .update_project(caller.id(), id, links, fields)
        .await?;
    Ok(Json(project))
}

async fn delete_project(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store.delete_project(caller.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
