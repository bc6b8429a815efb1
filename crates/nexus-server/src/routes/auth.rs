//! Account registration, login and session-bound account routes.
//!
//! Login accepts the display name or the email as `username`. Unknown
//! identifiers, wrong passwords and deactivated accounts produce the same
//! 401, and an unknown identifier still costs one Argon2 run so response
//! time does not reveal which accounts exist.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use nexus_core::password;
use nexus_core::TokenLifetime;
use nexus_storage::{Account, NewAccount};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, INVALID_LOGIN};
use crate::extract::{ValidForm, ValidJson};
use crate::middleware::Caller;
use crate::state::AppState;

/// Registration body.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 150))]
    pub nome: String,
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 1024))]
    pub password: String,
}

/// Login form, in the OAuth2 password-grant shape.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1))]
    pub username: String,
    pub password: String,
    pub remember: Option<String>,
}

/// Body of `PUT /auth/me/developer`.
#[derive(Debug, Deserialize, Validate)]
pub struct LinkDeveloperRequest {
    pub id_desenvolvedor: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

/// Public account fields. The password hash is never included.
#[derive(Debug, Serialize)]
pub struct AccountView {
    pub id_usuario: Uuid,
    pub nome: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub id_desenvolvedor: Option<Uuid>,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            id_usuario: account.id,
            nome: account.name,
            email: account.email,
            is_active: account.is_active,
            is_admin: account.is_admin,
            created_at: account.created_at,
            id_desenvolvedor: account.developer_id,
        }
    }
}

/// Routes that do not need a session.
pub fn public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/users", post(register))
        .route("/auth/token", post(login))
}

/// Routes that act on the calling account.
pub fn session_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/me/developer", put(link_developer))
}

/// `true`, `on`, `1` and `yes` (any case) opt into the extended lifetime.
fn wants_remember(flag: Option<&str>) -> bool {
    flag.is_some_and(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "on" | "1" | "yes"))
}

async fn register(
    State(state): State<Arc<AppState>>,
    ValidJson(body): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AccountView>), AppError> {
    let RegisterRequest {
        nome,
        email,
        password,
    } = body;
    let password_hash =
        tokio::task::spawn_blocking(move || password::hash_password(&password)).await??;

    let account = state
        .store
        .create_account(NewAccount {
            name: nome,
            email,
            password_hash,
        })
        .await
        .map_err(|e| match e {
            nexus_storage::StorageError::Conflict { .. } => {
                AppError::BadRequest("account name or email already registered".to_owned())
            }
            other => other.into(),
        })?;

    tracing::info!(account_id = %account.id, "account registered");
    Ok((StatusCode::CREATED, Json(account.into())))
}

async fn login(
    State(state): State<Arc<AppState>>,
    ValidForm(form): ValidForm<LoginForm>,
) -> Result<Json<TokenResponse>, AppError> {
    let lifetime = if wants_remember(form.remember.as_deref()) {
        TokenLifetime::Extended
    } else {
        TokenLifetime::Standard
    };

    let candidate = state.store.find_account_by_login(&form.username).await?;
    let password = form.password;
    let verified = tokio::task::spawn_blocking(move || match candidate {
        Some(account) => password::verify_password(&password, &account.password_hash)
            .then_some(account),
        None => {
            password::burn_verification(&password);
            None
        }
    })
    .await?;

    let Some(account) = verified.filter(|a| a.is_active) else {
        tracing::info!("login rejected");
        return Err(AppError::Unauthorized(INVALID_LOGIN));
    };

    let access_token = state.sessions.issue(account.id, lifetime)?;
    tracing::info!(account_id = %account.id, ?lifetime, "session issued");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}

async fn me(Extension(caller): Extension<Caller>) -> Json<AccountView> {
    Json(caller.account.into())
}

async fn link_developer(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    ValidJson(body): ValidJson<LinkDeveloperRequest>,
) -> Result<Json<AccountView>, AppError> {
    let account = state
        .store
        .link_account_developer(caller.id(), body.id_desenvolvedor)
        .await?;
    Ok(Json(account.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remember_flag_values() {
        for yes in ["true", "on", "1", "yes", "TRUE", "On", " yes "] {
            assert!(wants_remember(Some(yes)), "{yes}");
        }
        for no in ["false", "off", "0", "no", "", "y"] {
            assert!(!wants_remember(Some(no)), "{no}");
        }
        assert!(!wants_remember(None));
    }
}
