//! Session authentication middleware.
//!
//! Reads `Authorization: Bearer <token>`, validates the token, loads the
//! account it names and injects a [`Caller`] into the request extensions.
//! Every failure (missing header, wrong scheme, bad signature, expired
//! token, unknown or deactivated account) yields the same 401.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use nexus_storage::Account;
use uuid::Uuid;

use crate::error::{AppError, INVALID_SESSION};
use crate::state::AppState;

/// The authenticated account behind a request.
#[derive(Debug, Clone)]
pub struct Caller {
    pub account: Account,
}

impl Caller {
    /// Owner id for every store call made on behalf of this caller.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.account.id
    }
}

/// Extract the token from an `Authorization` header value.
///
/// The scheme is matched case-insensitively.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Axum middleware that requires a valid session.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] when no valid session is presented.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or(AppError::Unauthorized(INVALID_SESSION))?;

    let account_id = state.sessions.validate(token)?;
    let account = state
        .store
        .get_account(account_id)
        .await?
        .filter(|a| a.is_active)
        .ok_or(AppError::Unauthorized(INVALID_SESSION))?;

    req.extensions_mut().insert(Caller { account });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
    }

    #[test]
    fn other_schemes_are_rejected() {
        assert_eq!(bearer_token("Basic dXNlcjpwdw=="), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer   "), None);
    }
}
