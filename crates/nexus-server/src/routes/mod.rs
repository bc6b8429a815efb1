//! HTTP route modules and router assembly.

pub mod addresses;
pub mod auth;
pub mod clients;
pub mod developers;
pub mod health;
pub mod infra;
pub mod projects;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::middleware as axum_mw;
use axum::Router;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::AllowedOrigins;
use crate::middleware::require_session;
use crate::state::AppState;

/// Concurrent password hashes allowed across all public auth routes.
const PUBLIC_AUTH_CONCURRENCY: usize = 16;

/// Build the full application router with all routes and layers.
pub fn build_router(state: Arc<AppState>, origins: &AllowedOrigins) -> Router {
    let authenticated = Router::new()
        .merge(auth::session_router())
        .nest("/clientes", clients::router())
        .nest("/desenvolvedores", developers::router())
        .nest("/enderecos", addresses::router())
        .nest("/projetos", projects::router())
        .nest("/infra", infra::router())
        .route_layer(axum_mw::from_fn_with_state(
            Arc::clone(&state),
            require_session,
        ));

    // Registration and login hash passwords; bound the work in flight.
    let public_auth = shared_concurrency_limit(auth::public_router(), PUBLIC_AUTH_CONCURRENCY);

    Router::new()
        .merge(health::router())
        .merge(public_auth)
        .merge(authenticated)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(origins))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}

/// Limit in-flight requests across every route of `router` together.
///
/// `Router::layer` wraps each route separately, so the semaphore has to be
/// shared up front or every route would get its own budget.
fn shared_concurrency_limit<S>(router: Router<S>, max: usize) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(GlobalConcurrencyLimitLayer::new(max))
}

fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    match origins {
        AllowedOrigins::Any => layer.allow_origin(Any),
        AllowedOrigins::List(list) => layer.allow_origin(list.clone()),
    }
}
