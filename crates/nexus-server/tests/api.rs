//! End-to-end tests for the HTTP API.
//!
//! Each test drives the full router (session middleware, validation,
//! error mapping) against the in-memory store with `tower::ServiceExt`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use nexus_core::{SecretCipher, SessionKeys, TokenPolicy};
use nexus_server::config::AllowedOrigins;
use nexus_server::routes::{self, infra::SECRET_MASK};
use nexus_server::state::AppState;
use nexus_storage::{MemoryStore, Store};

const SESSION_SECRET: &[u8] = b"integration-test-session-secret-0123456789";

fn sessions() -> SessionKeys {
    SessionKeys::new(SESSION_SECRET, TokenPolicy::default())
}

fn app_with(store: Arc<dyn Store>, cipher: SecretCipher) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(store, cipher, sessions()));
    let router = routes::build_router(Arc::clone(&state), &AllowedOrigins::Any);
    (router, state)
}

fn app() -> (Router, Arc<AppState>) {
    let (cipher, _) = SecretCipher::generate();
    app_with(Arc::new(MemoryStore::new()), cipher)
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

async fn send(app: &Router, request: Request<Body>) -> Reply {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    Reply {
        status,
        headers,
        body,
    }
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    send(app, request).await
}

async fn register(app: &Router, name: &str, password: &str) {
    let reply = call(
        app,
        Method::POST,
        "/auth/users",
        None,
        Some(json!({ "nome": name, "email": format!("{name}@example.com"), "password": password })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    assert!(reply.body.get("hashed_password").is_none());
}

async fn login_form(app: &Router, form: &str) -> Reply {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_owned()))
        .unwrap();
    send(app, request).await
}

async fn login(app: &Router, name: &str, password: &str) -> String {
    let reply = login_form(app, &format!("username={name}&password={password}")).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["token_type"], "bearer");
    reply.body["access_token"].as_str().unwrap().to_owned()
}

async fn signed_in(app: &Router, name: &str) -> String {
    register(app, name, "correct-horse-battery").await;
    login(app, name, "correct-horse-battery").await
}

fn address() -> Value {
    json!({
        "rua": "Rua das Flores",
        "numero": "42",
        "cidade": "Curitiba",
        "estado": "PR",
        "cep": "80000-000",
    })
}

async fn create_client(app: &Router, token: &str, email: &str) -> String {
    let reply = call(
        app,
        Method::POST,
        "/clientes",
        Some(token),
        Some(json!({ "nome": "Acme", "email": email, "endereco_obj": address() })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.body["id_cliente"].as_str().unwrap().to_owned()
}

fn item_body(client_id: &str, secret: Option<Value>) -> Value {
    let mut body = json!({
        "id_cliente": client_id,
        "tipo_item": "database",
        "descricao": "primary postgres",
        "usuario": "admin",
    });
    if let Some(secret) = secret {
        body["referencia_senha"] = secret;
    }
    body
}

async fn create_item(app: &Router, token: &str, client_id: &str, secret: Option<Value>) -> String {
    let reply = call(app, Method::POST, "/infra", Some(token), Some(item_body(client_id, secret))).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    assert_eq!(reply.body["referencia_senha"], SECRET_MASK);
    reply.body["id_item"].as_str().unwrap().to_owned()
}

async fn reveal(app: &Router, token: &str, item_id: &str) -> Reply {
    call(app, Method::GET, &format!("/infra/decrypt/{item_id}"), Some(token), None).await
}

// ── Health and session gate ──────────────────────────────────────────

#[tokio::test]
async fn health_check_is_public() {
    let (app, _) = app();
    let reply = call(&app, Method::GET, "/", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "OK");
    assert_eq!(reply.headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let (app, _) = app();
    for uri in ["/clientes", "/desenvolvedores", "/projetos", "/infra", "/auth/me"] {
        let reply = call(&app, Method::GET, uri, None, None).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(reply.headers.get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
    }

    let reply = call(&app, Method::GET, "/clientes", Some("not-a-token"), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_the_caller_without_hash() {
    let (app, _) = app();
    let token = signed_in(&app, "alice").await;
    let reply = call(&app, Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["nome"], "alice");
    assert!(reply.body.get("hashed_password").is_none());
    assert!(reply.body.get("password_hash").is_none());
}

// ── Login ────────────────────────────────────────────────────────────

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let (app, _) = app();
    register(&app, "alice", "correct-horse-battery").await;

    let wrong_password = login_form(&app, "username=alice&password=nope-nope-nope").await;
    let unknown_user = login_form(&app, "username=mallory&password=nope-nope-nope").await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_user.body);
    assert_eq!(
        wrong_password.headers.get(header::WWW_AUTHENTICATE),
        unknown_user.headers.get(header::WWW_AUTHENTICATE)
    );
}

#[tokio::test]
async fn login_accepts_email_as_username() {
    let (app, _) = app();
    register(&app, "alice", "correct-horse-battery").await;
    login(&app, "alice@example.com", "correct-horse-battery").await;
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let (app, _) = app();
    register(&app, "alice", "correct-horse-battery").await;
    let reply = call(
        &app,
        Method::POST,
        "/auth/users",
        None,
        Some(json!({ "nome": "alice", "password": "another-password" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn email_cannot_be_claimed_as_another_name() {
    let (app, _) = app();
    register(&app, "alice", "correct-horse-battery").await;

    let reply = call(
        &app,
        Method::POST,
        "/auth/users",
        None,
        Some(json!({ "nome": "alice@example.com", "password": "mallory-password" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = call(
        &app,
        Method::POST,
        "/auth/users",
        None,
        Some(json!({ "nome": "ops@example.com", "password": "ops-password-1" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let reply = call(
        &app,
        Method::POST,
        "/auth/users",
        None,
        Some(json!({ "nome": "mallory", "email": "ops@example.com", "password": "mallory-password" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let reply = login_form(&app, "username=ops%40example.com&password=mallory-password").await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    // The owner keeps logging in by email, every time.
    for _ in 0..5 {
        login(&app, "alice@example.com", "correct-horse-battery").await;
    }
    let reply = login_form(&app, "username=alice%40example.com&password=mallory-password").await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rejected_password_is_not_echoed() {
    let (app, _) = app();
    let reply = call(
        &app,
        Method::POST,
        "/auth/users",
        None,
        Some(json!({ "nome": "alice", "password": "Hunt3r!" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let body = reply.body.to_string();
    assert!(body.contains("password"), "{body}");
    assert!(!body.contains("Hunt3r!"), "{body}");

    // A value of the wrong type is not quoted back either.
    let reply = call(
        &app,
        Method::POST,
        "/auth/users",
        None,
        Some(json!({ "nome": "alice", "password": 73_519_246_801_u64 })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(!reply.body.to_string().contains("73519246801"));
}

#[tokio::test]
async fn oversized_secret_is_not_echoed() {
    let (app, _) = app();
    let token = signed_in(&app, "alice").await;
    let client_id = create_client(&app, &token, "acme@example.com").await;
    let secret = format!("s3cr3t-{}", "x".repeat(600));

    let reply = call(&app, Method::POST, "/infra", Some(&token), Some(item_body(&client_id, Some(json!(secret))))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(!reply.body.to_string().contains("s3cr3t-"));
}

#[tokio::test]
async fn remember_extends_token_lifetime() {
    let (app, state) = app();
    register(&app, "alice", "correct-horse-battery").await;
    let three_days = Utc::now() + Duration::days(3);

    let standard = login(&app, "alice", "correct-horse-battery").await;
    assert!(state.sessions.validate_at(&standard, three_days).is_err());

    let reply = login_form(&app, "username=alice&password=correct-horse-battery&remember=true").await;
    assert_eq!(reply.status, StatusCode::OK);
    let extended = reply.body["access_token"].as_str().unwrap();
    assert!(state.sessions.validate_at(extended, three_days).is_ok());
    assert!(state.sessions.validate_at(extended, Utc::now() + Duration::days(8)).is_err());
}

// ── Ownership ────────────────────────────────────────────────────────

#[tokio::test]
async fn records_of_other_accounts_are_not_found() {
    let (app, _) = app();
    let alice = signed_in(&app, "alice").await;
    let bob = signed_in(&app, "bob").await;

    let client_id = create_client(&app, &alice, "acme@example.com").await;
    let item_id = create_item(&app, &alice, &client_id, Some(json!("p@ss"))).await;

    let uris = [
        format!("/clientes/{client_id}"),
        format!("/infra/{item_id}"),
        format!("/infra/decrypt/{item_id}"),
    ];
    for uri in &uris {
        let reply = call(&app, Method::GET, uri, Some(&bob), None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND, "{uri}");
    }

    let reply = call(&app, Method::DELETE, &format!("/clientes/{client_id}"), Some(&bob), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = call(&app, Method::GET, "/clientes", Some(&bob), None).await;
    assert_eq!(reply.body, json!([]));

    // Bob cannot hang his own item on Alice's client either.
    let reply = call(&app, Method::POST, "/infra", Some(&bob), Some(item_body(&client_id, None))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let reply = call(&app, Method::GET, "/infra", Some(&bob), None).await;
    assert_eq!(reply.body, json!([]));
}

#[tokio::test]
async fn foreign_update_cannot_replace_a_secret() {
    let (app, _) = app();
    let alice = signed_in(&app, "alice").await;
    let bob = signed_in(&app, "bob").await;

    let alice_client = create_client(&app, &alice, "acme@example.com").await;
    let item_id = create_item(&app, &alice, &alice_client, Some(json!("p@ss"))).await;
    let bob_client = create_client(&app, &bob, "bob-co@example.com").await;

    for client_id in [&alice_client, &bob_client] {
        let reply = call(
            &app,
            Method::PUT,
            &format!("/infra/{item_id}"),
            Some(&bob),
            Some(item_body(client_id, Some(json!("hijacked")))),
        )
        .await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND, "{}", reply.body);
    }

    let reply = call(
        &app,
        Method::PUT,
        &format!("/infra/{item_id}"),
        Some(&bob),
        Some(item_body(&bob_client, Some(Value::Null))),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = reveal(&app, &alice, &item_id).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["secret"], "p@ss");
    let item = call(&app, Method::GET, &format!("/infra/{item_id}"), Some(&alice), None).await;
    assert_eq!(item.body["descricao"], "primary postgres");
}

#[tokio::test]
async fn foreign_and_missing_ids_look_the_same() {
    let (app, _) = app();
    let alice = signed_in(&app, "alice").await;
    let bob = signed_in(&app, "bob").await;

    let client_id = create_client(&app, &alice, "acme@example.com").await;
    let item_id = create_item(&app, &alice, &client_id, Some(json!("p@ss"))).await;
    let missing = uuid::Uuid::new_v4();

    let pairs = [
        (Method::GET, format!("/clientes/{client_id}"), format!("/clientes/{missing}"), None),
        (
            Method::PUT,
            format!("/clientes/{client_id}"),
            format!("/clientes/{missing}"),
            Some(json!({ "nome": "Acme", "email": "acme@example.com", "endereco_obj": address() })),
        ),
        (Method::DELETE, format!("/clientes/{client_id}"), format!("/clientes/{missing}"), None),
        (Method::GET, format!("/infra/{item_id}"), format!("/infra/{missing}"), None),
        (
            Method::GET,
            format!("/infra/decrypt/{item_id}"),
            format!("/infra/decrypt/{missing}"),
            None,
        ),
        (Method::DELETE, format!("/infra/{item_id}"), format!("/infra/{missing}"), None),
    ];
    for (method, foreign, absent, body) in pairs {
        let foreign_reply = call(&app, method.clone(), &foreign, Some(&bob), body.clone()).await;
        let absent_reply = call(&app, method, &absent, Some(&bob), body).await;
        assert_eq!(foreign_reply.status, StatusCode::NOT_FOUND, "{foreign}");
        assert_eq!(foreign_reply.status, absent_reply.status, "{foreign}");
        assert_eq!(foreign_reply.body, absent_reply.body, "{foreign}");
    }

    // Everything Bob poked at is still there for Alice.
    assert_eq!(reveal(&app, &alice, &item_id).await.body["secret"], "p@ss");
}

#[tokio::test]
async fn duplicate_client_email_persists_nothing() {
    let (app, _) = app();
    let token = signed_in(&app, "alice").await;
    create_client(&app, &token, "acme@example.com").await;

    let reply = call(
        &app,
        Method::POST,
        "/clientes",
        Some(&token),
        Some(json!({ "nome": "Acme 2", "email": "acme@example.com", "endereco_obj": address() })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = call(&app, Method::GET, "/clientes", Some(&token), None).await;
    assert_eq!(reply.body.as_array().unwrap().len(), 1);

    // Another account may reuse the address.
    let bob = signed_in(&app, "bob").await;
    create_client(&app, &bob, "acme@example.com").await;
}

#[tokio::test]
async fn client_create_requires_address() {
    let (app, _) = app();
    let token = signed_in(&app, "alice").await;
    let reply = call(
        &app,
        Method::POST,
        "/clientes",
        Some(&token),
        Some(json!({ "nome": "Acme", "email": "acme@example.com" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn client_address_is_embedded_and_editable() {
    let (app, _) = app();
    let token = signed_in(&app, "alice").await;
    let client_id = create_client(&app, &token, "acme@example.com").await;

    let client = call(&app, Method::GET, &format!("/clientes/{client_id}"), Some(&token), None).await;
    assert_eq!(client.body["endereco_obj"]["cidade"], "Curitiba");
    let address_id = client.body["id_endereco"].as_str().unwrap().to_owned();

    let mut moved = address();
    moved["cidade"] = json!("Londrina");
    let reply = call(&app, Method::PUT, &format!("/enderecos/{address_id}"), Some(&token), Some(moved)).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);

    let client = call(&app, Method::GET, &format!("/clientes/{client_id}"), Some(&token), None).await;
    assert_eq!(client.body["endereco_obj"]["cidade"], "Londrina");
}

#[tokio::test]
async fn referenced_client_cannot_be_deleted() {
    let (app, _) = app();
    let token = signed_in(&app, "alice").await;
    let client_id = create_client(&app, &token, "acme@example.com").await;
    let item_id = create_item(&app, &token, &client_id, None).await;

    let reply = call(&app, Method::DELETE, &format!("/clientes/{client_id}"), Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = call(&app, Method::DELETE, &format!("/infra/{item_id}"), Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    let reply = call(&app, Method::DELETE, &format!("/clientes/{client_id}"), Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
}

// ── Developers and projects ──────────────────────────────────────────

#[tokio::test]
async fn project_links_client_and_developer() {
    let (app, _) = app();
    let token = signed_in(&app, "alice").await;
    let client_id = create_client(&app, &token, "acme@example.com").await;

    let reply = call(
        &app,
        Method::POST,
        "/desenvolvedores",
        Some(&token),
        Some(json!({
            "nome": "Dev",
            "email": "dev@example.com",
            "documento_fiscal": "123.456.789-00",
            "taxa_horaria": 120.5,
            "endereco_obj": address(),
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    assert_eq!(reply.body["taxa_horaria"], "120.5");
    let developer_id = reply.body["id_desenvolvedor"].as_str().unwrap().to_owned();

    let reply = call(
        &app,
        Method::POST,
        "/projetos",
        Some(&token),
        Some(json!({
            "id_cliente": client_id,
            "id_desenvolvedor": developer_id,
            "titulo": "Portal",
            "escopo": "Customer portal rebuild",
            "status_projeto": "active",
            "orcamento": "15000.00",
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    assert_eq!(reply.body["id_desenvolvedor"], developer_id.as_str());

    let reply = call(&app, Method::PUT, "/auth/me/developer", Some(&token), Some(json!({ "id_desenvolvedor": developer_id }))).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["id_desenvolvedor"], developer_id.as_str());
}

#[tokio::test]
async fn negative_budget_is_rejected() {
    let (app, _) = app();
    let token = signed_in(&app, "alice").await;
    let client_id = create_client(&app, &token, "acme@example.com").await;
    let reply = call(
        &app,
        Method::POST,
        "/projetos",
        Some(&token),
        Some(json!({
            "id_cliente": client_id,
            "titulo": "Portal",
            "escopo": "x",
            "status_projeto": "active",
            "orcamento": -1,
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

// ── Secrets ──────────────────────────────────────────────────────────

#[tokio::test]
async fn secret_lifecycle() {
    let (app, _) = app();
    let token = signed_in(&app, "alice").await;
    let client_id = create_client(&app, &token, "acme@example.com").await;
    let item_id = create_item(&app, &token, &client_id, Some(json!("p@ss"))).await;
    let item_uri = format!("/infra/{item_id}");

    let list = call(&app, Method::GET, "/infra", Some(&token), None).await;
    assert_eq!(list.body[0]["referencia_senha"], SECRET_MASK);
    assert_eq!(list.body[0]["has_secret"], true);
    assert!(!list.body.to_string().contains("p@ss"));

    let one = call(&app, Method::GET, &item_uri, Some(&token), None).await;
    assert_eq!(one.body["referencia_senha"], SECRET_MASK);

    let reply = reveal(&app, &token, &item_id).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["secret"], "p@ss");
    assert_eq!(reply.body["id_item"], item_id.as_str());

    // Omitting the secret keeps it.
    let mut body = item_body(&client_id, None);
    body["descricao"] = json!("primary postgres (renamed)");
    let reply = call(&app, Method::PUT, &item_uri, Some(&token), Some(body)).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["referencia_senha"], SECRET_MASK);
    assert_eq!(reveal(&app, &token, &item_id).await.body["secret"], "p@ss");

    let reply = call(&app, Method::PUT, &item_uri, Some(&token), Some(item_body(&client_id, Some(json!("p@ss2"))))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(!reply.body.to_string().contains("p@ss2"));
    assert_eq!(reveal(&app, &token, &item_id).await.body["secret"], "p@ss2");

    // Null clears it.
    let reply = call(&app, Method::PUT, &item_uri, Some(&token), Some(item_body(&client_id, Some(Value::Null)))).await;
    assert_eq!(reply.body["has_secret"], false);
    assert_eq!(reply.body["referencia_senha"], SECRET_MASK);
    assert_eq!(reveal(&app, &token, &item_id).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn item_without_secret_has_nothing_to_reveal() {
    let (app, _) = app();
    let token = signed_in(&app, "alice").await;
    let client_id = create_client(&app, &token, "acme@example.com").await;
    let item_id = create_item(&app, &token, &client_id, Some(json!(""))).await;

    let reply = reveal(&app, &token, &item_id).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["message"], "item has no stored secret");
}

#[tokio::test]
async fn rotated_key_fails_closed() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let (original, _) = SecretCipher::generate();
    let (rotated, _) = SecretCipher::generate();
    let (app, _) = app_with(Arc::clone(&store), original);
    let (rotated_app, _) = app_with(store, rotated);

    let token = signed_in(&app, "alice").await;
    let client_id = create_client(&app, &token, "acme@example.com").await;
    let item_id = create_item(&app, &token, &client_id, Some(json!("p@ss"))).await;

    let reply = reveal(&rotated_app, &token, &item_id).await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body["error"], "decryption_failed");
    assert!(!reply.body.to_string().contains("p@ss"));

    // Listing still works; only the reveal needs the key.
    let reply = call(&rotated_app, Method::GET, "/infra", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body[0]["referencia_senha"], SECRET_MASK);
}

#[tokio::test]
async fn item_with_unknown_project_is_rejected() {
    let (app, _) = app();
    let token = signed_in(&app, "alice").await;
    let client_id = create_client(&app, &token, "acme@example.com").await;
    let mut body = item_body(&client_id, Some(json!("p@ss")));
    body["id_servico"] = json!(uuid::Uuid::new_v4());

    let reply = call(&app, Method::POST, "/infra", Some(&token), Some(body)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let reply = call(&app, Method::GET, "/infra", Some(&token), None).await;
    assert_eq!(reply.body, json!([]));
}
