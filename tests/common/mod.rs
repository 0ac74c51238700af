#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use yamdb::Config;
use yamdb::api::AppState;
use yamdb::db::UserChanges;

/// In-memory app with a seeded "admin" superuser and mail in log-only mode.
pub async fn spawn_app() -> (Router, Arc<AppState>) {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.scheduler.enabled = false;

    let state = yamdb::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    let app = yamdb::api::router(state.clone()).await;

    (app, state)
}

/// Drives one request through the router and decodes the JSON body (Null when
/// the body is empty or not JSON).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
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

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Full signup -> confirmation code -> token exchange, reading the delivered
/// code back out of the store the way the mailed recipient would.
pub async fn obtain_token(app: &Router, state: &AppState, username: &str, email: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/auth/signup/",
        None,
        Some(json!({"username": username, "email": email})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "signup failed: {body}");

    let code = state
        .store()
        .pending_confirmation_code(username)
        .await
        .unwrap()
        .expect("confirmation code should be stored after signup");

    let (status, body) = send(
        app,
        "POST",
        "/api/v1/auth/token/",
        None,
        Some(json!({"username": username, "confirmation_code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "token exchange failed: {body}");

    body["data"]["token"].as_str().unwrap().to_string()
}

/// Token for the migration-seeded superuser.
pub async fn admin_token(app: &Router, state: &AppState) -> String {
    obtain_token(app, state, "admin", "admin@localhost").await
}

/// Directly bump a stored role, for tests that need a moderator.
pub async fn set_role(state: &AppState, username: &str, role: &str) {
    let changes = UserChanges {
        role: Some(role.parse().unwrap()),
        ..Default::default()
    };
    state.store().update_user(username, &changes).await.unwrap();
}
