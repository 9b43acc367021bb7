//! Shared fixtures for router tests.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use crate::auth::NewAccount;
use crate::config::Config;
use crate::db::{connect_in_memory, Role};
use crate::AppState;

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.jwt_secret = "router-test-secret".to_string();
    config.rate_limit.enabled = false;
    config
}

pub async fn state_with(config: Config) -> Arc<AppState> {
    let db = connect_in_memory().await.unwrap();
    Arc::new(AppState::new(config, db))
}

pub async fn test_state() -> Arc<AppState> {
    state_with(test_config()).await
}

/// Create an active account `<name>@example.com` with password `password-123`
/// and return a session token for it
pub async fn token_for(state: &AppState, name: &str, role: Role) -> String {
    let user = state
        .auth
        .create_account(NewAccount {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            password: "password-123".to_string(),
            role,
            active: true,
        })
        .await
        .unwrap();
    state.tokens.issue(&user, false, chrono::Utc::now()).unwrap()
}

/// Drive one request through the router and decode the JSON body
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Serve the full router on an ephemeral local port; returns the base URL
pub async fn serve(state: Arc<AppState>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = crate::api::create_router(state);
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .await
        .unwrap();
    });
    format!("http://{}", addr)
}
