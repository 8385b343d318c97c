#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower::util::ServiceExt;
use users::{
    AppState,
    config::{AppConfig, ServerConfig},
    database::StoreBackend,
    jwt::TokenConfig,
    password::HasherConfig,
    rate_limiter::RateLimiterConfig,
    repositories::MemoryUserStore,
    routes,
};

pub fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            bind_addr: "127.0.0.1:0".parse().expect("address should parse"),
        },
        store: StoreBackend::Memory,
        tokens: TokenConfig {
            access_secret: "integration-access-secret".to_string(),
            refresh_secret: "integration-refresh-secret".to_string(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        },
        hasher: HasherConfig {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        },
        rate_limiter: RateLimiterConfig::default(),
    }
}

pub fn build_app() -> Router {
    build_app_with(test_config())
}

pub fn build_app_with(config: AppConfig) -> Router {
    let state = AppState::new(Arc::new(MemoryUserStore::new()), &config)
        .expect("state should build");
    routes::create_router(state)
}

pub async fn request_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send(app, method, uri, token, body, None).await
}

/// Same as [`request_json`], arriving from `client` as the server would see it
pub async fn request_json_from(
    app: &Router,
    client: SocketAddr,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send(app, method, uri, None, body, Some(client)).await
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
    client: Option<SocketAddr>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder = builder.header("Content-Type", "application/json");

    let req_body = body.map(|b| b.to_string()).unwrap_or_default();
    let mut req = builder
        .body(Body::from(req_body))
        .expect("request should build");
    if let Some(client) = client {
        req.extensions_mut().insert(ConnectInfo(client));
    }

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json)
}

pub async fn register(app: &Router, username: &str, password: &str, role: Option<&str>) -> Value {
    let mut body = json!({ "username": username, "password": password });
    if let Some(role) = role {
        body["role"] = json!(role);
    }
    let (status, json) = request_json(app, "POST", "/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {json}");
    json
}

pub async fn login(app: &Router, username: &str, password: &str) -> Value {
    let (status, json) = request_json(
        app,
        "POST",
        "/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {json}");
    json
}
