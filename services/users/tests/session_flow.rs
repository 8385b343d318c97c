//! End-to-end flows through the HTTP router against the in-memory store

mod common;

use axum::http::StatusCode;
use common::{build_app, build_app_with, login, register, request_json, request_json_from};
use serde_json::json;
use std::net::SocketAddr;

#[tokio::test]
async fn register_login_profile_refresh_flow() {
    let app = build_app();

    let (status, user) = request_json(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({ "username": "alice", "password": "Secret123!" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["username"], "alice");
    assert_eq!(user["role"], "user");
    assert!(user["id"].is_string());
    assert_eq!(user.as_object().unwrap().len(), 3);

    let session = login(&app, "alice", "Secret123!").await;
    let access = session["accessToken"].as_str().unwrap().to_string();
    let refresh = session["refreshToken"].as_str().unwrap().to_string();
    assert!(!access.is_empty());
    assert!(!refresh.is_empty());
    assert_eq!(session["user"], user);

    let (status, me) = request_json(&app, "GET", "/me", Some(access.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user["id"]);
    assert_eq!(me["username"], "alice");
    assert_eq!(me["role"], "user");
    assert!(me["createdAt"].is_string());
    assert!(me.get("passwordHash").is_none());
    assert!(me.get("refreshTokenHash").is_none());

    let (status, rotated) = request_json(
        &app,
        "POST",
        "/refresh-token",
        None,
        Some(json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(rotated["accessToken"].is_string());
    assert_ne!(rotated["refreshToken"], json!(refresh));

    let (status, body) = request_json(
        &app,
        "POST",
        "/refresh-token",
        None,
        Some(json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid token");

    let (status, _) = request_json(
        &app,
        "POST",
        "/refresh-token",
        None,
        Some(json!({ "refreshToken": rotated["refreshToken"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn register_rejects_missing_fields_and_duplicates() {
    let app = build_app();

    let (status, body) = request_json(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({ "username": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "password is required");

    let (status, _) = request_json(&app, "POST", "/register", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    register(&app, "alice", "Secret123!", None).await;
    let (status, _) = request_json(
        &app,
        "POST",
        "/register",
        None,
        Some(json!({ "username": "alice", "password": "Other456!" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn register_normalizes_roles() {
    let app = build_app();

    let admin = register(&app, "root", "Secret123!", Some("admin")).await;
    assert_eq!(admin["role"], "admin");

    let fallback = register(&app, "eve", "Secret123!", Some("superadmin")).await;
    assert_eq!(fallback["role"], "user");
}

#[tokio::test]
async fn login_failures_look_identical() {
    let app = build_app();
    register(&app, "alice", "Secret123!", None).await;

    let wrong_password = request_json(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "username": "alice", "password": "nope" })),
    )
    .await;
    let unknown_user = request_json(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "username": "nobody", "password": "Secret123!" })),
    )
    .await;

    assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_user);
    assert_eq!(wrong_password.1["error"], "invalid credentials");
}

#[tokio::test]
async fn refresh_requires_a_token() {
    let app = build_app();

    let (status, _) = request_json(&app, "POST", "/refresh-token", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request_json(
        &app,
        "POST",
        "/refresh-token",
        None,
        Some(json!({ "refreshToken": "forged" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_is_idempotent_and_revokes_refresh() {
    let app = build_app();
    register(&app, "alice", "Secret123!", None).await;
    let session = login(&app, "alice", "Secret123!").await;
    let access = session["accessToken"].as_str().unwrap();

    for _ in 0..2 {
        let (status, body) = request_json(&app, "POST", "/logout", Some(access), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
    }

    let (status, _) = request_json(
        &app,
        "POST",
        "/refresh-token",
        None,
        Some(json!({ "refreshToken": session["refreshToken"] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let app = build_app();
    register(&app, "alice", "Secret123!", None).await;
    let session = login(&app, "alice", "Secret123!").await;

    let (status, body) = request_json(&app, "GET", "/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let (status, _) = request_json(&app, "POST", "/logout", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // a refresh token is not an access token
    let refresh = session["refreshToken"].as_str().unwrap();
    let (status, _) = request_json(&app, "GET", "/me", Some(refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn user_directory_is_admin_only() {
    let app = build_app();
    let alice = register(&app, "alice", "Secret123!", None).await;
    register(&app, "root", "Secret123!", Some("admin")).await;

    let user_access = login(&app, "alice", "Secret123!").await["accessToken"]
        .as_str()
        .unwrap()
        .to_string();
    let admin_access = login(&app, "root", "Secret123!").await["accessToken"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, _) = request_json(&app, "GET", "/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = request_json(&app, "GET", "/users", Some(user_access.as_str()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, users) = request_json(&app, "GET", "/users", Some(admin_access.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = users
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"alice") && names.contains(&"root"));

    let uri = format!("/users/{}", alice["id"].as_str().unwrap());
    let (status, profile) = request_json(&app, "GET", &uri, Some(admin_access.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "alice");

    let uri = format!("/users/{}", uuid::Uuid::new_v4());
    let (status, _) = request_json(&app, "GET", &uri, Some(admin_access.as_str()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_ok() {
    let app = build_app();

    let (status, body) = request_json(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn lockout_is_scoped_to_the_failing_client() {
    let mut config = common::test_config();
    config.rate_limiter.max_failures = 3;
    let app = build_app_with(config);
    register(&app, "alice", "Secret123!", None).await;

    let attacker: SocketAddr = "203.0.113.7:40000".parse().unwrap();
    let owner: SocketAddr = "198.51.100.20:52000".parse().unwrap();
    let wrong = json!({ "username": "alice", "password": "wrong" });
    let right = json!({ "username": "alice", "password": "Secret123!" });

    for _ in 0..3 {
        let (status, _) =
            request_json_from(&app, attacker, "POST", "/login", Some(wrong.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) =
        request_json_from(&app, attacker, "POST", "/login", Some(right.clone())).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].is_string());

    // a different source port is the same client
    let same_host: SocketAddr = "203.0.113.7:40001".parse().unwrap();
    let (status, _) =
        request_json_from(&app, same_host, "POST", "/login", Some(right.clone())).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, body) = request_json_from(&app, owner, "POST", "/login", Some(right)).await;
    assert_eq!(status, StatusCode::OK, "owner login failed: {body}");
    assert_eq!(body["user"]["username"], "alice");
}
