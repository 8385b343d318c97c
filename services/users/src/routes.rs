//! User service routes

use axum::{
    Extension, Json, Router,
    extract::{ConnectInfo, Path, State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::{
    AppState,
    error::AuthError,
    middleware::{AuthUser, auth_middleware, require_admin},
    models::{LoginRequest, RefreshRequest, RegisterRequest},
};

/// Create the router for the user service
pub fn create_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user))
        .route_layer(middleware::from_fn(require_admin));

    let protected_routes = Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AuthError::Validation(rejection.body_text()))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = state.sessions.health_check().await.unwrap_or(false);
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "ok" } else { "degraded" },
            "service": "user-service"
        })),
    )
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let request = json_body(payload)?;
    let user = state.sessions.register(&request).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Requires the router to be served with connect info for per-client
/// throttling; without it all clients share one counter per username.
pub async fn login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let request = json_body(payload)?;
    let client = connect_info.map(|ConnectInfo(addr)| addr.ip());
    let response = state.sessions.login(&request, client).await?;

    Ok((StatusCode::OK, Json(response)))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let request = json_body(payload)?;
    let token = request
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::Validation("refreshToken is required".to_string()))?;

    let tokens = state.sessions.refresh(&token).await?;

    Ok((StatusCode::OK, Json(tokens)))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AuthError> {
    state.sessions.logout(user.id).await?;

    Ok((StatusCode::OK, Json(json!({ "ok": true }))))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AuthError> {
    let profile = state.sessions.profile(user.id).await?;

    Ok(Json(profile))
}

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, AuthError> {
    let users = state.sessions.list_users().await?;

    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AuthError> {
    let user = state.sessions.profile(id).await?;

    Ok(Json(user))
}
