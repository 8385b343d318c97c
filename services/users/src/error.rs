//! Error type returned by every user service operation

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::jwt::TokenError;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Uniqueness violation
    #[error("{0}")]
    Conflict(String),

    /// Unknown username or wrong password; deliberately the same error for both
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Token failed verification, was rotated away, or was revoked
    #[error("invalid token")]
    InvalidToken,

    /// No usable bearer credential on the request
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("user not found")]
    NotFound,

    #[error("too many failed attempts, try again later")]
    TooManyAttempts,

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("internal server error")]
    Database(#[from] DatabaseError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Internal(_) | AuthError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AuthError::InvalidToken,
            TokenError::Signing(e) => AuthError::Internal(e.into()),
            err @ TokenError::LifetimeOutOfRange => AuthError::Internal(err.into()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::Internal(e) => error!("Request failed: {:#}", e),
            AuthError::Database(e) => error!("Request failed: {}", e),
            _ => {}
        }

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (self.status(), body).into_response()
    }
}
