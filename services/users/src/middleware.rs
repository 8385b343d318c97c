//! Bearer token authentication and role guards

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    AppState,
    error::AuthError,
    jwt::{Claims, TokenIssuer, TokenType},
    models::Role,
};

/// Identity taken from a verified access token, attached to the request
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl TryFrom<Claims> for AuthUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        match (claims.username, claims.role) {
            (Some(username), Some(role)) => Ok(Self {
                id: claims.sub,
                username,
                role,
            }),
            _ => Err(AuthError::Unauthenticated),
        }
    }
}

/// Pull the token out of a `Bearer <token>` header value
pub fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}

/// Validates access tokens presented on incoming requests
#[derive(Clone)]
pub struct Authenticator {
    tokens: TokenIssuer,
}

impl Authenticator {
    pub fn new(tokens: TokenIssuer) -> Self {
        Self { tokens }
    }

    /// Authenticate a raw `Authorization` header value.
    ///
    /// Every failure, from a missing header to an expired token, is
    /// [`AuthError::Unauthenticated`].
    pub fn authenticate(&self, header: Option<&str>) -> Result<AuthUser, AuthError> {
        let token = header
            .and_then(parse_bearer)
            .ok_or(AuthError::Unauthenticated)?;

        let claims = self
            .tokens
            .verify(token, TokenType::Access)
            .map_err(|_| AuthError::Unauthenticated)?;

        AuthUser::try_from(claims)
    }
}

/// Reject requests without a valid access token, otherwise attach
/// [`AuthUser`] to the request extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let user = state.authenticator.authenticate(header).map_err(|e| {
        debug!("Rejected {} {}: {}", req.method(), req.uri().path(), e);
        e
    })?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Admin-only guard; must run after [`auth_middleware`]
pub async fn require_admin(req: Request<Body>, next: Next) -> Result<Response, AuthError> {
    match req.extensions().get::<AuthUser>() {
        Some(user) if user.role.is_admin() => Ok(next.run(req).await),
        Some(user) => {
            debug!("User {} denied admin route {}", user.id, req.uri().path());
            Err(AuthError::Forbidden)
        }
        None => Err(AuthError::Unauthenticated),
    }
}
