//! Session lifecycle: register, login, refresh, logout
//!
//! Each user has at most one live session, represented by the fingerprint of
//! their current refresh token. Logging in replaces it, so a login on one
//! device silently ends the session on any other. Refreshing rotates it,
//! and logging out clears it.

use anyhow::anyhow;
use std::{net::IpAddr, sync::Arc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::AuthError,
    jwt::{self, TokenIssuer, TokenType},
    models::{
        LoginRequest, LoginResponse, NewUser, RegisterRequest, Role, TokenPair, User, UserProfile,
        UserSummary,
    },
    password::PasswordHasher,
    rate_limiter::RateLimiter,
    repositories::UserStore,
    validation,
};

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    tokens: TokenIssuer,
    limiter: RateLimiter,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: PasswordHasher,
        tokens: TokenIssuer,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            limiter,
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Create a user with no active session
    pub async fn register(&self, request: &RegisterRequest) -> Result<UserSummary, AuthError> {
        let (username, password) = validation::validate_credentials(
            request.username.as_deref(),
            request.password.as_deref(),
        )
        .map_err(AuthError::Validation)?;
        let role = Role::normalize(request.role.as_deref());

        // Cheap pre-check; the insert below is what actually guarantees uniqueness
        if self.store.find_by_username(username).await?.is_some() {
            info!("Registration rejected, username taken: {}", username);
            return Err(AuthError::Conflict("username already exists".to_string()));
        }

        let password_hash = self.hash_password(password).await?;
        let new_user = NewUser {
            username: username.to_string(),
            password_hash,
            role,
        };

        let user = self.store.create(&new_user).await?.ok_or_else(|| {
            info!("Registration lost a race for username: {}", username);
            AuthError::Conflict("username already exists".to_string())
        })?;

        info!("Registered user {} ({}) as {}", user.username, user.id, user.role);
        Ok(UserSummary::from(&user))
    }

    /// Check credentials and open a new session, replacing any previous one
    ///
    /// Attempts are throttled per `client` and username, so one client's
    /// failures never lock the account for anyone else.
    pub async fn login(
        &self,
        request: &LoginRequest,
        client: Option<IpAddr>,
    ) -> Result<LoginResponse, AuthError> {
        let (username, password) = validation::validate_credentials(
            request.username.as_deref(),
            request.password.as_deref(),
        )
        .map_err(AuthError::Validation)?;

        let key = throttle_key(client, username);
        if !self.limiter.try_acquire(&key).await {
            info!("Login throttled for {}", key);
            return Err(AuthError::TooManyAttempts);
        }

        let user = self.store.find_by_username(username).await?;
        let verified = self
            .verify_password(password, user.as_ref().map(|u| u.password_hash.clone()))
            .await?;

        let user = match user {
            Some(user) if verified => user,
            found => {
                warn!(
                    "Login failed for {}: {}",
                    username,
                    if found.is_some() { "wrong password" } else { "unknown user" }
                );
                return Err(AuthError::InvalidCredentials);
            }
        };
        self.limiter.reset(&key).await;

        let tokens = self.issue_pair(&user)?;
        let fingerprint = jwt::fingerprint(&tokens.refresh_token);
        self.store
            .set_refresh_token_hash(user.id, Some(fingerprint.as_str()))
            .await?;

        info!("User {} logged in", user.id);
        Ok(LoginResponse {
            tokens,
            user: UserSummary::from(&user),
        })
    }

    /// Exchange a refresh token for a new pair, invalidating the old token
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self
            .tokens
            .verify(refresh_token, TokenType::Refresh)
            .map_err(|_| {
                info!("Refresh rejected: token failed verification");
                AuthError::InvalidToken
            })?;

        let user = match self.store.find_by_id(claims.sub).await? {
            Some(user) => user,
            None => {
                warn!("Refresh rejected: user {} no longer exists", claims.sub);
                return Err(AuthError::InvalidToken);
            }
        };

        let presented = jwt::fingerprint(refresh_token);
        match user.refresh_token_hash.as_deref() {
            Some(stored) if stored == presented => {}
            Some(_) => {
                warn!("Refresh rejected for {}: token was rotated or replaced", user.id);
                return Err(AuthError::InvalidToken);
            }
            None => {
                warn!("Refresh rejected for {}: no active session", user.id);
                return Err(AuthError::InvalidToken);
            }
        }

        let tokens = self.issue_pair(&user)?;
        let next = jwt::fingerprint(&tokens.refresh_token);
        let rotated = self
            .store
            .rotate_refresh_token_hash(user.id, &presented, &next)
            .await?;
        if !rotated {
            warn!("Refresh rejected for {}: concurrent rotation won", user.id);
            return Err(AuthError::InvalidToken);
        }

        info!("Rotated refresh token for user {}", user.id);
        Ok(tokens)
    }

    /// End the user's session. Succeeds whether or not one was active.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AuthError> {
        if self.store.set_refresh_token_hash(user_id, None).await? {
            info!("User {} logged out", user_id);
        } else {
            info!("Logout for unknown user {}", user_id);
        }
        Ok(())
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile, AuthError> {
        self.store
            .find_by_id(user_id)
            .await?
            .map(|user| UserProfile::from(&user))
            .ok_or(AuthError::NotFound)
    }

    pub async fn list_users(&self) -> Result<Vec<UserProfile>, AuthError> {
        let users = self.store.list().await?;
        Ok(users.iter().map(UserProfile::from).collect())
    }

    pub async fn health_check(&self) -> Result<bool, AuthError> {
        Ok(self.store.health_check().await?)
    }

    fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.tokens.issue_access(user.id, &user.username, user.role)?,
            refresh_token: self.tokens.issue_refresh(user.id)?,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_token_expiry(),
        })
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();

        let digest = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| anyhow!("Password hashing task failed: {}", e))??;
        Ok(digest)
    }

    /// Verify against the stored digest, or against the dummy digest when
    /// there is no user, so both paths take the same time
    async fn verify_password(
        &self,
        password: &str,
        digest: Option<String>,
    ) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();

        let verified = tokio::task::spawn_blocking(move || match digest {
            Some(digest) => hasher.verify(&password, &digest),
            None => hasher.verify_dummy(&password),
        })
        .await
        .map_err(|e| anyhow!("Password verification task failed: {}", e))??;
        Ok(verified)
    }
}

fn throttle_key(client: Option<IpAddr>, username: &str) -> String {
    match client {
        Some(ip) => format!("{}/{}", ip, username),
        None => format!("unknown/{}", username),
    }
}
