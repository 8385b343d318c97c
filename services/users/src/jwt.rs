//! Token issuing and verification
//!
//! Access and refresh tokens are HS256 JWTs signed with two different
//! secrets, so a token of one kind never verifies as the other even if the
//! `token_type` claim were forged. Tokens are self-contained; the only
//! server-side state is the refresh token fingerprint kept by the store.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use uuid::Uuid;

use crate::{config::duration_var, models::Role};

/// Token signing configuration
#[derive(Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl TokenConfig {
    /// Create a new TokenConfig from environment variables
    ///
    /// # Environment Variables
    /// - `ACCESS_TOKEN_SECRET`: signing key for access tokens (required)
    /// - `REFRESH_TOKEN_SECRET`: signing key for refresh tokens (required)
    /// - `ACCESS_TOKEN_TTL`: access token lifetime (default: `15m`)
    /// - `REFRESH_TOKEN_TTL`: refresh token lifetime (default: `7d`)
    pub fn from_env() -> Result<Self> {
        let access_secret = std::env::var("ACCESS_TOKEN_SECRET")
            .context("ACCESS_TOKEN_SECRET environment variable not set")?;
        let refresh_secret = std::env::var("REFRESH_TOKEN_SECRET")
            .context("REFRESH_TOKEN_SECRET environment variable not set")?;

        let config = Self {
            access_secret,
            refresh_secret,
            access_ttl: duration_var("ACCESS_TOKEN_TTL", "15m")?,
            refresh_ttl: duration_var("REFRESH_TOKEN_TTL", "7d")?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            bail!("token signing secrets must not be empty");
        }
        if self.access_secret == self.refresh_secret {
            bail!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        }
        Ok(())
    }
}

/// Token type marker carried in every token
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Only present on access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Only present on access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub token_type: TokenType,
    /// Unique per token, so two tokens minted in the same second differ
    pub jti: Uuid,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature, expired, malformed, or the wrong kind of token
    #[error("invalid token")]
    Invalid,

    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// Issue time plus lifetime does not fit in a timestamp
    #[error("token lifetime out of range")]
    LifetimeOutOfRange,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signs and verifies access and refresh tokens
#[derive(Clone)]
pub struct TokenIssuer {
    access: Arc<KeyPair>,
    refresh: Arc<KeyPair>,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &TokenConfig) -> Result<Self> {
        config.validate()?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            access: Arc::new(KeyPair::from_secret(&config.access_secret)),
            refresh: Arc::new(KeyPair::from_secret(&config.refresh_secret)),
            validation,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        })
    }

    /// Access token lifetime in seconds
    pub fn access_token_expiry(&self) -> u64 {
        self.access_ttl.as_secs()
    }

    pub fn issue_access(
        &self,
        user_id: Uuid,
        username: &str,
        role: Role,
    ) -> Result<String, TokenError> {
        self.issue_access_at(user_id, username, role, Utc::now())
    }

    pub fn issue_refresh(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue_refresh_at(user_id, Utc::now())
    }

    pub(crate) fn issue_access_at(
        &self,
        user_id: Uuid,
        username: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let iat = unix_seconds(now);
        let claims = Claims {
            sub: user_id,
            username: Some(username.to_string()),
            role: Some(role),
            token_type: TokenType::Access,
            jti: Uuid::new_v4(),
            iat,
            exp: expiry(iat, self.access_ttl)?,
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.access.encoding)?)
    }

    pub(crate) fn issue_refresh_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let iat = unix_seconds(now);
        let claims = Claims {
            sub: user_id,
            username: None,
            role: None,
            token_type: TokenType::Refresh,
            jti: Uuid::new_v4(),
            iat,
            exp: expiry(iat, self.refresh_ttl)?,
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.refresh.encoding)?)
    }

    /// Verify signature, expiry and kind, returning the claims.
    ///
    /// Every failure collapses into [`TokenError::Invalid`].
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let keys = match expected {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
        };

        let claims = decode::<Claims>(token, &keys.decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token rejected: {}", e);
                TokenError::Invalid
            })?
            .claims;

        if claims.token_type != expected {
            tracing::debug!(
                "Token rejected: expected {:?}, got {:?}",
                expected,
                claims.token_type
            );
            return Err(TokenError::Invalid);
        }
        if expected == TokenType::Access && (claims.username.is_none() || claims.role.is_none()) {
            return Err(TokenError::Invalid);
        }

        Ok(claims)
    }
}

/// SHA-256 fingerprint of a refresh token, the only form ever persisted
pub fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn unix_seconds(at: DateTime<Utc>) -> u64 {
    at.timestamp().max(0) as u64
}

fn expiry(iat: u64, ttl: Duration) -> Result<u64, TokenError> {
    iat.checked_add(ttl.as_secs())
        .filter(|exp| i64::try_from(*exp).is_ok())
        .ok_or(TokenError::LifetimeOutOfRange)
}

#[cfg(test)]
pub(crate) fn test_config() -> TokenConfig {
    TokenConfig {
        access_secret: "test-access-secret-that-is-long-enough".to_string(),
        refresh_secret: "test-refresh-secret-that-is-long-enough".to_string(),
        access_ttl: Duration::from_secs(15 * 60),
        refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
    }
}
