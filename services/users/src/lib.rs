//! User service: registration, login, and rotating refresh-token sessions
//!
//! The pieces, leaves first:
//! - [`repositories`]: credential store ([`repositories::UserStore`])
//! - [`password`]: Argon2id hashing
//! - [`jwt`]: access/refresh token issuing and verification
//! - [`session`]: register, login, refresh, logout
//! - [`middleware`]: bearer token authentication for protected routes

use anyhow::Result;
use std::sync::Arc;

pub mod config;
pub mod database;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod rate_limiter;
pub mod repositories;
pub mod routes;
pub mod session;
pub mod validation;

use crate::{
    config::AppConfig, jwt::TokenIssuer, middleware::Authenticator, password::PasswordHasher,
    rate_limiter::RateLimiter, repositories::UserStore, session::SessionManager,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub authenticator: Authenticator,
}

impl AppState {
    /// Wire the components together around an already opened store
    pub fn new(store: Arc<dyn UserStore>, config: &AppConfig) -> Result<Self> {
        let tokens = TokenIssuer::new(&config.tokens)?;
        let hasher = PasswordHasher::new(&config.hasher)?;
        let limiter = RateLimiter::new(config.rate_limiter.clone());

        Ok(Self {
            sessions: SessionManager::new(store, hasher, tokens.clone(), limiter),
            authenticator: Authenticator::new(tokens),
        })
    }
}
