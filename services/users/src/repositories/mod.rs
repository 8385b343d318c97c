//! Credential storage
//!
//! [`UserStore`] is the single source of truth for user records and for the
//! fingerprint of each user's current refresh token.

use async_trait::async_trait;
use common::error::DatabaseResult;
use uuid::Uuid;

use crate::models::{NewUser, User};

pub mod memory;
pub mod user;

pub use memory::MemoryUserStore;
pub use user::UserRepository;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. Returns `None`, without writing anything, when the
    /// username is already taken.
    async fn create(&self, new_user: &NewUser) -> DatabaseResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>>;

    /// All users, oldest first
    async fn list(&self) -> DatabaseResult<Vec<User>>;

    /// Unconditionally replace (or clear) the stored refresh fingerprint.
    /// Returns whether the user exists.
    async fn set_refresh_token_hash(&self, id: Uuid, hash: Option<&str>) -> DatabaseResult<bool>;

    /// Replace the stored refresh fingerprint only if it currently equals
    /// `expected`. The comparison and the write happen atomically, so of two
    /// callers presenting the same fingerprint at most one gets `true`.
    async fn rotate_refresh_token_hash(
        &self,
        id: Uuid,
        expected: &str,
        new_hash: &str,
    ) -> DatabaseResult<bool>;

    async fn health_check(&self) -> DatabaseResult<bool>;
}
