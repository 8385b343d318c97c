//! In-process user store
//!
//! Same contract as the PostgreSQL repository, used for local runs with
//! `USER_STORE=memory` and throughout the tests.

use async_trait::async_trait;
use chrono::Utc;
use common::error::DatabaseResult;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::UserStore;
use crate::models::{NewUser, User};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    by_username: HashMap<String, Uuid>,
}

#[derive(Clone, Default)]
pub struct MemoryUserStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new_user: &NewUser) -> DatabaseResult<Option<User>> {
        let mut inner = self.inner.lock().await;
        if inner.by_username.contains_key(&new_user.username) {
            return Ok(None);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username.clone(),
            password_hash: new_user.password_hash.clone(),
            role: new_user.role,
            refresh_token_hash: None,
            created_at: now,
            updated_at: now,
        };

        inner.by_username.insert(user.username.clone(), user.id);
        inner.users.insert(user.id, user.clone());
        Ok(Some(user))
    }

    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .by_username
            .get(username)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn list(&self) -> DatabaseResult<Vec<User>> {
        let mut users: Vec<User> = self.inner.lock().await.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn set_refresh_token_hash(&self, id: Uuid, hash: Option<&str>) -> DatabaseResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.users.get_mut(&id) {
            Some(user) => {
                user.refresh_token_hash = hash.map(str::to_string);
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn rotate_refresh_token_hash(
        &self,
        id: Uuid,
        expected: &str,
        new_hash: &str,
    ) -> DatabaseResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.users.get_mut(&id) {
            Some(user) if user.refresh_token_hash.as_deref() == Some(expected) => {
                user.refresh_token_hash = Some(new_hash.to_string());
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        Ok(true)
    }
}
