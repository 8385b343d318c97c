//! Store selection and schema migrations

use anyhow::{Result, bail};
use common::{
    database::{DatabaseConfig, health_check, init_pool},
    error::DatabaseError,
};
use sqlx::migrate::Migrator;
use std::sync::Arc;
use tracing::info;

use crate::repositories::{MemoryUserStore, UserRepository, UserStore};

/// Embedded schema migrations for the users table
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Where user records live
#[derive(Debug, Clone)]
pub enum StoreBackend {
    Postgres(DatabaseConfig),
    /// Process-local, lost on restart
    Memory,
}

impl StoreBackend {
    /// # Environment Variables
    /// - `USER_STORE`: `postgres` (default) or `memory`
    pub fn from_env() -> Result<Self> {
        let kind = std::env::var("USER_STORE").unwrap_or_else(|_| "postgres".to_string());
        match kind.as_str() {
            "postgres" => Ok(StoreBackend::Postgres(DatabaseConfig::from_env()?)),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("USER_STORE must be `postgres` or `memory`, got {:?}", other),
        }
    }

    /// Connect, migrate, and hand back the store
    pub async fn open(&self) -> Result<Arc<dyn UserStore>> {
        match self {
            StoreBackend::Postgres(config) => {
                let pool = init_pool(config).await?;

                if health_check(&pool).await? {
                    info!("Database connection successful");
                } else {
                    bail!("Failed to connect to database");
                }

                MIGRATOR
                    .run(&pool)
                    .await
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
                info!("Database migrations applied");

                Ok(Arc::new(UserRepository::new(pool)))
            }
            StoreBackend::Memory => {
                info!("Using in-memory user store; data will not survive a restart");
                Ok(Arc::new(MemoryUserStore::new()))
            }
        }
    }
}
