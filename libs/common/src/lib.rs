//! Shared building blocks for the storefront services
//!
//! Database connectivity and the storage error type live here so that every
//! service configures its pool the same way.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, health_check, init_pool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     health_check(&pool).await?;
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod error;
