//! Database operations for the sync `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `sync_records` - One row per synced original/copy pair, including the
//!   cached canonical snapshot (JSONB) and the debounce timestamp
//! - `shop_sessions` - Offline access tokens per shop
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! sqlx migrate run --source crates/server/migrations
//! ```

pub mod sessions;
pub mod sync_records;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use sessions::{SessionRepository, ShopSession};
pub use sync_records::{SyncRecord, SyncRecordRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// A product id is tracked by more than one sync record. Requires
    /// manual data repair.
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
