//! Database access for the Supabase-managed `PostgreSQL`.
//!
//! # Tables (schema `public`)
//!
//! - `user_profiles` - One row per Supabase auth user that signed in
//! - `organizations` / `organization_members` - Org ownership of stores
//! - `stores` - Linked platform IDs, platform credentials, billing fields
//! - `store_assignments` - Per-store role (`STORE_ADMIN` / `STORE_VIEWER`)
//! - `daily_analytics_cache` - Per-day platform metrics with `updated_at`
//! - `dashboard.session` - tower-sessions storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/dashboard/migrations/` and run via:
//! ```bash
//! cargo run -p winqer-cli -- migrate
//! ```

pub mod access;
pub mod analytics_cache;
pub mod assignments;
pub mod profiles;
pub mod stores;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use access::AccessRepository;
pub use analytics_cache::{AnalyticsCacheRepository, DailyCache};
pub use assignments::AssignmentRepository;
pub use profiles::ProfileRepository;
pub use stores::StoreRepository;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

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

    /// Constraint violation (e.g., duplicate assignment).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The change would leave a store without a `STORE_ADMIN`.
    #[error("a store must keep at least one STORE_ADMIN")]
    LastAdmin,
}

impl RepositoryError {
    /// Map unique/foreign-key violations to `Conflict`, everything else to `Database`.
    pub(crate) fn from_write(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err)
                if db_err.is_unique_violation() || db_err.is_foreign_key_violation() =>
            {
                Self::Conflict(db_err.message().to_string())
            }
            _ => Self::Database(err),
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
