//! Database migration command.
//!
//! Migrations are embedded from `crates/dashboard/migrations/`.

use winqer_dashboard::db::MIGRATOR;

use super::{CommandError, connect};

/// Apply pending dashboard migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running dashboard migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}
