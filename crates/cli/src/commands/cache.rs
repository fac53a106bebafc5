//! Analytics cache maintenance.

use chrono::{Duration, Utc};

use winqer_dashboard::db::AnalyticsCacheRepository;

use super::{CommandError, connect};

/// Delete cache rows not refreshed in the last `older_than_days` days.
///
/// # Errors
///
/// Returns an error if `older_than_days` is zero or the delete fails.
pub async fn purge(older_than_days: u32) -> Result<(), CommandError> {
    if older_than_days == 0 {
        return Err(CommandError::Invalid(
            "--older-than-days must be at least 1".to_string(),
        ));
    }
    let cutoff = Utc::now() - Duration::days(i64::from(older_than_days));
    let pool = connect().await?;

    let removed = AnalyticsCacheRepository::new(&pool)
        .purge_older_than(cutoff)
        .await?;

    tracing::info!(removed, %cutoff, "Analytics cache purged");
    Ok(())
}
