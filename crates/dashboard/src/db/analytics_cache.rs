//! Per-day platform metrics cache.
//!
//! One row per `(store_id, date, platform)`. A row is fresh for
//! [`CACHE_TTL`] after its `updated_at`. A range is served from cache only
//! when every day in it is present and fresh; otherwise the caller refetches
//! the whole range and writes each day back.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use winqer_core::{DailyRecord, DateRange, Platform, StoreId};

use super::RepositoryError;

/// How long a cached day stays fresh.
pub const CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Whether a row written at `updated_at` is still fresh at `now`.
#[must_use]
pub fn is_fresh(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    TimeDelta::from_std(CACHE_TTL).is_ok_and(|ttl| now.signed_duration_since(updated_at) < ttl)
}

#[derive(Debug, sqlx::FromRow)]
struct CacheRow {
    date: NaiveDate,
    metrics: Json<serde_json::Value>,
    updated_at: DateTime<Utc>,
}

/// Decode cached rows if they cover every day of `range` and all are fresh.
fn assemble_fresh<R: DailyRecord>(
    rows: Vec<CacheRow>,
    range: &DateRange,
    now: DateTime<Utc>,
) -> Result<Option<Vec<R>>, RepositoryError> {
    let expected = usize::try_from(range.num_days()).unwrap_or(usize::MAX);
    if rows.len() != expected || rows.iter().any(|row| !is_fresh(row.updated_at, now)) {
        return Ok(None);
    }

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let record: R = serde_json::from_value(row.metrics.0).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid cached metrics for {}: {e}", row.date))
        })?;
        records.push(record);
    }
    Ok(Some(records))
}

/// Read and write access to cached daily records.
#[allow(async_fn_in_trait)]
pub trait DailyCache {
    /// Cached records for the whole range, or `None` on any missing or stale day.
    async fn get_range<R: DailyRecord>(
        &self,
        store_id: StoreId,
        platform: Platform,
        range: &DateRange,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<R>>, RepositoryError>;

    /// Write each day's record, replacing existing rows.
    async fn upsert_days<R: DailyRecord>(
        &self,
        store_id: StoreId,
        platform: Platform,
        records: &[R],
    ) -> Result<(), RepositoryError>;
}

/// Repository for `daily_analytics_cache`.
pub struct AnalyticsCacheRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsCacheRepository<'a> {
    /// Create a new cache repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Drop every cached day of a platform for a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn invalidate(
        &self,
        store_id: StoreId,
        platform: Platform,
    ) -> Result<u64, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM daily_analytics_cache WHERE store_id = $1 AND platform = $2")
                .bind(store_id)
                .bind(platform)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    /// Delete rows last written before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM daily_analytics_cache WHERE updated_at < $1")
            .bind(cutoff)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

impl DailyCache for AnalyticsCacheRepository<'_> {
    /// Cached records for the whole range, or `None` on any missing or stale day.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a cached row no longer
    /// deserializes.
    async fn get_range<R: DailyRecord>(
        &self,
        store_id: StoreId,
        platform: Platform,
        range: &DateRange,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<R>>, RepositoryError> {
        let rows = sqlx::query_as::<_, CacheRow>(
            r"
            SELECT date, metrics, updated_at
            FROM daily_analytics_cache
            WHERE store_id = $1 AND platform = $2 AND date BETWEEN $3 AND $4
            ORDER BY date
            ",
        )
        .bind(store_id)
        .bind(platform)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(self.pool)
        .await?;

        match assemble_fresh(rows, range, now) {
            Err(RepositoryError::DataCorruption(reason)) => {
                // A schema change in the metrics struct; treat as a miss.
                tracing::warn!(%store_id, %platform, %reason, "Discarding undecodable cache rows");
                Ok(None)
            }
            other => other,
        }
    }

    /// Write each day's record, replacing existing rows.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a write fails; no rows are
    /// written in that case.
    async fn upsert_days<R: DailyRecord>(
        &self,
        store_id: StoreId,
        platform: Platform,
        records: &[R],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                r"
                INSERT INTO daily_analytics_cache (store_id, date, platform, metrics, updated_at)
                VALUES ($1, $2, $3, $4, NOW())
                ON CONFLICT (store_id, date, platform) DO UPDATE SET
                    metrics = EXCLUDED.metrics,
                    updated_at = EXCLUDED.updated_at
                ",
            )
            .bind(store_id)
            .bind(record.date())
            .bind(platform)
            .bind(Json(record))
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from_write)?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use winqer_core::metrics::GbpDailyMetrics;

    use super::*;

    fn now() -> DateTime<Utc> {
        "2026-05-01T12:00:00Z".parse().unwrap()
    }

    fn row(day: &str, age_minutes: i64) -> CacheRow {
        let date: NaiveDate = day.parse().unwrap();
        CacheRow {
            date,
            metrics: Json(serde_json::to_value(GbpDailyMetrics::empty(date)).unwrap()),
            updated_at: now() - TimeDelta::minutes(age_minutes),
        }
    }

    #[test]
    fn test_freshness_window() {
        assert!(is_fresh(now() - TimeDelta::minutes(29), now()));
        assert!(!is_fresh(now() - TimeDelta::minutes(30), now()));
        assert!(!is_fresh(now() - TimeDelta::hours(5), now()));
    }

    #[test]
    fn test_full_fresh_range_is_a_hit() {
        let range = DateRange::parse("2026-04-29", "2026-04-30").unwrap();
        let rows = vec![row("2026-04-29", 5), row("2026-04-30", 10)];
        let hit = assemble_fresh::<GbpDailyMetrics>(rows, &range, now()).unwrap();
        assert_eq!(hit.map(|r| r.len()), Some(2));
    }

    #[test]
    fn test_missing_or_stale_day_is_a_miss() {
        let range = DateRange::parse("2026-04-29", "2026-04-30").unwrap();

        let missing = vec![row("2026-04-30", 1)];
        assert!(assemble_fresh::<GbpDailyMetrics>(missing, &range, now()).unwrap().is_none());

        let stale = vec![row("2026-04-29", 45), row("2026-04-30", 1)];
        assert!(assemble_fresh::<GbpDailyMetrics>(stale, &range, now()).unwrap().is_none());
    }

    #[test]
    fn test_undecodable_row_is_corruption() {
        let range = DateRange::parse("2026-04-30", "2026-04-30").unwrap();
        let mut bad = row("2026-04-30", 1);
        bad.metrics = Json(serde_json::json!({ "unexpected": true }));
        let err = assemble_fresh::<GbpDailyMetrics>(vec![bad], &range, now()).unwrap_err();
        assert!(matches!(err, RepositoryError::DataCorruption(_)));
    }
}
