//! Per-store dashboard aggregation.
//!
//! For each platform:
//! 1. Skip with `not_connected` if the store has no linked ID or credential
//!    (or the integration itself is not configured)
//! 2. Serve the range from `daily_analytics_cache` when every day is fresh
//! 3. Otherwise fetch the whole range from the platform and upsert each day
//! 4. Summarize the daily series
//!
//! The three platforms load concurrently and fail independently.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{instrument, warn};

use winqer_core::metrics::{Ga4DailyMetrics, GbpDailyMetrics, MetaDailyMetrics};
use winqer_core::{DailyRecord, DateRange, Platform, StoreId};

use crate::db::{AnalyticsCacheRepository, DailyCache};
use crate::error::AppError;
use crate::meta::{ScoredAd, score_ads};
use crate::models::Store;
use crate::state::AppState;

/// Outcome of one platform's load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformStatus {
    Ok,
    NotConnected,
    Error,
}

/// Where the daily series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Cache,
    Live,
}

/// One platform's section of the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformReport<R: DailyRecord> {
    pub status: PlatformStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<DataSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<R::Summary>,
    pub daily: Vec<R>,
}

impl<R: DailyRecord> PlatformReport<R> {
    /// Report for a platform the store has not linked.
    #[must_use]
    pub const fn not_connected() -> Self {
        Self {
            status: PlatformStatus::NotConnected,
            source: None,
            error: None,
            summary: None,
            daily: Vec::new(),
        }
    }

    /// Report for a successful load.
    #[must_use]
    pub fn loaded(daily: Vec<R>, source: DataSource) -> Self {
        Self {
            status: PlatformStatus::Ok,
            source: Some(source),
            error: None,
            summary: Some(R::summarize(&daily)),
            daily,
        }
    }

    /// Report for a failed load. Only the client-safe message is kept.
    #[must_use]
    pub fn failed(error: &AppError) -> Self {
        Self {
            status: PlatformStatus::Error,
            source: None,
            error: Some(error.public_message()),
            summary: None,
            daily: Vec::new(),
        }
    }
}

/// The whole dashboard for one store and range.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardReport {
    pub store_id: StoreId,
    pub range: DateRange,
    pub meta: PlatformReport<MetaDailyMetrics>,
    pub ga4: PlatformReport<Ga4DailyMetrics>,
    pub gbp: PlatformReport<GbpDailyMetrics>,
}

/// Build the dashboard for `store` over `range`.
///
/// Never fails as a whole; per-platform failures are reported inline.
#[instrument(skip(state, store), fields(store_id = %store.id, range = ?range))]
pub async fn store_dashboard(state: &AppState, store: &Store, range: &DateRange) -> DashboardReport {
    let cache = AnalyticsCacheRepository::new(state.pool());
    let linked = |platform| is_connected(state, store, platform);

    let sources = PlatformSources {
        meta: linked(Platform::Meta).then_some(|| fetch_meta(state, store, range)),
        ga4: linked(Platform::Ga4).then_some(|| fetch_ga4(state, store, range)),
        gbp: linked(Platform::Gbp).then_some(|| fetch_gbp(state, store, range)),
    };

    assemble_dashboard(&cache, store.id, range, Utc::now(), sources).await
}

/// Live fetchers for each platform; `None` when the platform is not connected.
struct PlatformSources<M, G, B> {
    meta: Option<M>,
    ga4: Option<G>,
    gbp: Option<B>,
}

async fn assemble_dashboard<C, M, MFut, G, GFut, B, BFut>(
    cache: &C,
    store_id: StoreId,
    range: &DateRange,
    now: DateTime<Utc>,
    sources: PlatformSources<M, G, B>,
) -> DashboardReport
where
    C: DailyCache,
    M: FnOnce() -> MFut,
    MFut: Future<Output = Result<Vec<MetaDailyMetrics>, AppError>>,
    G: FnOnce() -> GFut,
    GFut: Future<Output = Result<Vec<Ga4DailyMetrics>, AppError>>,
    B: FnOnce() -> BFut,
    BFut: Future<Output = Result<Vec<GbpDailyMetrics>, AppError>>,
{
    let (meta, ga4, gbp) = tokio::join!(
        platform_report(cache, store_id, Platform::Meta, range, now, sources.meta),
        platform_report(cache, store_id, Platform::Ga4, range, now, sources.ga4),
        platform_report(cache, store_id, Platform::Gbp, range, now, sources.gbp),
    );

    DashboardReport {
        store_id,
        range: *range,
        meta,
        ga4,
        gbp,
    }
}

/// Per-ad insights for the store's Meta account, scored and sorted best first.
///
/// Ads are always fetched live.
///
/// # Errors
///
/// Returns `AppError::NotConfigured` if Meta is not configured,
/// `AppError::BadRequest` if the store has not connected Meta, or the
/// Graph API error.
#[instrument(skip(state, store), fields(store_id = %store.id, range = ?range))]
pub async fn store_ads(
    state: &AppState,
    store: &Store,
    range: &DateRange,
) -> Result<Vec<ScoredAd>, AppError> {
    let client = state.require_meta()?;
    let (Some(account), Some(token)) = (&store.meta_ad_account_id, &store.meta_access_token) else {
        return Err(AppError::BadRequest("Meta is not connected".to_string()));
    };
    let ads = client.ad_insights(token, account, range).await?;
    Ok(score_ads(ads))
}

fn is_connected(state: &AppState, store: &Store, platform: Platform) -> bool {
    let configured = match platform {
        Platform::Meta => state.meta().is_some(),
        Platform::Ga4 | Platform::Gbp => state.google().is_some(),
    };
    configured && store.linked_id(platform).is_some() && store.has_credentials(platform)
}

async fn platform_report<C, R, F, Fut>(
    cache: &C,
    store_id: StoreId,
    platform: Platform,
    range: &DateRange,
    now: DateTime<Utc>,
    fetch: Option<F>,
) -> PlatformReport<R>
where
    C: DailyCache,
    R: DailyRecord,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<R>, AppError>>,
{
    let Some(fetch) = fetch else {
        return PlatformReport::not_connected();
    };

    match load_cached_or_fetch(cache, store_id, platform, range, now, fetch).await {
        Ok((daily, source)) => PlatformReport::loaded(daily, source),
        Err(e) => {
            warn!(%store_id, %platform, error = %e, "Platform load failed");
            PlatformReport::failed(&e)
        }
    }
}

async fn load_cached_or_fetch<C, R, F, Fut>(
    cache: &C,
    store_id: StoreId,
    platform: Platform,
    range: &DateRange,
    now: DateTime<Utc>,
    fetch: F,
) -> Result<(Vec<R>, DataSource), AppError>
where
    C: DailyCache,
    R: DailyRecord,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<R>, AppError>>,
{
    match cache.get_range::<R>(store_id, platform, range, now).await {
        Ok(Some(daily)) => return Ok((daily, DataSource::Cache)),
        Ok(None) => {}
        Err(e) => warn!(%store_id, %platform, error = %e, "Cache read failed, fetching live"),
    }

    let daily = fetch().await?;

    if let Err(e) = cache.upsert_days(store_id, platform, &daily).await {
        warn!(%store_id, %platform, error = %e, "Cache write failed");
    }

    Ok((daily, DataSource::Live))
}

async fn fetch_meta(
    state: &AppState,
    store: &Store,
    range: &DateRange,
) -> Result<Vec<MetaDailyMetrics>, AppError> {
    let client = state.require_meta()?;
    let (Some(account), Some(token)) = (&store.meta_ad_account_id, &store.meta_access_token) else {
        return Err(AppError::BadRequest("Meta is not connected".to_string()));
    };
    Ok(client.account_daily_insights(token, account, range).await?)
}

async fn fetch_ga4(
    state: &AppState,
    store: &Store,
    range: &DateRange,
) -> Result<Vec<Ga4DailyMetrics>, AppError> {
    let client = state.require_google()?;
    let (Some(property), Some(refresh)) = (&store.ga4_property_id, &store.google_refresh_token)
    else {
        return Err(AppError::BadRequest("GA4 is not connected".to_string()));
    };
    let token = client.access_token(refresh).await?;
    Ok(client.ga4_daily_report(&token, property, range).await?)
}

async fn fetch_gbp(
    state: &AppState,
    store: &Store,
    range: &DateRange,
) -> Result<Vec<GbpDailyMetrics>, AppError> {
    let client = state.require_google()?;
    let (Some(location), Some(refresh)) = (&store.gbp_location_id, &store.google_refresh_token)
    else {
        return Err(AppError::BadRequest(
            "Business Profile is not connected".to_string(),
        ));
    };
    let token = client.access_token(refresh).await?;
    Ok(client.gbp_daily_metrics(&token, location, range).await?)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::NaiveDate;

    use crate::db::RepositoryError;
    use crate::meta::MetaError;

    use super::*;

    /// In-memory cache: a stored series is a hit for any range.
    #[derive(Default)]
    struct MemoryCache {
        hits: HashMap<Platform, serde_json::Value>,
        fail_reads: bool,
        writes: Mutex<Vec<(Platform, usize)>>,
    }

    impl MemoryCache {
        fn with_hit<R: DailyRecord>(mut self, platform: Platform, records: &[R]) -> Self {
            let value = serde_json::to_value(records).expect("serialize");
            self.hits.insert(platform, value);
            self
        }

        fn writes(&self) -> Vec<(Platform, usize)> {
            self.writes.lock().expect("lock").clone()
        }
    }

    impl DailyCache for MemoryCache {
        async fn get_range<R: DailyRecord>(
            &self,
            _store_id: StoreId,
            platform: Platform,
            _range: &DateRange,
            _now: DateTime<Utc>,
        ) -> Result<Option<Vec<R>>, RepositoryError> {
            if self.fail_reads {
                return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
            }
            self.hits
                .get(&platform)
                .map(|value| serde_json::from_value(value.clone()))
                .transpose()
                .map_err(|e| RepositoryError::DataCorruption(e.to_string()))
        }

        async fn upsert_days<R: DailyRecord>(
            &self,
            _store_id: StoreId,
            platform: Platform,
            records: &[R],
        ) -> Result<(), RepositoryError> {
            self.writes.lock().expect("lock").push((platform, records.len()));
            Ok(())
        }
    }

    fn march() -> DateRange {
        DateRange::parse("2026-03-01", "2026-03-02").expect("range")
    }

    fn now() -> DateTime<Utc> {
        "2026-03-03T09:00:00Z".parse().expect("timestamp")
    }

    fn meta_days() -> Vec<MetaDailyMetrics> {
        vec![
            MetaDailyMetrics {
                spend: 120.0,
                clicks: 12,
                ..MetaDailyMetrics::empty(day(1))
            },
            MetaDailyMetrics::empty(day(2)),
        ]
    }

    async fn load_meta<F, Fut>(
        cache: &MemoryCache,
        fetch: F,
    ) -> Result<(Vec<MetaDailyMetrics>, DataSource), AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<MetaDailyMetrics>, AppError>>,
    {
        load_cached_or_fetch(cache, StoreId::new_v4(), Platform::Meta, &march(), now(), fetch).await
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_fetch() {
        let cache = MemoryCache::default().with_hit(Platform::Meta, &meta_days());
        let calls = &AtomicUsize::new(0);

        let (daily, source) = load_meta(&cache, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        })
        .await
        .expect("cache hit");

        assert_eq!(source, DataSource::Cache);
        assert_eq!(daily, meta_days());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(cache.writes().is_empty());
    }

    #[tokio::test]
    async fn test_cache_miss_fetches_and_writes_back() {
        let cache = MemoryCache::default();
        let calls = &AtomicUsize::new(0);

        let (daily, source) = load_meta(&cache, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(meta_days())
        })
        .await
        .expect("live fetch");

        assert_eq!(source, DataSource::Live);
        assert_eq!(daily.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.writes(), vec![(Platform::Meta, 2)]);
    }

    #[tokio::test]
    async fn test_cache_read_error_falls_back_to_live() {
        let cache = MemoryCache {
            fail_reads: true,
            ..MemoryCache::default()
        };

        let (daily, source) = load_meta(&cache, || async { Ok(meta_days()) })
            .await
            .expect("live fetch");

        assert_eq!(source, DataSource::Live);
        assert_eq!(daily, meta_days());
        assert_eq!(cache.writes(), vec![(Platform::Meta, 2)]);
    }

    #[tokio::test]
    async fn test_failed_fetch_writes_nothing() {
        let cache = MemoryCache::default();

        let result = load_meta(&cache, || async { Err(AppError::Meta(MetaError::TokenExpired)) }).await;

        assert!(result.is_err());
        assert!(cache.writes().is_empty());
    }

    #[tokio::test]
    async fn test_one_platform_failing_leaves_the_others() {
        let ga4_day = Ga4DailyMetrics {
            sessions: 40,
            ..Ga4DailyMetrics::empty(day(1))
        };
        let cache = MemoryCache::default()
            .with_hit(Platform::Ga4, &[ga4_day, Ga4DailyMetrics::empty(day(2))]);

        let sources = PlatformSources {
            meta: Some(|| async {
                Err::<Vec<MetaDailyMetrics>, _>(AppError::Meta(MetaError::RateLimited))
            }),
            ga4: Some(|| async { Ok::<Vec<Ga4DailyMetrics>, AppError>(Vec::new()) }),
            gbp: Some(|| async {
                Ok::<_, AppError>(vec![
                    GbpDailyMetrics::empty(day(1)),
                    GbpDailyMetrics::empty(day(2)),
                ])
            }),
        };

        let report = assemble_dashboard(&cache, StoreId::new_v4(), &march(), now(), sources).await;

        assert_eq!(report.meta.status, PlatformStatus::Error);
        assert!(report.meta.error.is_some());
        assert_eq!(report.ga4.status, PlatformStatus::Ok);
        assert_eq!(report.ga4.source, Some(DataSource::Cache));
        assert_eq!(report.ga4.daily.len(), 2);
        assert_eq!(report.gbp.status, PlatformStatus::Ok);
        assert_eq!(report.gbp.source, Some(DataSource::Live));
        assert_eq!(cache.writes(), vec![(Platform::Gbp, 2)]);
    }

    #[tokio::test]
    async fn test_unlinked_platforms_are_not_connected() {
        let cache = MemoryCache::default();
        let calls = &AtomicUsize::new(0);
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<Vec<GbpDailyMetrics>, AppError>(Vec::new())
        };

        let sources = PlatformSources {
            meta: None::<fn() -> std::future::Ready<Result<Vec<MetaDailyMetrics>, AppError>>>,
            ga4: None::<fn() -> std::future::Ready<Result<Vec<Ga4DailyMetrics>, AppError>>>,
            gbp: Some(fetch),
        };

        let report = assemble_dashboard(&cache, StoreId::new_v4(), &march(), now(), sources).await;

        assert_eq!(report.meta.status, PlatformStatus::NotConnected);
        assert_eq!(report.ga4.status, PlatformStatus::NotConnected);
        assert_eq!(report.gbp.status, PlatformStatus::Ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).expect("valid date")
    }

    #[test]
    fn test_loaded_report_summarizes_daily() {
        let daily = vec![
            MetaDailyMetrics {
                date: day(1),
                spend: 1000.0,
                impressions: 10_000,
                clicks: 100,
                conversions: 4,
                ..MetaDailyMetrics::empty(day(1))
            },
            MetaDailyMetrics {
                date: day(2),
                spend: 500.0,
                impressions: 5_000,
                clicks: 50,
                conversions: 1,
                ..MetaDailyMetrics::empty(day(2))
            },
        ];
        let report = PlatformReport::loaded(daily, DataSource::Live);
        assert_eq!(report.status, PlatformStatus::Ok);

        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["status"], "ok");
        assert_eq!(json["source"], "live");
        assert_eq!(json["daily"].as_array().map(Vec::len), Some(2));
        assert!(json.get("error").is_none());
        assert!(json["summary"].is_object());
    }

    #[test]
    fn test_not_connected_report_is_empty() {
        let report = PlatformReport::<GbpDailyMetrics>::not_connected();
        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["status"], "not_connected");
        assert!(json.get("summary").is_none());
        assert_eq!(json["daily"], serde_json::json!([]));
    }

    #[test]
    fn test_failed_report_hides_internal_details() {
        let err = AppError::Internal("pool timed out on host db-7".to_string());
        let report = PlatformReport::<Ga4DailyMetrics>::failed(&err);
        assert_eq!(report.status, PlatformStatus::Error);
        let message = report.error.expect("message");
        assert!(!message.contains("db-7"));
    }
}
