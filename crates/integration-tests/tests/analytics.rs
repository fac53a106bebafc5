//! Date ranges, daily series and cache freshness.

use chrono::{NaiveDate, TimeDelta, TimeZone, Utc};

use winqer_core::metrics::{GbpDailyMetrics, MetaDailyMetrics};
use winqer_core::{DailyRecord, DateRange, fill_days};
use winqer_dashboard::db::analytics_cache::{CACHE_TTL, is_fresh};
use winqer_dashboard::services::PlatformReport;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
}

// =============================================================================
// Cache Freshness
// =============================================================================

#[test]
fn test_cache_row_fresh_at_29_minutes_stale_at_30() {
    let written = Utc
        .with_ymd_and_hms(2026, 5, 1, 9, 0, 0)
        .single()
        .expect("valid time");

    assert!(is_fresh(written, written));
    assert!(is_fresh(written, written + TimeDelta::minutes(29)));
    assert!(is_fresh(
        written,
        written + TimeDelta::minutes(29) + TimeDelta::seconds(59)
    ));
    assert!(!is_fresh(written, written + TimeDelta::minutes(30)));
    assert!(!is_fresh(written, written + TimeDelta::hours(6)));
}

#[test]
fn test_cache_ttl_is_thirty_minutes() {
    assert_eq!(CACHE_TTL.as_secs(), 30 * 60);
}

// =============================================================================
// Daily Series
// =============================================================================

#[test]
fn test_platform_gaps_are_zero_filled() {
    let range = DateRange::parse("2026-05-01", "2026-05-05").expect("valid range");
    let fetched = vec![
        GbpDailyMetrics {
            website_clicks: 3,
            ..GbpDailyMetrics::empty(date("2026-05-04"))
        },
        GbpDailyMetrics {
            call_clicks: 2,
            ..GbpDailyMetrics::empty(date("2026-05-02"))
        },
        // Outside the range
        GbpDailyMetrics {
            call_clicks: 99,
            ..GbpDailyMetrics::empty(date("2026-04-30"))
        },
    ];

    let daily = fill_days(fetched, &range);
    assert_eq!(daily.len(), 5);
    let dates: Vec<NaiveDate> = daily.iter().map(DailyRecord::date).collect();
    assert_eq!(dates, range.days().collect::<Vec<_>>());

    let summary = GbpDailyMetrics::summarize(&daily);
    assert_eq!(summary.website_clicks, 3);
    assert_eq!(summary.call_clicks, 2);
    assert_eq!(summary.total_actions, 5);
}

#[test]
fn test_summary_ratios_come_from_totals() {
    let range = DateRange::parse("2026-05-01", "2026-05-02").expect("valid range");
    let daily = fill_days(
        vec![
            MetaDailyMetrics {
                spend: 1_000.0,
                impressions: 1_000,
                clicks: 100,
                conversions: 10,
                ..MetaDailyMetrics::empty(date("2026-05-01"))
            },
            MetaDailyMetrics {
                spend: 3_000.0,
                impressions: 9_000,
                clicks: 100,
                conversions: 0,
                ..MetaDailyMetrics::empty(date("2026-05-02"))
            },
        ],
        &range,
    );

    let summary = MetaDailyMetrics::summarize(&daily);
    // 200 / 10000, not the mean of 10% and 1.1%
    assert!((summary.ctr - 2.0).abs() < 1e-9);
    assert!((summary.cpc - 20.0).abs() < 1e-9);
    assert!((summary.cpa - 400.0).abs() < 1e-9);
    assert!((summary.cvr - 5.0).abs() < 1e-9);
}

#[test]
fn test_dashboard_section_serializes_summary_and_series() {
    let range = DateRange::parse("2026-05-01", "2026-05-03").expect("valid range");
    let report = PlatformReport::loaded(
        fill_days(Vec::<MetaDailyMetrics>::new(), &range),
        winqer_dashboard::services::DataSource::Cache,
    );

    let json = serde_json::to_value(&report).expect("serialize");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["source"], "cache");
    assert_eq!(json["daily"].as_array().map(Vec::len), Some(3));
    assert_eq!(json["summary"]["spend"], 0.0);
}
