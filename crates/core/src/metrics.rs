//! Per-platform daily metrics, date ranges, and derived advertising ratios.
//!
//! Platform clients return one record per day; the dashboard caches each day
//! separately and sums them into a summary. Derived ratios (CTR, CVR, CPC,
//! CPA) are always recomputed from summed counters, never averaged.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Longest range the dashboard will request from a platform.
pub const MAX_RANGE_DAYS: u32 = 366;

/// `num / den`, or 0 when the denominator is not positive.
#[must_use]
pub fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

// =============================================================================
// Date Ranges
// =============================================================================

/// Errors building a [`DateRange`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateRangeError {
    #[error("start date {start} is after end date {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },
    #[error("range spans {0} days, maximum is {MAX_RANGE_DAYS}")]
    TooLong(u32),
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("unknown range preset: {0}")]
    UnknownPreset(String),
}

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting inverted or overly long spans.
    ///
    /// # Errors
    ///
    /// Returns `Inverted` if `start > end` and `TooLong` past [`MAX_RANGE_DAYS`].
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::Inverted { start, end });
        }
        let range = Self { start, end };
        let days = range.num_days();
        if days > MAX_RANGE_DAYS {
            return Err(DateRangeError::TooLong(days));
        }
        Ok(range)
    }

    /// Parse `YYYY-MM-DD` bounds.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDate` for malformed dates, plus the errors of [`Self::new`].
    pub fn parse(start: &str, end: &str) -> Result<Self, DateRangeError> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| DateRangeError::InvalidDate(s.to_string()))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// The last `days` days ending on `today` (inclusive).
    #[must_use]
    pub fn last_days(days: u32, today: NaiveDate) -> Self {
        let back = u64::from(days.clamp(1, MAX_RANGE_DAYS) - 1);
        let start = today.checked_sub_days(Days::new(back)).unwrap_or(today);
        Self { start, end: today }
    }

    /// Resolve a UI preset (`7d`, `30d`, `90d`).
    ///
    /// # Errors
    ///
    /// Returns `UnknownPreset` for anything else.
    pub fn from_preset(preset: &str, today: NaiveDate) -> Result<Self, DateRangeError> {
        match preset {
            "7d" => Ok(Self::last_days(7, today)),
            "30d" => Ok(Self::last_days(30, today)),
            "90d" => Ok(Self::last_days(90, today)),
            other => Err(DateRangeError::UnknownPreset(other.to_string())),
        }
    }

    /// Number of days in the range (inclusive).
    #[must_use]
    pub fn num_days(&self) -> u32 {
        let span = (self.end - self.start).num_days() + 1;
        u32::try_from(span).unwrap_or(u32::MAX)
    }

    /// Iterate every day in the range.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// Whether `date` falls inside the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

// =============================================================================
// Daily Records
// =============================================================================

/// A single day of metrics from one platform.
pub trait DailyRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Summary produced by folding a range of records.
    type Summary: Serialize;

    /// A record with every counter at zero.
    fn empty(date: NaiveDate) -> Self;

    /// The day this record describes.
    fn date(&self) -> NaiveDate;

    /// Fold records into a summary.
    fn summarize(records: &[Self]) -> Self::Summary;
}

/// One record per day of `range`, in date order.
///
/// Platforms omit days without activity; those become zero records. Records
/// outside the range are dropped, and a later duplicate replaces an earlier one.
#[must_use]
pub fn fill_days<R: DailyRecord>(records: Vec<R>, range: &DateRange) -> Vec<R> {
    let mut by_day: BTreeMap<NaiveDate, R> = records
        .into_iter()
        .filter(|r| range.contains(r.date()))
        .map(|r| (r.date(), r))
        .collect();

    range
        .days()
        .map(|day| by_day.remove(&day).unwrap_or_else(|| R::empty(day)))
        .collect()
}

/// One day of Meta Ads account delivery.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaDailyMetrics {
    pub date: NaiveDate,
    pub spend: f64,
    pub impressions: u64,
    pub reach: u64,
    pub clicks: u64,
    pub landing_page_views: u64,
    pub conversions: u64,
}

/// Meta totals with derived ratios.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaSummary {
    pub spend: f64,
    pub impressions: u64,
    pub reach: u64,
    pub clicks: u64,
    pub landing_page_views: u64,
    pub conversions: u64,
    /// Click-through rate, percent.
    pub ctr: f64,
    /// Conversion rate, percent of clicks.
    pub cvr: f64,
    pub cpc: f64,
    pub cpa: f64,
    pub cost_per_landing_page_view: f64,
}

impl DailyRecord for MetaDailyMetrics {
    type Summary = MetaSummary;

    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            ..Self::default()
        }
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    #[allow(clippy::cast_precision_loss)] // Delivery counters stay far below 2^52
    fn summarize(records: &[Self]) -> MetaSummary {
        let mut s = MetaSummary::default();
        for r in records {
            s.spend += r.spend;
            s.impressions += r.impressions;
            s.reach += r.reach;
            s.clicks += r.clicks;
            s.landing_page_views += r.landing_page_views;
            s.conversions += r.conversions;
        }
        s.ctr = ratio(s.clicks as f64, s.impressions as f64) * 100.0;
        s.cvr = ratio(s.conversions as f64, s.clicks as f64) * 100.0;
        s.cpc = ratio(s.spend, s.clicks as f64);
        s.cpa = ratio(s.spend, s.conversions as f64);
        s.cost_per_landing_page_view = ratio(s.spend, s.landing_page_views as f64);
        s
    }
}

/// One day of GA4 site traffic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ga4DailyMetrics {
    pub date: NaiveDate,
    pub sessions: u64,
    pub active_users: u64,
    pub new_users: u64,
    pub engaged_sessions: u64,
    pub page_views: u64,
    pub conversions: u64,
}

/// GA4 totals with derived ratios.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ga4Summary {
    pub sessions: u64,
    /// Sum of daily active users; users active on several days count once per day.
    pub active_users: u64,
    pub new_users: u64,
    pub engaged_sessions: u64,
    pub page_views: u64,
    pub conversions: u64,
    /// Engaged sessions over sessions, percent.
    pub engagement_rate: f64,
    /// Conversions over sessions, percent.
    pub cvr: f64,
}

impl DailyRecord for Ga4DailyMetrics {
    type Summary = Ga4Summary;

    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            ..Self::default()
        }
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    #[allow(clippy::cast_precision_loss)]
    fn summarize(records: &[Self]) -> Ga4Summary {
        let mut s = Ga4Summary::default();
        for r in records {
            s.sessions += r.sessions;
            s.active_users += r.active_users;
            s.new_users += r.new_users;
            s.engaged_sessions += r.engaged_sessions;
            s.page_views += r.page_views;
            s.conversions += r.conversions;
        }
        s.engagement_rate = ratio(s.engaged_sessions as f64, s.sessions as f64) * 100.0;
        s.cvr = ratio(s.conversions as f64, s.sessions as f64) * 100.0;
        s
    }
}

/// One day of Google Business Profile interactions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GbpDailyMetrics {
    pub date: NaiveDate,
    pub search_impressions: u64,
    pub maps_impressions: u64,
    pub website_clicks: u64,
    pub call_clicks: u64,
    pub direction_requests: u64,
}

impl GbpDailyMetrics {
    /// Website clicks, calls and direction requests.
    #[must_use]
    pub const fn actions(&self) -> u64 {
        self.website_clicks + self.call_clicks + self.direction_requests
    }
}

/// GBP totals.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GbpSummary {
    pub search_impressions: u64,
    pub maps_impressions: u64,
    pub total_impressions: u64,
    pub website_clicks: u64,
    pub call_clicks: u64,
    pub direction_requests: u64,
    pub total_actions: u64,
    /// Actions over impressions, percent.
    pub action_rate: f64,
}

impl DailyRecord for GbpDailyMetrics {
    type Summary = GbpSummary;

    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            ..Self::default()
        }
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    #[allow(clippy::cast_precision_loss)]
    fn summarize(records: &[Self]) -> GbpSummary {
        let mut s = GbpSummary::default();
        for r in records {
            s.search_impressions += r.search_impressions;
            s.maps_impressions += r.maps_impressions;
            s.website_clicks += r.website_clicks;
            s.call_clicks += r.call_clicks;
            s.direction_requests += r.direction_requests;
            s.total_actions += r.actions();
        }
        s.total_impressions = s.search_impressions + s.maps_impressions;
        s.action_rate = ratio(s.total_actions as f64, s.total_impressions as f64) * 100.0;
        s
    }
}
