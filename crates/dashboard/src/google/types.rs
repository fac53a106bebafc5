//! Google API payloads.

use serde::{Deserialize, Serialize};

/// Tokens returned by the OAuth token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleTokens {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    /// Present on the first consent with `access_type=offline`.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// A GA4 property the user can read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ga4Property {
    /// `properties/<number>`.
    pub property: String,
    pub display_name: String,
    pub account_name: String,
}

/// A Business Profile location the user manages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// `locations/<number>`.
    pub name: String,
    pub title: String,
    pub account: String,
}

/// Everything linkable with one Google grant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleResources {
    pub ga4_properties: Vec<Ga4Property>,
    pub locations: Vec<Location>,
}

// =============================================================================
// Wire types (internal)
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccountSummariesPage {
    #[serde(default)]
    pub account_summaries: Vec<AccountSummary>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccountSummary {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub property_summaries: Vec<PropertySummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PropertySummary {
    pub property: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RunReportResponse {
    #[serde(default)]
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportRow {
    pub dimension_values: Vec<ReportValue>,
    pub metric_values: Vec<ReportValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportValue {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BusinessAccountsPage {
    #[serde(default)]
    pub accounts: Vec<BusinessAccount>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BusinessAccount {
    /// `accounts/<number>`.
    pub name: String,
    #[serde(default)]
    pub account_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LocationsPage {
    #[serde(default)]
    pub locations: Vec<LocationEntry>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LocationEntry {
    pub name: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MultiDailyMetricsResponse {
    #[serde(default)]
    pub multi_daily_metric_time_series: Vec<MultiDailyMetricTimeSeries>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MultiDailyMetricTimeSeries {
    #[serde(default)]
    pub daily_metric_time_series: Vec<DailyMetricTimeSeries>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DailyMetricTimeSeries {
    pub daily_metric: String,
    #[serde(default)]
    pub time_series: TimeSeries,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TimeSeries {
    #[serde(default)]
    pub dated_values: Vec<DatedValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DatedValue {
    pub date: GoogleDate,
    /// Absent when the metric was zero.
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct GoogleDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}
