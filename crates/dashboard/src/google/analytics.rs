//! GA4 Data and Admin API calls.

use chrono::NaiveDate;
use tracing::instrument;
use url::Url;

use winqer_core::metrics::Ga4DailyMetrics;
use winqer_core::{DailyRecord, DateRange, fill_days};

use super::client::{AccessToken, GoogleClient};
use super::types::{AccountSummariesPage, Ga4Property, ReportRow, RunReportResponse};
use super::GoogleError;

const DATA_API_BASE: &str = "https://analyticsdata.googleapis.com/v1beta";
const ADMIN_API_BASE: &str = "https://analyticsadmin.googleapis.com/v1beta";

/// Report metrics, in the order [`parse_report_row`] reads them.
const REPORT_METRICS: [&str; 6] = [
    "sessions",
    "activeUsers",
    "newUsers",
    "engagedSessions",
    "screenPageViews",
    "keyEvents",
];

const MAX_SUMMARY_PAGES: usize = 10;

impl GoogleClient {
    /// Daily GA4 traffic for every day of `range`.
    ///
    /// `property` may be `properties/123` or the bare number.
    ///
    /// # Errors
    ///
    /// Returns an error if the report request fails or a row is malformed.
    #[instrument(skip(self, token), fields(range = ?range))]
    pub async fn ga4_daily_report(
        &self,
        token: &AccessToken,
        property: &str,
        range: &DateRange,
    ) -> Result<Vec<Ga4DailyMetrics>, GoogleError> {
        let url = Url::parse(&format!(
            "{DATA_API_BASE}/{}:runReport",
            normalize_property(property)
        ))?;

        let body = serde_json::json!({
            "dateRanges": [{
                "startDate": range.start.format("%Y-%m-%d").to_string(),
                "endDate": range.end.format("%Y-%m-%d").to_string(),
            }],
            "dimensions": [{ "name": "date" }],
            "metrics": REPORT_METRICS.iter().map(|m| serde_json::json!({ "name": m })).collect::<Vec<_>>(),
            "keepEmptyRows": true,
        });

        let report: RunReportResponse = self.post_json(url, token, &body).await?;
        let days = report
            .rows
            .iter()
            .map(parse_report_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(fill_days(days, range))
    }

    /// GA4 properties visible to the grant, across all accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the Admin API request fails.
    #[instrument(skip_all)]
    pub async fn list_ga4_properties(
        &self,
        token: &AccessToken,
    ) -> Result<Vec<Ga4Property>, GoogleError> {
        let mut properties = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_SUMMARY_PAGES {
            let mut url = Url::parse(&format!("{ADMIN_API_BASE}/accountSummaries"))?;
            url.query_pairs_mut().append_pair("pageSize", "200");
            if let Some(next) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", next);
            }

            let page: AccountSummariesPage = self.get_json(url, token).await?;
            for account in page.account_summaries {
                properties.extend(account.property_summaries.into_iter().map(|p| Ga4Property {
                    property: p.property,
                    display_name: p.display_name,
                    account_name: account.display_name.clone(),
                }));
            }

            page_token = page.next_page_token.filter(|t| !t.is_empty());
            if page_token.is_none() {
                break;
            }
        }

        Ok(properties)
    }
}

fn normalize_property(property: &str) -> String {
    let property = property.trim();
    if property.starts_with("properties/") {
        property.to_string()
    } else {
        format!("properties/{property}")
    }
}

/// Parse one `date` row. GA4 formats the date dimension as `YYYYMMDD`.
fn parse_report_row(row: &ReportRow) -> Result<Ga4DailyMetrics, GoogleError> {
    let raw_date = row
        .dimension_values
        .first()
        .map(|v| v.value.as_str())
        .ok_or_else(|| GoogleError::Parse("report row without date".to_string()))?;
    let date = NaiveDate::parse_from_str(raw_date, "%Y%m%d")
        .map_err(|e| GoogleError::Parse(format!("invalid report date {raw_date}: {e}")))?;

    let metric = |index: usize| -> u64 {
        row.metric_values
            .get(index)
            .and_then(|v| v.value.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
            .map_or(0, |v| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let count = v.round() as u64;
                count
            })
    };

    Ok(Ga4DailyMetrics {
        sessions: metric(0),
        active_users: metric(1),
        new_users: metric(2),
        engaged_sessions: metric(3),
        page_views: metric(4),
        conversions: metric(5),
        ..Ga4DailyMetrics::empty(date)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report_row() {
        let json = r#"{
            "dimensionValues": [{"value": "20260305"}],
            "metricValues": [
                {"value": "120"}, {"value": "98"}, {"value": "40"},
                {"value": "75"}, {"value": "300"}, {"value": "3"}
            ]
        }"#;
        let row: ReportRow = serde_json::from_str(json).unwrap();
        let day = parse_report_row(&row).unwrap();
        assert_eq!(day.date, NaiveDate::from_ymd_opt(2026, 3, 5).unwrap());
        assert_eq!(day.sessions, 120);
        assert_eq!(day.page_views, 300);
        assert_eq!(day.conversions, 3);
    }

    #[test]
    fn test_parse_report_row_rejects_bad_date() {
        let row: ReportRow =
            serde_json::from_str(r#"{"dimensionValues":[{"value":"(other)"}],"metricValues":[]}"#)
                .unwrap();
        assert!(matches!(parse_report_row(&row), Err(GoogleError::Parse(_))));
    }

    #[test]
    fn test_normalize_property() {
        assert_eq!(normalize_property("123"), "properties/123");
        assert_eq!(normalize_property("properties/123"), "properties/123");
    }
}
