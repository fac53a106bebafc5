//! Business Profile discovery and Performance API calls.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use futures::future::try_join_all;
use tracing::instrument;
use url::Url;

use winqer_core::metrics::GbpDailyMetrics;
use winqer_core::{DailyRecord, DateRange, fill_days};

use super::client::{AccessToken, GoogleClient};
use super::types::{
    BusinessAccount, BusinessAccountsPage, GoogleResources, Location, LocationsPage,
    MultiDailyMetricsResponse,
};
use super::GoogleError;

const ACCOUNTS_API_BASE: &str = "https://mybusinessaccountmanagement.googleapis.com/v1";
const INFORMATION_API_BASE: &str = "https://mybusinessbusinessinformation.googleapis.com/v1";
const PERFORMANCE_API_BASE: &str = "https://businessprofileperformance.googleapis.com/v1";

const MAX_PAGES: usize = 10;

/// Performance API metric names, grouped into our daily counters.
const DAILY_METRICS: [&str; 7] = [
    "BUSINESS_IMPRESSIONS_DESKTOP_SEARCH",
    "BUSINESS_IMPRESSIONS_MOBILE_SEARCH",
    "BUSINESS_IMPRESSIONS_DESKTOP_MAPS",
    "BUSINESS_IMPRESSIONS_MOBILE_MAPS",
    "WEBSITE_CLICKS",
    "CALL_CLICKS",
    "BUSINESS_DIRECTION_REQUESTS",
];

impl GoogleClient {
    /// Daily Business Profile metrics for every day of `range`.
    ///
    /// `location` may be `locations/123` or the bare number.
    ///
    /// # Errors
    ///
    /// Returns an error if the Performance API request fails.
    #[instrument(skip(self, token), fields(range = ?range))]
    pub async fn gbp_daily_metrics(
        &self,
        token: &AccessToken,
        location: &str,
        range: &DateRange,
    ) -> Result<Vec<GbpDailyMetrics>, GoogleError> {
        let mut url = Url::parse(&format!(
            "{PERFORMANCE_API_BASE}/{}:fetchMultiDailyMetricsTimeSeries",
            normalize_location(location)
        ))?;
        {
            let mut query = url.query_pairs_mut();
            for metric in DAILY_METRICS {
                query.append_pair("dailyMetrics", metric);
            }
            append_date(&mut query, "dailyRange.start_date", range.start);
            append_date(&mut query, "dailyRange.end_date", range.end);
        }

        let response: MultiDailyMetricsResponse = self.get_json(url, token).await?;
        Ok(fill_days(collect_daily(response), range))
    }

    /// Business Profile locations across every account the grant manages.
    ///
    /// # Errors
    ///
    /// Returns an error if any account or location request fails.
    #[instrument(skip_all)]
    pub async fn list_locations(&self, token: &AccessToken) -> Result<Vec<Location>, GoogleError> {
        let accounts = self.list_business_accounts(token).await?;
        let per_account = try_join_all(
            accounts
                .iter()
                .map(|account| self.list_account_locations(token, account)),
        )
        .await?;

        Ok(per_account.into_iter().flatten().collect())
    }

    /// GA4 properties and Business Profile locations, discovered concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first error from either discovery.
    #[instrument(skip_all)]
    pub async fn discover_resources(
        &self,
        token: &AccessToken,
    ) -> Result<GoogleResources, GoogleError> {
        let (ga4_properties, locations) =
            tokio::try_join!(self.list_ga4_properties(token), self.list_locations(token))?;

        Ok(GoogleResources {
            ga4_properties,
            locations,
        })
    }

    async fn list_business_accounts(
        &self,
        token: &AccessToken,
    ) -> Result<Vec<BusinessAccount>, GoogleError> {
        let mut accounts = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut url = Url::parse(&format!("{ACCOUNTS_API_BASE}/accounts"))?;
            if let Some(next) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", next);
            }

            let page: BusinessAccountsPage = self.get_json(url, token).await?;
            accounts.extend(page.accounts);

            page_token = page.next_page_token.filter(|t| !t.is_empty());
            if page_token.is_none() {
                break;
            }
        }

        Ok(accounts)
    }

    async fn list_account_locations(
        &self,
        token: &AccessToken,
        account: &BusinessAccount,
    ) -> Result<Vec<Location>, GoogleError> {
        let mut locations = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut url = Url::parse(&format!("{INFORMATION_API_BASE}/{}/locations", account.name))?;
            url.query_pairs_mut()
                .append_pair("readMask", "name,title")
                .append_pair("pageSize", "100");
            if let Some(next) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", next);
            }

            let page: LocationsPage = self.get_json(url, token).await?;
            locations.extend(page.locations.into_iter().map(|entry| Location {
                name: entry.name,
                title: entry.title,
                account: account.account_name.clone(),
            }));

            page_token = page.next_page_token.filter(|t| !t.is_empty());
            if page_token.is_none() {
                break;
            }
        }

        Ok(locations)
    }
}

fn normalize_location(location: &str) -> String {
    let location = location.trim();
    match location.rfind("locations/") {
        // Accept `accounts/1/locations/2` as well.
        Some(idx) => location[idx..].to_string(),
        None => format!("locations/{location}"),
    }
}

fn append_date(
    query: &mut url::form_urlencoded::Serializer<'_, url::UrlQuery<'_>>,
    prefix: &str,
    date: NaiveDate,
) {
    query
        .append_pair(&format!("{prefix}.year"), &date.year().to_string())
        .append_pair(&format!("{prefix}.month"), &date.month().to_string())
        .append_pair(&format!("{prefix}.day"), &date.day().to_string());
}

/// Fold the per-metric time series into one record per day.
fn collect_daily(response: MultiDailyMetricsResponse) -> Vec<GbpDailyMetrics> {
    let mut days: BTreeMap<NaiveDate, GbpDailyMetrics> = BTreeMap::new();

    let series = response
        .multi_daily_metric_time_series
        .into_iter()
        .flat_map(|m| m.daily_metric_time_series);

    for metric in series {
        for point in metric.time_series.dated_values {
            let Some(date) =
                NaiveDate::from_ymd_opt(point.date.year, point.date.month, point.date.day)
            else {
                continue;
            };
            let value = point
                .value
                .as_deref()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);

            let day = days
                .entry(date)
                .or_insert_with(|| GbpDailyMetrics::empty(date));
            match metric.daily_metric.as_str() {
                "BUSINESS_IMPRESSIONS_DESKTOP_SEARCH" | "BUSINESS_IMPRESSIONS_MOBILE_SEARCH" => {
                    day.search_impressions += value;
                }
                "BUSINESS_IMPRESSIONS_DESKTOP_MAPS" | "BUSINESS_IMPRESSIONS_MOBILE_MAPS" => {
                    day.maps_impressions += value;
                }
                "WEBSITE_CLICKS" => day.website_clicks += value,
                "CALL_CLICKS" => day.call_clicks += value,
                "BUSINESS_DIRECTION_REQUESTS" => day.direction_requests += value,
                _ => {}
            }
        }
    }

    days.into_values().collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_daily_groups_by_date() {
        let json = r#"{
            "multiDailyMetricTimeSeries": [{
                "dailyMetricTimeSeries": [
                    {
                        "dailyMetric": "BUSINESS_IMPRESSIONS_MOBILE_SEARCH",
                        "timeSeries": {"datedValues": [
                            {"date": {"year": 2026, "month": 4, "day": 1}, "value": "30"},
                            {"date": {"year": 2026, "month": 4, "day": 2}}
                        ]}
                    },
                    {
                        "dailyMetric": "BUSINESS_IMPRESSIONS_DESKTOP_SEARCH",
                        "timeSeries": {"datedValues": [
                            {"date": {"year": 2026, "month": 4, "day": 1}, "value": "12"}
                        ]}
                    },
                    {
                        "dailyMetric": "CALL_CLICKS",
                        "timeSeries": {"datedValues": [
                            {"date": {"year": 2026, "month": 4, "day": 2}, "value": "4"}
                        ]}
                    }
                ]
            }]
        }"#;
        let response: MultiDailyMetricsResponse = serde_json::from_str(json).unwrap();
        let days = collect_daily(response);

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].search_impressions, 42);
        assert_eq!(days[1].search_impressions, 0);
        assert_eq!(days[1].call_clicks, 4);
    }

    #[test]
    fn test_normalize_location() {
        assert_eq!(normalize_location("987"), "locations/987");
        assert_eq!(normalize_location("accounts/1/locations/987"), "locations/987");
    }

    #[test]
    fn test_append_date_params() {
        let mut url = Url::parse("https://example.test/x").unwrap();
        {
            let mut query = url.query_pairs_mut();
            append_date(&mut query, "dailyRange.start_date", NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());
        }
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("dailyRange.start_date.month".to_string(), "4".to_string())));
    }
}
