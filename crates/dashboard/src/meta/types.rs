//! Graph API response types.
//!
//! Insights counters arrive as decimal strings (`"spend": "12.40"`), so rows
//! are deserialized loosely and converted into typed metrics afterwards.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use winqer_core::metrics::MetaDailyMetrics;
use winqer_core::{AdMetrics, AdPerformance, DailyRecord, analyze_ad_performance};

use super::MetaError;

/// Action types counted as conversions.
const CONVERSION_ACTION_TYPES: &[&str] = &["purchase", "lead", "complete_registration"];

const LANDING_PAGE_VIEW_ACTION: &str = "landing_page_view";

/// OAuth token response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// An ad account the token can read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdAccount {
    /// `act_<number>`.
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub currency: Option<String>,
    /// 1 = active, 2 = disabled, others are review/closure states.
    #[serde(default, alias = "account_status")]
    pub account_status: Option<i64>,
}

/// A page of Graph API results.
#[derive(Debug, Deserialize)]
pub(crate) struct Paged<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Paging {
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ActionValue {
    pub action_type: String,
    pub value: String,
}

/// One insights row, either account-level per day or ad-level for a range.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InsightRow {
    pub date_start: String,
    #[serde(default)]
    pub ad_id: Option<String>,
    #[serde(default)]
    pub ad_name: Option<String>,
    #[serde(default)]
    pub spend: Option<String>,
    #[serde(default)]
    pub impressions: Option<String>,
    #[serde(default)]
    pub reach: Option<String>,
    #[serde(default)]
    pub clicks: Option<String>,
    #[serde(default)]
    pub actions: Vec<ActionValue>,
}

fn parse_count(value: Option<&str>) -> u64 {
    value
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .map_or(0, |v| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let count = v.round() as u64;
            count
        })
}

fn parse_amount(value: Option<&str>) -> f64 {
    value
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

impl InsightRow {
    fn action_total(&self, types: &[&str]) -> u64 {
        self.actions
            .iter()
            .filter(|a| types.contains(&a.action_type.as_str()))
            .map(|a| parse_count(Some(&a.value)))
            .sum()
    }

    fn landing_page_views(&self) -> u64 {
        self.action_total(&[LANDING_PAGE_VIEW_ACTION])
    }

    fn conversions(&self) -> u64 {
        self.action_total(CONVERSION_ACTION_TYPES)
    }

    /// Convert an account-level daily row.
    pub fn into_daily(self) -> Result<MetaDailyMetrics, MetaError> {
        let date = NaiveDate::parse_from_str(&self.date_start, "%Y-%m-%d")
            .map_err(|e| MetaError::Parse(format!("invalid date_start {}: {e}", self.date_start)))?;

        Ok(MetaDailyMetrics {
            spend: parse_amount(self.spend.as_deref()),
            impressions: parse_count(self.impressions.as_deref()),
            reach: parse_count(self.reach.as_deref()),
            clicks: parse_count(self.clicks.as_deref()),
            landing_page_views: self.landing_page_views(),
            conversions: self.conversions(),
            ..MetaDailyMetrics::empty(date)
        })
    }

    /// Convert an ad-level row.
    pub fn into_ad(self) -> Result<AdInsight, MetaError> {
        let ad_id = self
            .ad_id
            .clone()
            .ok_or_else(|| MetaError::Parse("ad-level row without ad_id".to_string()))?;

        Ok(AdInsight {
            ad_id,
            ad_name: self.ad_name.clone().unwrap_or_default(),
            spend: parse_amount(self.spend.as_deref()),
            impressions: parse_count(self.impressions.as_deref()),
            clicks: parse_count(self.clicks.as_deref()),
            landing_page_views: self.landing_page_views(),
            conversions: self.conversions(),
        })
    }
}

/// Delivery totals for one ad over a range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdInsight {
    pub ad_id: String,
    pub ad_name: String,
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub landing_page_views: u64,
    pub conversions: u64,
}

/// An ad with its scorer inputs and verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredAd {
    #[serde(flatten)]
    pub insight: AdInsight,
    pub metrics: AdMetrics,
    pub performance: AdPerformance,
}

/// Score every ad and sort best first (ties broken by higher spend).
#[must_use]
pub fn score_ads(ads: Vec<AdInsight>) -> Vec<ScoredAd> {
    let mut scored: Vec<ScoredAd> = ads
        .into_iter()
        .map(|insight| {
            let metrics = AdMetrics::from_raw(
                insight.spend,
                insight.impressions,
                insight.clicks,
                insight.landing_page_views,
            );
            let performance = analyze_ad_performance(&metrics);
            ScoredAd {
                insight,
                metrics,
                performance,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.performance
            .score
            .cmp(&a.performance.score)
            .then_with(|| {
                b.insight
                    .spend
                    .partial_cmp(&a.insight.spend)
                    .unwrap_or(Ordering::Equal)
            })
    });
    scored
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const AD_ROW: &str = r#"{
        "ad_id": "120210",
        "ad_name": "Spring sale - carousel",
        "spend": "1500.50",
        "impressions": "40000",
        "clicks": "1000",
        "actions": [
            {"action_type": "link_click", "value": "1000"},
            {"action_type": "landing_page_view", "value": "120"},
            {"action_type": "purchase", "value": "7"}
        ],
        "date_start": "2026-03-01",
        "date_stop": "2026-03-07"
    }"#;

    #[test]
    fn test_ad_row_conversion() {
        let row: InsightRow = serde_json::from_str(AD_ROW).unwrap();
        let ad = row.into_ad().unwrap();
        assert_eq!(ad.ad_id, "120210");
        assert_eq!(ad.impressions, 40_000);
        assert_eq!(ad.landing_page_views, 120);
        assert_eq!(ad.conversions, 7);
        assert!((ad.spend - 1500.5).abs() < 1e-9);
    }

    #[test]
    fn test_daily_row_defaults_missing_counters() {
        let row: InsightRow =
            serde_json::from_str(r#"{"date_start":"2026-03-02","spend":"0"}"#).unwrap();
        let day = row.into_daily().unwrap();
        assert_eq!(day.date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(day.clicks, 0);
        assert_eq!(day.landing_page_views, 0);
    }

    #[test]
    fn test_score_ads_sorted_best_first() {
        let strong = AdInsight {
            ad_id: "1".to_string(),
            ad_name: "strong".to_string(),
            spend: 1500.0,
            impressions: 40_000,
            clicks: 1000,
            landing_page_views: 120,
            conversions: 0,
        };
        let weak = AdInsight {
            ad_id: "2".to_string(),
            ad_name: "weak".to_string(),
            spend: 5000.0,
            impressions: 100_000,
            clicks: 200,
            landing_page_views: 10,
            conversions: 0,
        };

        let scored = score_ads(vec![weak, strong]);
        assert_eq!(scored[0].insight.ad_id, "1");
        assert!(scored[0].performance.is_winner);
        assert!(scored[0].performance.score > scored[1].performance.score);
    }

    #[test]
    fn test_scored_ad_serializes_flat() {
        let scored = score_ads(vec![AdInsight {
            ad_id: "9".to_string(),
            ad_name: "x".to_string(),
            spend: 0.0,
            impressions: 0,
            clicks: 0,
            landing_page_views: 0,
            conversions: 0,
        }]);
        let json = serde_json::to_value(&scored[0]).unwrap();
        assert_eq!(json["adId"], "9");
        assert_eq!(json["performance"]["isWinner"], false);
    }
}
