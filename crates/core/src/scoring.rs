//! Ad performance scoring.
//!
//! A fixed weighted checklist over four independent thresholds. An ad that
//! collects at least [`WINNER_THRESHOLD`] points is flagged as a winner and
//! surfaces first in the ads view and in creative-generation prompts.

use serde::{Deserialize, Serialize};

use crate::metrics::ratio;

/// Minimum score for an ad to count as a winner.
pub const WINNER_THRESHOLD: u8 = 60;

const HIGH_CTR: f64 = 2.0;
const GOOD_CTR: f64 = 1.0;
const MAX_EFFICIENT_COST_PER_VIEW: f64 = 200.0;
const MAX_EFFICIENT_CPC: f64 = 100.0;

/// The inputs the scorer looks at. Rates are percentages, costs are in the
/// ad account currency.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdMetrics {
    /// Click-through rate in percent.
    pub ctr: f64,
    /// Cost per click.
    pub cpc: f64,
    /// Landing page views.
    pub landing_page_views: u64,
    /// Spend divided by landing page views.
    pub cost_per_landing_page_view: f64,
}

impl AdMetrics {
    /// Derive scorer inputs from raw delivery counters.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Ad counters stay far below 2^52
    pub fn from_raw(spend: f64, impressions: u64, clicks: u64, landing_page_views: u64) -> Self {
        Self {
            ctr: ratio(clicks as f64, impressions as f64) * 100.0,
            cpc: ratio(spend, clicks as f64),
            landing_page_views,
            cost_per_landing_page_view: ratio(spend, landing_page_views as f64),
        }
    }
}

/// Why points were awarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreReason {
    /// CTR ≥ 2.0% (+40).
    HighCtr,
    /// 1.0% ≤ CTR < 2.0% (+20).
    GoodCtr,
    /// At least one landing page view (+20).
    LandingPageViews,
    /// Cost per landing page view under 200 (+10).
    EfficientLandingPageViews,
    /// CPC between 0 and 100, exclusive (+20).
    LowCpc,
}

impl ScoreReason {
    /// Points this reason contributes.
    #[must_use]
    pub const fn points(self) -> u8 {
        match self {
            Self::HighCtr => 40,
            Self::GoodCtr | Self::LandingPageViews | Self::LowCpc => 20,
            Self::EfficientLandingPageViews => 10,
        }
    }
}

/// Scorer output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdPerformance {
    pub score: u8,
    pub is_winner: bool,
    pub reasons: Vec<ScoreReason>,
}

/// Score an ad.
///
/// ```
/// use winqer_core::scoring::{AdMetrics, analyze_ad_performance};
///
/// let perf = analyze_ad_performance(&AdMetrics {
///     ctr: 2.5,
///     cpc: 50.0,
///     landing_page_views: 10,
///     cost_per_landing_page_view: 150.0,
/// });
/// assert_eq!(perf.score, 90);
/// assert!(perf.is_winner);
/// ```
#[must_use]
pub fn analyze_ad_performance(metrics: &AdMetrics) -> AdPerformance {
    let mut reasons = Vec::with_capacity(4);

    if metrics.ctr >= HIGH_CTR {
        reasons.push(ScoreReason::HighCtr);
    } else if metrics.ctr >= GOOD_CTR {
        reasons.push(ScoreReason::GoodCtr);
    }

    if metrics.landing_page_views > 0 {
        reasons.push(ScoreReason::LandingPageViews);
        if metrics.cost_per_landing_page_view < MAX_EFFICIENT_COST_PER_VIEW {
            reasons.push(ScoreReason::EfficientLandingPageViews);
        }
    }

    if metrics.cpc > 0.0 && metrics.cpc < MAX_EFFICIENT_CPC {
        reasons.push(ScoreReason::LowCpc);
    }

    let score = reasons.iter().map(|r| r.points()).sum::<u8>();

    AdPerformance {
        score,
        is_winner: score >= WINNER_THRESHOLD,
        reasons,
    }
}
