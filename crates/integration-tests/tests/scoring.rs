//! Ad scoring and ranking.

use winqer_core::scoring::{AdMetrics, ScoreReason, WINNER_THRESHOLD, analyze_ad_performance};
use winqer_dashboard::meta::{AdInsight, score_ads};

fn ad(id: &str, spend: f64, impressions: u64, clicks: u64, landing_page_views: u64) -> AdInsight {
    AdInsight {
        ad_id: id.to_string(),
        ad_name: format!("Ad {id}"),
        spend,
        impressions,
        clicks,
        landing_page_views,
        conversions: 0,
    }
}

#[test]
fn test_reference_examples() {
    let strong = analyze_ad_performance(&AdMetrics {
        ctr: 2.5,
        cpc: 50.0,
        landing_page_views: 10,
        cost_per_landing_page_view: 150.0,
    });
    assert_eq!(strong.score, 90);
    assert!(strong.is_winner);

    let weak = analyze_ad_performance(&AdMetrics {
        ctr: 0.5,
        cpc: 150.0,
        landing_page_views: 0,
        cost_per_landing_page_view: 0.0,
    });
    assert_eq!(weak.score, 0);
    assert!(!weak.is_winner);
}

#[test]
fn test_maximum_score_is_ninety() {
    let perf = analyze_ad_performance(&AdMetrics {
        ctr: 10.0,
        cpc: 1.0,
        landing_page_views: 1_000,
        cost_per_landing_page_view: 1.0,
    });
    assert_eq!(perf.score, 90);
    assert_eq!(perf.reasons.len(), 4);
    assert!(!perf.reasons.contains(&ScoreReason::GoodCtr));
}

#[test]
fn test_score_ads_ranks_winners_first() {
    let ads = vec![
        // CTR 0.5%, CPC 200: nothing
        ad("weak", 2_000.0, 2_000, 10, 0),
        // CTR 3%, CPC 20, 10 views at 60 each: 90
        ad("strong", 600.0, 1_000, 30, 10),
        // CTR 1.5%, CPC 80, 4 views at 300 each: 60
        ad("borderline", 1_200.0, 1_000, 15, 4),
    ];

    let scored = score_ads(ads);
    let order: Vec<&str> = scored.iter().map(|s| s.insight.ad_id.as_str()).collect();
    assert_eq!(order, ["strong", "borderline", "weak"]);

    assert_eq!(scored[0].performance.score, 90);
    assert_eq!(scored[1].performance.score, WINNER_THRESHOLD);
    assert!(scored[1].performance.is_winner);
    assert!(!scored[2].performance.is_winner);
}

#[test]
fn test_equal_scores_rank_by_spend() {
    let scored = score_ads(vec![ad("small", 100.0, 0, 0, 0), ad("large", 900.0, 0, 0, 0)]);
    assert_eq!(scored[0].insight.ad_id, "large");
    assert_eq!(scored[0].performance.score, scored[1].performance.score);
}

#[test]
fn test_scored_ad_serializes_flat() {
    let scored = score_ads(vec![ad("a1", 600.0, 1_000, 30, 10)]);
    let json = serde_json::to_value(&scored[0]).expect("serialize");
    assert_eq!(json["adId"], "a1");
    assert_eq!(json["performance"]["score"], 90);
    assert_eq!(json["performance"]["isWinner"], true);
    assert!(json["metrics"]["ctr"].is_number());
}
