//! Ad creative generation for a store.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use winqer_core::{DateRange, PlanTier};

use crate::ai::{AdCreative, AiError, AiProvider, CreativeRequest};
use crate::error::AppError;
use crate::meta::ScoredAd;
use crate::models::Store;
use crate::state::AppState;

use super::analytics::store_ads;

/// Days of Meta delivery used to pick winning ads for the prompt.
const WINNER_LOOKBACK_DAYS: u32 = 30;

/// Generated creatives plus the context they were built from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeResponse {
    pub provider: AiProvider,
    pub creatives: Vec<AdCreative>,
    /// Winning ads quoted in the prompt.
    pub reference_ads: usize,
}

/// Check that the store's plan allows generating `request`.
///
/// # Errors
///
/// Returns `AppError::PaymentRequired` on the free plan and
/// `AppError::Ai(InvalidRequest)` when the request breaks plan limits.
pub fn check_plan(plan: PlanTier, request: &CreativeRequest) -> Result<(), AppError> {
    if !plan.includes_creatives() {
        return Err(AppError::PaymentRequired(
            "Creative generation requires a paid plan".to_string(),
        ));
    }
    request.validate(plan.max_creative_variants())?;
    Ok(())
}

/// Generate creatives, quoting the store's current Meta winners when available.
///
/// Failing to load ads only drops the reference ads from the prompt.
///
/// # Errors
///
/// Returns plan errors from [`check_plan`], `AppError::NotConfigured` if no
/// AI provider is configured, or the provider's error.
#[instrument(skip(state, store, request), fields(store_id = %store.id))]
pub async fn generate_creatives(
    state: &AppState,
    store: &Store,
    request: &CreativeRequest,
) -> Result<CreativeResponse, AppError> {
    check_plan(store.plan, request)?;

    let generator = state.creatives();
    if !generator.is_configured() {
        return Err(AppError::Ai(AiError::ProviderNotConfigured(
            request.provider.unwrap_or_default(),
        )));
    }

    let winners = winning_ads(state, store).await;
    let (provider, creatives) = generator.generate(request, &winners).await?;

    info!(%provider, count = creatives.len(), reference_ads = winners.len(), "Generated creatives");

    Ok(CreativeResponse {
        provider,
        creatives,
        reference_ads: winners.len(),
    })
}

async fn winning_ads(state: &AppState, store: &Store) -> Vec<ScoredAd> {
    if state.meta().is_none() || store.meta_ad_account_id.is_none() || store.meta_access_token.is_none() {
        return Vec::new();
    }

    let range = DateRange::last_days(WINNER_LOOKBACK_DAYS, Utc::now().date_naive());
    match store_ads(state, store, &range).await {
        Ok(ads) => ads.into_iter().filter(|ad| ad.performance.is_winner).collect(),
        Err(e) => {
            warn!(store_id = %store.id, error = %e, "Could not load winning ads for prompt");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(variants: u8) -> CreativeRequest {
        let mut req: CreativeRequest =
            serde_json::from_str(r#"{"product": "Weekday lunch set"}"#).expect("request");
        req.variants = variants;
        req
    }

    #[test]
    fn test_free_plan_requires_upgrade() {
        assert!(matches!(
            check_plan(PlanTier::Free, &request(1)),
            Err(AppError::PaymentRequired(_))
        ));
    }

    #[test]
    fn test_variant_limit_follows_plan() {
        let standard_max = PlanTier::Standard.max_creative_variants();
        assert!(check_plan(PlanTier::Standard, &request(standard_max)).is_ok());
        assert!(matches!(
            check_plan(PlanTier::Standard, &request(standard_max + 1)),
            Err(AppError::Ai(AiError::InvalidRequest(_)))
        ));

        let premium_max = PlanTier::Premium.max_creative_variants();
        assert!(premium_max >= standard_max);
        assert!(check_plan(PlanTier::Premium, &request(premium_max)).is_ok());
    }
}
