//! Stripe billing: Checkout and webhook.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use winqer_core::{PlanTier, StoreId, StoreRole};

use crate::db::StoreRepository;
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::services::load_store_for;
use crate::state::AppState;
use crate::stripe::{
    BillingAction, BillingTarget, CheckoutSession, StripeError, WebhookEvent, billing_action,
    verify_signature,
};

use super::extract::{Json, Path};
use super::{ApiResponse, ApiResult};

const SIGNATURE_HEADER: &str = "stripe-signature";

/// Build the billing router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/stores/{id}/billing/checkout", post(checkout))
        .route("/api/stripe/webhook", post(webhook))
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub plan: PlanTier,
}

/// Start a Stripe Checkout for a paid plan.
///
/// POST /api/stores/{id}/billing/checkout
async fn checkout(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<StoreId>,
    Json(body): Json<CheckoutRequest>,
) -> ApiResult<CheckoutSession> {
    let stripe = state.require_stripe()?;
    let (store, _) = load_store_for(state.pool(), &user, id, StoreRole::StoreAdmin).await?;

    let success_url = state
        .config()
        .url_for(&format!("/stores/{id}/billing?checkout=success"));
    let cancel_url = state
        .config()
        .url_for(&format!("/stores/{id}/billing?checkout=cancel"));

    let session = stripe
        .create_checkout_session(
            store.id,
            body.plan,
            store.stripe_customer_id.as_deref(),
            Some(user.email.as_str()),
            &success_url,
            &cancel_url,
        )
        .await?;

    info!(store_id = %id, plan = %body.plan, session_id = %session.id, "Checkout started");
    Ok(ApiResponse::ok(session))
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Verify and apply a Stripe event.
///
/// Events for unknown stores are acknowledged and logged; database failures
/// return 500 so Stripe retries.
///
/// POST /api/stripe/webhook
#[instrument(skip_all)]
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<WebhookAck> {
    let stripe = state.require_stripe()?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| StripeError::InvalidSignature("missing Stripe-Signature".to_string()))?;
    verify_signature(signature, &body, stripe.webhook_secret(), Utc::now().timestamp())?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| StripeError::InvalidPayload(e.to_string()))?;

    match billing_action(&event, stripe)? {
        Some(action) => apply(&state, &event, action).await?,
        None => info!(event_id = %event.id, event_type = %event.event_type, "Ignoring Stripe event"),
    }

    Ok(ApiResponse::ok(WebhookAck { received: true }))
}

async fn apply(state: &AppState, event: &WebhookEvent, action: BillingAction) -> Result<(), AppError> {
    let stores = StoreRepository::new(state.pool());

    let store_id = match &action.target {
        BillingTarget::Store(id) => Some(*id),
        BillingTarget::Subscription(subscription_id) => {
            let by_subscription = stores.find_by_subscription(subscription_id).await?;
            let store = match (by_subscription, &action.update.stripe_customer_id) {
                (Some(store), _) => Some(store),
                (None, Some(customer)) => stores.find_by_customer(customer).await?,
                (None, None) => None,
            };
            store.map(|s| s.id)
        }
    };

    let Some(store_id) = store_id else {
        warn!(event_id = %event.id, event_type = %event.event_type, target = ?action.target, "No store for Stripe event");
        return Ok(());
    };

    match stores.apply_billing(store_id, &action.update).await {
        Ok(()) => {
            info!(
                event_id = %event.id,
                event_type = %event.event_type,
                %store_id,
                plan = %action.update.plan,
                status = ?action.update.subscription_status,
                "Billing updated"
            );
            Ok(())
        }
        Err(crate::db::RepositoryError::NotFound) => {
            warn!(event_id = %event.id, %store_id, "Stripe event references a deleted store");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
