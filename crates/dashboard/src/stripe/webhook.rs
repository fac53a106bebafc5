//! Webhook signature verification and event interpretation.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;

use winqer_core::{PlanTier, StoreId};

use super::{StripeClient, StripeError};
use crate::models::BillingUpdate;

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`).
///
/// The signed payload is `"{t}.{raw body}"`, HMAC-SHA256 with the endpoint
/// secret. Any matching `v1` entry is accepted.
///
/// # Errors
///
/// Returns `StripeError::InvalidSignature` if the header is malformed, the
/// timestamp is outside the tolerance, or no signature matches.
pub fn verify_signature(
    header: &str,
    payload: &[u8],
    secret: &SecretString,
    now: i64,
) -> Result<(), StripeError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| StripeError::InvalidSignature("missing timestamp".to_string()))?;
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| StripeError::InvalidSignature("invalid timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(StripeError::InvalidSignature("missing v1 signature".to_string()));
    }
    if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(StripeError::InvalidSignature(
            "timestamp outside tolerance".to_string(),
        ));
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| StripeError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    if signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(StripeError::InvalidSignature("signature mismatch".to_string()))
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

// =============================================================================
// Events
// =============================================================================

/// The subset of a Stripe event envelope the dashboard reads.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    #[serde(default)]
    client_reference_id: Option<String>,
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    subscription: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    items: SubscriptionItems,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    store_id: Option<String>,
    #[serde(default)]
    plan: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SubscriptionItems {
    #[serde(default)]
    data: Vec<SubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItem {
    price: Price,
}

#[derive(Debug, Deserialize)]
struct Price {
    id: String,
}

/// Which store a billing change applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingTarget {
    /// Known from `client_reference_id` or metadata.
    Store(StoreId),
    /// Look the store up by its subscription.
    Subscription(String),
}

/// A plan change derived from a webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingAction {
    pub target: BillingTarget,
    pub update: BillingUpdate,
}

/// Subscription states that still grant the paid plan.
fn grants_plan(status: &str) -> bool {
    matches!(status, "active" | "trialing" | "past_due")
}

fn parse_store_id(raw: Option<&str>) -> Option<StoreId> {
    raw.and_then(|s| s.parse().ok())
}

fn parse_object<T: serde::de::DeserializeOwned>(event: &WebhookEvent) -> Result<T, StripeError> {
    serde_json::from_value(event.data.object.clone())
        .map_err(|e| StripeError::InvalidPayload(format!("{}: {e}", event.event_type)))
}

/// Interpret an event. Returns `None` for event types the dashboard ignores
/// and for paid subscription updates whose price maps to no plan.
///
/// Checkout completion leaves the subscription status to the subscription
/// events that follow it.
///
/// # Errors
///
/// Returns `StripeError::InvalidPayload` if a handled event is missing the
/// fields needed to find the store or plan.
pub fn billing_action(
    event: &WebhookEvent,
    stripe: &StripeClient,
) -> Result<Option<BillingAction>, StripeError> {
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSessionObject = parse_object(event)?;
            let store_id = parse_store_id(session.client_reference_id.as_deref())
                .or_else(|| parse_store_id(session.metadata.store_id.as_deref()))
                .ok_or_else(|| {
                    StripeError::InvalidPayload("checkout session without store id".to_string())
                })?;
            let plan = session
                .metadata
                .plan
                .as_deref()
                .and_then(|p| p.parse::<PlanTier>().ok())
                .ok_or_else(|| {
                    StripeError::InvalidPayload("checkout session without plan".to_string())
                })?;

            Ok(Some(BillingAction {
                target: BillingTarget::Store(store_id),
                update: BillingUpdate {
                    plan,
                    stripe_customer_id: session.customer,
                    stripe_subscription_id: session.subscription,
                    subscription_status: None,
                },
            }))
        }
        "customer.subscription.updated" => {
            let subscription: SubscriptionObject = parse_object(event)?;
            let status = subscription.status.clone().unwrap_or_default();
            let paid_plan = subscription
                .items
                .data
                .iter()
                .find_map(|item| stripe.plan_for_price(&item.price.id))
                .or_else(|| {
                    subscription
                        .metadata
                        .plan
                        .as_deref()
                        .and_then(|p| p.parse().ok())
                });
            let plan = match paid_plan {
                _ if !grants_plan(&status) => PlanTier::Free,
                Some(plan) => plan,
                None => {
                    tracing::warn!(
                        subscription_id = %subscription.id,
                        %status,
                        "Subscription update with unknown price ignored"
                    );
                    return Ok(None);
                }
            };

            Ok(Some(subscription_action(subscription, plan, status)))
        }
        "customer.subscription.deleted" => {
            let subscription: SubscriptionObject = parse_object(event)?;
            Ok(Some(subscription_action(
                subscription,
                PlanTier::Free,
                "canceled".to_string(),
            )))
        }
        _ => Ok(None),
    }
}

fn subscription_action(subscription: SubscriptionObject, plan: PlanTier, status: String) -> BillingAction {
    let target = parse_store_id(subscription.metadata.store_id.as_deref()).map_or_else(
        || BillingTarget::Subscription(subscription.id.clone()),
        BillingTarget::Store,
    );

    BillingAction {
        target,
        update: BillingUpdate {
            plan,
            stripe_customer_id: subscription.customer,
            stripe_subscription_id: Some(subscription.id),
            subscription_status: Some(status),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::StripeConfig;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_767_225_600;

    fn sign(payload: &str, ts: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{ts}.{payload}").as_bytes());
        format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn stripe() -> StripeClient {
        StripeClient::new(&StripeConfig {
            secret_key: SecretString::from("sk_test"),
            webhook_secret: SecretString::from(SECRET),
            price_standard: "price_std".to_string(),
            price_premium: "price_prem".to_string(),
        })
    }

    fn event(event_type: &str, object: serde_json::Value) -> WebhookEvent {
        WebhookEvent {
            id: "evt_1".to_string(),
            event_type: event_type.to_string(),
            data: EventData { object },
        }
    }

    #[test]
    fn test_valid_signature_accepted() {
        let payload = r#"{"id":"evt_1","type":"ping"}"#;
        let header = sign(payload, NOW - 10);
        let secret = SecretString::from(SECRET);
        assert!(verify_signature(&header, payload.as_bytes(), &secret, NOW).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = sign(r#"{"amount":100}"#, NOW);
        let secret = SecretString::from(SECRET);
        let result = verify_signature(&header, br#"{"amount":999}"#, &secret, NOW);
        assert!(matches!(result, Err(StripeError::InvalidSignature(_))));
    }

    #[test]
    fn test_old_timestamp_rejected() {
        let payload = "{}";
        let header = sign(payload, NOW - SIGNATURE_TOLERANCE_SECS - 1);
        let secret = SecretString::from(SECRET);
        assert!(verify_signature(&header, payload.as_bytes(), &secret, NOW).is_err());
    }

    #[test]
    fn test_any_v1_may_match() {
        let payload = "{}";
        let valid = sign(payload, NOW);
        let header = format!("t={NOW},v1=deadbeef,{}", valid.split(',').nth(1).unwrap());
        let secret = SecretString::from(SECRET);
        assert!(verify_signature(&header, payload.as_bytes(), &secret, NOW).is_ok());
    }

    #[test]
    fn test_malformed_header_rejected() {
        let secret = SecretString::from(SECRET);
        assert!(verify_signature("v1=abc", b"{}", &secret, NOW).is_err());
        assert!(verify_signature(&format!("t={NOW}"), b"{}", &secret, NOW).is_err());
    }

    #[test]
    fn test_checkout_completed_sets_plan() {
        let store_id = StoreId::new_v4();
        let evt = event(
            "checkout.session.completed",
            serde_json::json!({
                "client_reference_id": store_id.to_string(),
                "customer": "cus_1",
                "subscription": "sub_1",
                "metadata": {"store_id": store_id.to_string(), "plan": "premium"}
            }),
        );

        let action = billing_action(&evt, &stripe()).unwrap().unwrap();
        assert_eq!(action.target, BillingTarget::Store(store_id));
        assert_eq!(action.update.plan, PlanTier::Premium);
        assert_eq!(action.update.stripe_subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(action.update.subscription_status, None);
    }

    #[test]
    fn test_subscription_updated_uses_price() {
        let evt = event(
            "customer.subscription.updated",
            serde_json::json!({
                "id": "sub_1",
                "customer": "cus_1",
                "status": "active",
                "items": {"data": [{"price": {"id": "price_std"}}]}
            }),
        );

        let action = billing_action(&evt, &stripe()).unwrap().unwrap();
        assert_eq!(action.target, BillingTarget::Subscription("sub_1".to_string()));
        assert_eq!(action.update.plan, PlanTier::Standard);
    }

    #[test]
    fn test_subscription_with_unknown_price_is_ignored() {
        let evt = event(
            "customer.subscription.updated",
            serde_json::json!({
                "id": "sub_1",
                "status": "active",
                "items": {"data": [{"price": {"id": "price_legacy"}}]}
            }),
        );
        assert!(billing_action(&evt, &stripe()).unwrap().is_none());
    }

    #[test]
    fn test_canceled_subscription_with_unknown_price_downgrades() {
        let evt = event(
            "customer.subscription.updated",
            serde_json::json!({
                "id": "sub_1",
                "status": "canceled",
                "items": {"data": [{"price": {"id": "price_legacy"}}]}
            }),
        );
        let action = billing_action(&evt, &stripe()).unwrap().unwrap();
        assert_eq!(action.update.plan, PlanTier::Free);
    }

    #[test]
    fn test_unpaid_subscription_downgrades() {
        let evt = event(
            "customer.subscription.updated",
            serde_json::json!({
                "id": "sub_1",
                "status": "unpaid",
                "items": {"data": [{"price": {"id": "price_prem"}}]}
            }),
        );
        let action = billing_action(&evt, &stripe()).unwrap().unwrap();
        assert_eq!(action.update.plan, PlanTier::Free);
        assert_eq!(action.update.subscription_status.as_deref(), Some("unpaid"));
    }

    #[test]
    fn test_subscription_deleted_downgrades_to_free() {
        let evt = event(
            "customer.subscription.deleted",
            serde_json::json!({"id": "sub_9", "status": "canceled"}),
        );
        let action = billing_action(&evt, &stripe()).unwrap().unwrap();
        assert_eq!(action.update.plan, PlanTier::Free);
        assert_eq!(action.update.subscription_status.as_deref(), Some("canceled"));
    }

    #[test]
    fn test_unhandled_event_is_ignored() {
        let evt = event("invoice.paid", serde_json::json!({}));
        assert!(billing_action(&evt, &stripe()).unwrap().is_none());
    }
}
