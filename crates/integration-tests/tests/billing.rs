//! Stripe webhook signatures and event interpretation.

use hmac::{Hmac, Mac};
use secrecy::SecretString;
use sha2::Sha256;

use winqer_core::{PlanTier, StoreId};
use winqer_dashboard::stripe::{
    BillingTarget, SIGNATURE_TOLERANCE_SECS, StripeClient, WebhookEvent, billing_action,
    verify_signature,
};
use winqer_integration_tests::{WEBHOOK_SECRET, stripe_config};

const NOW: i64 = 1_777_000_000;

fn sign(payload: &[u8], ts: i64, secret: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac key");
    mac.update(format!("{ts}.").as_bytes());
    mac.update(payload);
    format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
}

fn secret() -> SecretString {
    SecretString::from(WEBHOOK_SECRET)
}

fn parse(payload: &str) -> WebhookEvent {
    serde_json::from_str(payload).expect("event json")
}

// =============================================================================
// Signatures
// =============================================================================

#[test]
fn test_valid_signature_is_accepted() {
    let payload = br#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;
    let header = sign(payload, NOW, WEBHOOK_SECRET);
    assert!(verify_signature(&header, payload, &secret(), NOW).is_ok());
}

#[test]
fn test_tampered_body_is_rejected() {
    let payload = br#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;
    let header = sign(payload, NOW, WEBHOOK_SECRET);
    let tampered = br#"{"id":"evt_2","type":"invoice.paid","data":{"object":{}}}"#;
    assert!(verify_signature(&header, tampered, &secret(), NOW).is_err());
}

#[test]
fn test_old_signature_is_rejected() {
    let payload = b"{}";
    let ts = NOW - SIGNATURE_TOLERANCE_SECS - 1;
    let header = sign(payload, ts, WEBHOOK_SECRET);
    assert!(verify_signature(&header, payload, &secret(), NOW).is_err());

    let edge = sign(payload, NOW - SIGNATURE_TOLERANCE_SECS, WEBHOOK_SECRET);
    assert!(verify_signature(&edge, payload, &secret(), NOW).is_ok());
}

#[test]
fn test_wrong_secret_is_rejected() {
    let payload = b"{}";
    let header = sign(payload, NOW, "whsec_someone_else");
    assert!(verify_signature(&header, payload, &secret(), NOW).is_err());
}

#[test]
fn test_any_v1_entry_may_match() {
    let payload = b"{}";
    let good = sign(payload, NOW, WEBHOOK_SECRET);
    let good_sig = good.split("v1=").nth(1).expect("v1");
    let header = format!("t={NOW},v1={},v1={good_sig}", "0".repeat(64));
    assert!(verify_signature(&header, payload, &secret(), NOW).is_ok());
}

// =============================================================================
// Events
// =============================================================================

#[test]
fn test_checkout_completed_upgrades_store() {
    let stripe = StripeClient::new(&stripe_config());
    let store_id = StoreId::new_v4();
    let event = parse(&format!(
        r#"{{
            "id": "evt_checkout",
            "type": "checkout.session.completed",
            "data": {{"object": {{
                "client_reference_id": "{store_id}",
                "customer": "cus_123",
                "subscription": "sub_123",
                "metadata": {{"store_id": "{store_id}", "plan": "premium"}}
            }}}}
        }}"#
    ));

    let action = billing_action(&event, &stripe)
        .expect("valid event")
        .expect("handled event");
    assert_eq!(action.target, BillingTarget::Store(store_id));
    assert_eq!(action.update.plan, PlanTier::Premium);
    assert_eq!(action.update.stripe_customer_id.as_deref(), Some("cus_123"));
    assert_eq!(action.update.stripe_subscription_id.as_deref(), Some("sub_123"));
    assert_eq!(action.update.subscription_status, None);
}

#[test]
fn test_subscription_deleted_downgrades_to_free() {
    let stripe = StripeClient::new(&stripe_config());
    let event = parse(
        r#"{
            "id": "evt_deleted",
            "type": "customer.subscription.deleted",
            "data": {"object": {"id": "sub_999", "customer": "cus_9", "status": "canceled"}}
        }"#,
    );

    let action = billing_action(&event, &stripe)
        .expect("valid event")
        .expect("handled event");
    assert_eq!(action.target, BillingTarget::Subscription("sub_999".to_string()));
    assert_eq!(action.update.plan, PlanTier::Free);
    assert_eq!(action.update.subscription_status.as_deref(), Some("canceled"));
}

#[test]
fn test_unpaid_subscription_update_drops_plan() {
    let stripe = StripeClient::new(&stripe_config());
    let event = parse(
        r#"{
            "id": "evt_updated",
            "type": "customer.subscription.updated",
            "data": {"object": {
                "id": "sub_1",
                "status": "unpaid",
                "items": {"data": [{"price": {"id": "price_standard_test"}}]}
            }}
        }"#,
    );

    let action = billing_action(&event, &stripe)
        .expect("valid event")
        .expect("handled event");
    assert_eq!(action.update.plan, PlanTier::Free);
    assert_eq!(action.update.subscription_status.as_deref(), Some("unpaid"));
}

#[test]
fn test_paid_subscription_with_unknown_price_is_skipped() {
    let stripe = StripeClient::new(&stripe_config());
    let event = parse(
        r#"{
            "id": "evt_updated",
            "type": "customer.subscription.updated",
            "data": {"object": {
                "id": "sub_1",
                "status": "active",
                "items": {"data": [{"price": {"id": "price_retired"}}]}
            }}
        }"#,
    );
    assert!(billing_action(&event, &stripe).expect("valid event").is_none());
}

#[test]
fn test_unrelated_events_are_ignored() {
    let stripe = StripeClient::new(&stripe_config());
    let event = parse(r#"{"id":"evt_x","type":"invoice.paid","data":{"object":{}}}"#);
    assert!(billing_action(&event, &stripe).expect("valid").is_none());
}
