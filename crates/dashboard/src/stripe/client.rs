//! Stripe API client (Checkout only).

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use winqer_core::{PlanTier, StoreId};

use super::StripeError;
use crate::config::StripeConfig;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// A created Checkout Session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted payment page.
    pub url: String,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: SecretString,
    webhook_secret: SecretString,
    price_standard: String,
    price_premium: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("price_standard", &self.price_standard)
            .field("price_premium", &self.price_premium)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a new Stripe client.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
            price_standard: config.price_standard.clone(),
            price_premium: config.price_premium.clone(),
        }
    }

    /// Webhook endpoint signing secret.
    #[must_use]
    pub fn webhook_secret(&self) -> &SecretString {
        &self.webhook_secret
    }

    /// Stripe price ID for a paid plan.
    #[must_use]
    pub fn price_for(&self, plan: PlanTier) -> Option<&str> {
        match plan {
            PlanTier::Free => None,
            PlanTier::Standard => Some(&self.price_standard),
            PlanTier::Premium => Some(&self.price_premium),
        }
    }

    /// Plan sold under a Stripe price ID.
    #[must_use]
    pub fn plan_for_price(&self, price_id: &str) -> Option<PlanTier> {
        if price_id == self.price_standard {
            Some(PlanTier::Standard)
        } else if price_id == self.price_premium {
            Some(PlanTier::Premium)
        } else {
            None
        }
    }

    fn checkout_form(
        &self,
        store_id: StoreId,
        plan: PlanTier,
        customer_id: Option<&str>,
        customer_email: Option<&str>,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<Vec<(&'static str, String)>, StripeError> {
        let price = self
            .price_for(plan)
            .ok_or(StripeError::UnpurchasablePlan(plan))?;
        let store = store_id.to_string();

        let mut form = vec![
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", price.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", success_url.to_string()),
            ("cancel_url", cancel_url.to_string()),
            ("client_reference_id", store.clone()),
            ("metadata[store_id]", store.clone()),
            ("metadata[plan]", plan.to_string()),
            ("subscription_data[metadata][store_id]", store),
            ("subscription_data[metadata][plan]", plan.to_string()),
        ];
        match (customer_id, customer_email) {
            (Some(customer), _) => form.push(("customer", customer.to_string())),
            (None, Some(email)) => form.push(("customer_email", email.to_string())),
            (None, None) => {}
        }
        Ok(form)
    }

    /// Create a subscription Checkout Session for a store.
    ///
    /// The store ID travels as `client_reference_id` and in the session and
    /// subscription metadata, so every later webhook can find the store.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::UnpurchasablePlan` for the free plan, or an API error.
    #[instrument(skip(self, customer_email, success_url, cancel_url), fields(store_id = %store_id, plan = %plan))]
    pub async fn create_checkout_session(
        &self,
        store_id: StoreId,
        plan: PlanTier,
        customer_id: Option<&str>,
        customer_email: Option<&str>,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let form = self.checkout_form(
            store_id,
            plan,
            customer_id,
            customer_email,
            success_url,
            cancel_url,
        )?;

        let response = self
            .client
            .post(format!("{STRIPE_API_BASE}/checkout/sessions"))
            .bearer_auth(self.secret_key.expose_secret())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let session: CheckoutSession = serde_json::from_str(&body)
            .map_err(|e| StripeError::InvalidPayload(format!("checkout session: {e}")))?;
        debug!(session_id = %session.id, "Created Stripe Checkout Session");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> StripeClient {
        StripeClient::new(&StripeConfig {
            secret_key: SecretString::from("sk_test_abc"),
            webhook_secret: SecretString::from("whsec_test"),
            price_standard: "price_std".to_string(),
            price_premium: "price_prem".to_string(),
        })
    }

    #[test]
    fn test_price_plan_mapping() {
        let client = client();
        assert_eq!(client.price_for(PlanTier::Premium), Some("price_prem"));
        assert_eq!(client.price_for(PlanTier::Free), None);
        assert_eq!(client.plan_for_price("price_std"), Some(PlanTier::Standard));
        assert_eq!(client.plan_for_price("price_other"), None);
    }

    #[test]
    fn test_checkout_form_carries_store() {
        let store_id = StoreId::new_v4();
        let form = client()
            .checkout_form(
                store_id,
                PlanTier::Standard,
                None,
                Some("owner@bakery.test"),
                "https://app.winqer.test/ok",
                "https://app.winqer.test/cancel",
            )
            .expect("form");

        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("mode"), Some("subscription"));
        assert_eq!(get("line_items[0][price]"), Some("price_std"));
        assert_eq!(get("client_reference_id"), Some(store_id.to_string().as_str()));
        assert_eq!(get("metadata[plan]"), Some("standard"));
        assert_eq!(get("customer_email"), Some("owner@bakery.test"));
        assert_eq!(get("customer"), None);
    }

    #[test]
    fn test_free_plan_is_not_purchasable() {
        let err = client()
            .checkout_form(StoreId::new_v4(), PlanTier::Free, None, None, "a", "b")
            .expect_err("free plan");
        assert!(matches!(err, StripeError::UnpurchasablePlan(PlanTier::Free)));
    }
}
