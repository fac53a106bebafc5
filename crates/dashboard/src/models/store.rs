//! Store domain types.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use winqer_core::{Email, OrganizationId, PlanTier, Platform, StoreId, StoreRole, UserId};

/// A business location with its linked platforms and billing state.
///
/// Platform credentials are never serialized; API responses only expose
/// whether a platform is connected.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub owner_user_id: Option<UserId>,
    pub organization_id: Option<OrganizationId>,
    pub meta_ad_account_id: Option<String>,
    pub ga4_property_id: Option<String>,
    pub gbp_location_id: Option<String>,
    #[serde(skip)]
    pub meta_access_token: Option<SecretString>,
    #[serde(skip)]
    pub google_refresh_token: Option<SecretString>,
    pub plan: PlanTier,
    pub stripe_customer_id: Option<String>,
    pub subscription_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    /// The external resource ID linked for `platform`, if any.
    #[must_use]
    pub fn linked_id(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Meta => self.meta_ad_account_id.as_deref(),
            Platform::Ga4 => self.ga4_property_id.as_deref(),
            Platform::Gbp => self.gbp_location_id.as_deref(),
        }
    }

    /// Whether the OAuth credential needed by `platform` is present.
    #[must_use]
    pub const fn has_credentials(&self, platform: Platform) -> bool {
        match platform {
            Platform::Meta => self.meta_access_token.is_some(),
            Platform::Ga4 | Platform::Gbp => self.google_refresh_token.is_some(),
        }
    }

    /// Platforms that have both a linked resource and a credential.
    #[must_use]
    pub fn connected_platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.linked_id(*p).is_some() && self.has_credentials(*p))
            .collect()
    }
}

/// A store as listed for a user, with the user's effective role.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSummary {
    pub id: StoreId,
    pub name: String,
    pub plan: PlanTier,
    pub role: StoreRole,
    pub connected_platforms: Vec<Platform>,
}

/// Parameters for onboarding a store.
#[derive(Debug, Clone)]
pub struct NewStore {
    pub name: String,
    pub owner_user_id: UserId,
    pub organization_id: Option<OrganizationId>,
}

/// Settings patch. `None` leaves a field unchanged; for linked IDs an empty
/// string unlinks the platform.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    pub name: Option<String>,
    pub meta_ad_account_id: Option<String>,
    pub ga4_property_id: Option<String>,
    pub gbp_location_id: Option<String>,
}

impl StoreSettings {
    /// Platforms whose linked resource this patch touches.
    #[must_use]
    pub fn touched_platforms(&self) -> Vec<Platform> {
        let mut touched = Vec::new();
        if self.meta_ad_account_id.is_some() {
            touched.push(Platform::Meta);
        }
        if self.ga4_property_id.is_some() {
            touched.push(Platform::Ga4);
        }
        if self.gbp_location_id.is_some() {
            touched.push(Platform::Gbp);
        }
        touched
    }
}

/// A member of a store, for the members settings page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMember {
    pub user_id: UserId,
    pub email: Email,
    pub display_name: Option<String>,
    pub role: StoreRole,
}

/// Billing state change applied from a Stripe event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingUpdate {
    pub plan: PlanTier,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub subscription_status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store {
            id: StoreId::new_v4(),
            name: "Harbor Bakery".to_string(),
            owner_user_id: Some(UserId::new_v4()),
            organization_id: None,
            meta_ad_account_id: Some("act_123".to_string()),
            ga4_property_id: Some("properties/42".to_string()),
            gbp_location_id: None,
            meta_access_token: Some(SecretString::from("EAAB-token")),
            google_refresh_token: None,
            plan: PlanTier::Free,
            stripe_customer_id: None,
            subscription_status: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_connected_platforms_need_id_and_credentials() {
        // GA4 is linked but has no Google token; GBP has neither.
        assert_eq!(store().connected_platforms(), vec![Platform::Meta]);
    }

    #[test]
    fn test_store_serialization_hides_tokens() {
        let json = serde_json::to_string(&store()).expect("serialize");
        assert!(json.contains("act_123"));
        assert!(!json.contains("EAAB-token"));
        assert!(!json.contains("metaAccessToken"));
    }

    #[test]
    fn test_settings_touched_platforms() {
        let patch = StoreSettings {
            ga4_property_id: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(patch.touched_platforms(), vec![Platform::Ga4]);
    }
}
