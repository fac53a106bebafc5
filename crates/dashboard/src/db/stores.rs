//! Store repository: onboarding, settings, platform credentials and billing.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use winqer_core::{OrganizationId, PlanTier, Platform, StoreId, StoreRole, UserId};

use super::RepositoryError;
use super::access::role_grants_cte;
use crate::models::{BillingUpdate, NewStore, Store, StoreSettings, StoreSummary};

const STORE_COLUMNS: &str = r"
    id, name, owner_user_id, organization_id,
    meta_ad_account_id, ga4_property_id, gbp_location_id,
    meta_access_token, google_refresh_token,
    plan, stripe_customer_id, subscription_status,
    created_at, updated_at
";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: StoreId,
    name: String,
    owner_user_id: Option<UserId>,
    organization_id: Option<OrganizationId>,
    meta_ad_account_id: Option<String>,
    ga4_property_id: Option<String>,
    gbp_location_id: Option<String>,
    meta_access_token: Option<String>,
    google_refresh_token: Option<String>,
    plan: PlanTier,
    stripe_customer_id: Option<String>,
    subscription_status: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StoreRow> for Store {
    fn from(row: StoreRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            owner_user_id: row.owner_user_id,
            organization_id: row.organization_id,
            meta_ad_account_id: row.meta_ad_account_id,
            ga4_property_id: row.ga4_property_id,
            gbp_location_id: row.gbp_location_id,
            meta_access_token: row.meta_access_token.map(SecretString::from),
            google_refresh_token: row.google_refresh_token.map(SecretString::from),
            plan: row.plan,
            stripe_customer_id: row.stripe_customer_id,
            subscription_status: row.subscription_status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StoreSummaryRow {
    #[sqlx(flatten)]
    store: StoreRow,
    role: StoreRole,
}

impl From<StoreSummaryRow> for StoreSummary {
    fn from(row: StoreSummaryRow) -> Self {
        let store = Store::from(row.store);
        Self {
            connected_platforms: store.connected_platforms(),
            id: store.id,
            name: store.name,
            plan: store.plan,
            role: row.role,
        }
    }
}

/// Empty strings unlink a platform.
fn normalize_linked_id(value: Option<&str>) -> Option<Option<String>> {
    value.map(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for store database operations.
pub struct StoreRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreRepository<'a> {
    /// Create a new store repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a store by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let sql = format!("SELECT {STORE_COLUMNS} FROM stores WHERE id = $1");
        let row = sqlx::query_as::<_, StoreRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Store::from))
    }

    /// Stores the user can see, with their effective role, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<StoreSummary>, RepositoryError> {
        let sql = format!(
            r"
            WITH {}
            SELECT {STORE_COLUMNS}, e.role
            FROM stores
            JOIN effective e ON e.store_id = stores.id
            ORDER BY name, id
            ",
            role_grants_cte()
        );

        let rows = sqlx::query_as::<_, StoreSummaryRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(StoreSummary::from).collect())
    }

    /// Create a store and make its creator a `STORE_ADMIN`, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the owner has no profile row or
    /// the organization does not exist.
    pub async fn create(&self, new: &NewStore) -> Result<Store, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r"
            INSERT INTO stores (name, owner_user_id, organization_id)
            VALUES ($1, $2, $3)
            RETURNING {STORE_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, StoreRow>(&sql)
            .bind(new.name.trim())
            .bind(new.owner_user_id)
            .bind(new.organization_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(RepositoryError::from_write)?;

        sqlx::query(
            r"
            INSERT INTO store_assignments (user_id, store_id, role)
            VALUES ($1, $2, 'STORE_ADMIN')
            ON CONFLICT (user_id, store_id) DO UPDATE SET role = EXCLUDED.role
            ",
        )
        .bind(new.owner_user_id)
        .bind(row.id)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from_write)?;

        tx.commit().await?;

        Ok(row.into())
    }

    /// Apply a settings patch.
    ///
    /// Returns the updated store and the platforms whose linked ID actually
    /// changed, so the caller can invalidate their cached metrics.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn update_settings(
        &self,
        id: StoreId,
        settings: &StoreSettings,
    ) -> Result<(Store, Vec<Platform>), RepositoryError> {
        let before = self.get(id).await?.ok_or(RepositoryError::NotFound)?;

        let meta = normalize_linked_id(settings.meta_ad_account_id.as_deref());
        let ga4 = normalize_linked_id(settings.ga4_property_id.as_deref());
        let gbp = normalize_linked_id(settings.gbp_location_id.as_deref());

        // $n IS TRUE => overwrite (possibly with NULL); otherwise keep.
        let sql = format!(
            r"
            UPDATE stores SET
                name = COALESCE($2, name),
                meta_ad_account_id = CASE WHEN $3 THEN $4 ELSE meta_ad_account_id END,
                ga4_property_id = CASE WHEN $5 THEN $6 ELSE ga4_property_id END,
                gbp_location_id = CASE WHEN $7 THEN $8 ELSE gbp_location_id END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {STORE_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, StoreRow>(&sql)
            .bind(id)
            .bind(settings.name.as_deref().map(str::trim).filter(|n| !n.is_empty()))
            .bind(meta.is_some())
            .bind(meta.flatten())
            .bind(ga4.is_some())
            .bind(ga4.flatten())
            .bind(gbp.is_some())
            .bind(gbp.flatten())
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let after = Store::from(row);
        let changed = Platform::ALL
            .into_iter()
            .filter(|p| before.linked_id(*p) != after.linked_id(*p))
            .collect();

        Ok((after, changed))
    }

    /// Store the long-lived Meta user token for a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn set_meta_token(
        &self,
        id: StoreId,
        token: &SecretString,
    ) -> Result<(), RepositoryError> {
        self.set_credential(id, "meta_access_token", token).await
    }

    /// Store the Google refresh token (GA4 and Business Profile share it).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn set_google_refresh_token(
        &self,
        id: StoreId,
        token: &SecretString,
    ) -> Result<(), RepositoryError> {
        self.set_credential(id, "google_refresh_token", token).await
    }

    async fn set_credential(
        &self,
        id: StoreId,
        column: &'static str,
        token: &SecretString,
    ) -> Result<(), RepositoryError> {
        let sql = format!("UPDATE stores SET {column} = $2, updated_at = NOW() WHERE id = $1");
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(token.expose_secret())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Apply a billing change to a store.
    ///
    /// Customer and subscription IDs are only overwritten when present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn apply_billing(
        &self,
        id: StoreId,
        update: &BillingUpdate,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE stores SET
                plan = $2,
                stripe_customer_id = COALESCE($3, stripe_customer_id),
                stripe_subscription_id = COALESCE($4, stripe_subscription_id),
                subscription_status = COALESCE($5, subscription_status),
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(update.plan)
        .bind(update.stripe_customer_id.as_deref())
        .bind(update.stripe_subscription_id.as_deref())
        .bind(update.subscription_status.as_deref())
        .execute(self.pool)
        .await
        .map_err(RepositoryError::from_write)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Find the store billed to a Stripe customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_customer(&self, customer_id: &str) -> Result<Option<Store>, RepositoryError> {
        let sql = format!(
            "SELECT {STORE_COLUMNS} FROM stores WHERE stripe_customer_id = $1 ORDER BY created_at LIMIT 1"
        );
        let row = sqlx::query_as::<_, StoreRow>(&sql)
            .bind(customer_id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Store::from))
    }

    /// Find the store billed by a Stripe subscription.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Store>, RepositoryError> {
        let sql = format!("SELECT {STORE_COLUMNS} FROM stores WHERE stripe_subscription_id = $1");
        let row = sqlx::query_as::<_, StoreRow>(&sql)
            .bind(subscription_id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Store::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_linked_id() {
        assert_eq!(normalize_linked_id(None), None);
        assert_eq!(normalize_linked_id(Some("  ")), Some(None));
        assert_eq!(
            normalize_linked_id(Some(" act_9 ")),
            Some(Some("act_9".to_string()))
        );
    }
}
