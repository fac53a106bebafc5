//! Effective store role resolution.
//!
//! A user's role on a store is the strongest of:
//! - `STORE_ADMIN` when they are the store's `owner_user_id`
//! - their row in `store_assignments`
//! - the role implied by their membership in the owning organization
//!   (`OWNER` implies `STORE_ADMIN`, `MEMBER` implies `STORE_VIEWER`)
//!
//! The `store_role` enum is declared `STORE_ADMIN` first, so `MIN(role)`
//! picks the strongest grant.

use std::sync::LazyLock;

use sqlx::PgPool;

use winqer_core::{OrgRole, StoreId, StoreRole, UserId};

use super::RepositoryError;

/// `CASE` turning `organization_members.role` (alias `m`) into the implied
/// store role, built from [`OrgRole::implied_store_role`].
fn org_role_case() -> String {
    let arms: String = OrgRole::ALL
        .iter()
        .map(|role| {
            format!(
                " WHEN '{}' THEN '{}'::store_role",
                role.as_str(),
                role.implied_store_role()
            )
        })
        .collect();
    format!("CASE m.role{arms} END")
}

static ROLE_GRANTS_CTE: LazyLock<String> = LazyLock::new(|| {
    format!(
        r"
    grants AS (
        SELECT s.id AS store_id, 'STORE_ADMIN'::store_role AS role
        FROM stores s
        WHERE s.owner_user_id = $1
        UNION ALL
        SELECT a.store_id, a.role
        FROM store_assignments a
        WHERE a.user_id = $1
        UNION ALL
        SELECT s.id, {}
        FROM stores s
        JOIN organization_members m ON m.organization_id = s.organization_id
        WHERE m.user_id = $1
    ),
    effective AS (
        SELECT store_id, MIN(role) AS role
        FROM grants
        GROUP BY store_id
    )
",
        org_role_case()
    )
});

/// Every `(store_id, role)` grant for user `$1`, as `grants` and the
/// strongest per store as `effective`.
pub(crate) fn role_grants_cte() -> &'static str {
    &ROLE_GRANTS_CTE
}

/// Looks up effective roles.
pub struct AccessRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AccessRepository<'a> {
    /// Create a new access repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's effective role on the store, or `None` if they have no access.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_store_role(
        &self,
        user_id: UserId,
        store_id: StoreId,
    ) -> Result<Option<StoreRole>, RepositoryError> {
        let sql = format!(
            "WITH {} SELECT role FROM effective WHERE store_id = $2",
            role_grants_cte()
        );

        let role = sqlx::query_scalar::<_, StoreRole>(&sql)
            .bind(user_id)
            .bind(store_id)
            .fetch_optional(self.pool)
            .await?;

        Ok(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_org_roles_map_in_sql_like_in_rust() {
        let case = org_role_case();
        assert_eq!(
            case,
            "CASE m.role WHEN 'OWNER' THEN 'STORE_ADMIN'::store_role \
             WHEN 'MEMBER' THEN 'STORE_VIEWER'::store_role END"
        );
        for role in OrgRole::ALL {
            let arm = format!("WHEN '{}' THEN '{}'::store_role", role.as_str(), role.implied_store_role());
            assert!(role_grants_cte().contains(&arm), "missing {arm}");
        }
    }
}
