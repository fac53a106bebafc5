//! Store assignment repository (per-store membership and role).

use sqlx::PgPool;

use winqer_core::{Email, StoreId, StoreRole, UserId};

use super::RepositoryError;
use crate::models::StoreMember;

#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    user_id: UserId,
    email: String,
    display_name: Option<String>,
    role: StoreRole,
}

impl TryFrom<MemberRow> for StoreMember {
    type Error = RepositoryError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            user_id: row.user_id,
            email,
            display_name: row.display_name,
            role: row.role,
        })
    }
}

/// Repository for `store_assignments`.
pub struct AssignmentRepository<'a> {
    pool: &'a PgPool,
}

/// Whether a store still has an admin after `user`'s role becomes `new_role`.
///
/// `roles` is every assignment on the store; `None` removes the user.
fn admin_remains(
    roles: &[(UserId, StoreRole)],
    user: UserId,
    new_role: Option<StoreRole>,
) -> bool {
    roles
        .iter()
        .filter(|(id, _)| *id != user)
        .map(|(_, role)| *role)
        .chain(new_role)
        .any(|role| role == StoreRole::StoreAdmin)
}

impl<'a> AssignmentRepository<'a> {
    /// Create a new assignment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Members explicitly assigned to a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored email is invalid.
    pub async fn list_members(&self, store_id: StoreId) -> Result<Vec<StoreMember>, RepositoryError> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r"
            SELECT a.user_id, p.email, p.display_name, a.role
            FROM store_assignments a
            JOIN user_profiles p ON p.id = a.user_id
            WHERE a.store_id = $1
            ORDER BY a.role, p.email
            ",
        )
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Change a user's role on a store (`None` removes the assignment),
    /// refusing changes that would leave the store without a `STORE_ADMIN`.
    ///
    /// The store's assignments are locked for the check and the write.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::LastAdmin` if the last admin would be lost.
    /// Returns `RepositoryError::NotFound` when removing a missing assignment.
    /// Returns `RepositoryError::Conflict` if the user or store does not exist.
    pub async fn set_role(
        &self,
        user_id: UserId,
        store_id: StoreId,
        role: Option<StoreRole>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let roles = sqlx::query_as::<_, (UserId, StoreRole)>(
            "SELECT user_id, role FROM store_assignments WHERE store_id = $1 FOR UPDATE",
        )
        .bind(store_id)
        .fetch_all(&mut *tx)
        .await?;

        let had_admin = roles.iter().any(|(_, r)| *r == StoreRole::StoreAdmin);
        if had_admin && !admin_remains(&roles, user_id, role) {
            return Err(RepositoryError::LastAdmin);
        }

        if let Some(role) = role {
            sqlx::query(
                r"
                INSERT INTO store_assignments (user_id, store_id, role)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id, store_id) DO UPDATE SET role = EXCLUDED.role
                ",
            )
            .bind(user_id)
            .bind(store_id)
            .bind(role)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from_write)?;
        } else {
            let result =
                sqlx::query("DELETE FROM store_assignments WHERE user_id = $1 AND store_id = $2")
                    .bind(user_id)
                    .bind(store_id)
                    .execute(&mut *tx)
                    .await?;
            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }
        }

        tx.commit().await?;
        Ok(())
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_admin_cannot_be_removed_or_demoted() {
        let admin = UserId::new_v4();
        let viewer = UserId::new_v4();
        let roles = [(admin, StoreRole::StoreAdmin), (viewer, StoreRole::StoreViewer)];

        assert!(!admin_remains(&roles, admin, None));
        assert!(!admin_remains(&roles, admin, Some(StoreRole::StoreViewer)));
        assert!(admin_remains(&roles, admin, Some(StoreRole::StoreAdmin)));
        assert!(admin_remains(&roles, viewer, None));
    }

    #[test]
    fn test_second_admin_can_step_down() {
        let first = UserId::new_v4();
        let second = UserId::new_v4();
        let roles = [(first, StoreRole::StoreAdmin), (second, StoreRole::StoreAdmin)];

        assert!(admin_remains(&roles, second, None));
        assert!(admin_remains(&roles, first, Some(StoreRole::StoreViewer)));
    }

    #[test]
    fn test_promoting_a_newcomer_keeps_an_admin() {
        let admin = UserId::new_v4();
        let roles = [(admin, StoreRole::StoreAdmin)];

        assert!(admin_remains(&roles, UserId::new_v4(), Some(StoreRole::StoreAdmin)));
        assert!(admin_remains(&roles, UserId::new_v4(), Some(StoreRole::StoreViewer)));
    }
}
