//! User profiles mirrored from Supabase Auth.

use sqlx::PgPool;

use winqer_core::{Email, UserId};

use super::RepositoryError;
use crate::models::CurrentUser;

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: UserId,
    email: String,
    display_name: Option<String>,
}

impl TryFrom<ProfileRow> for CurrentUser {
    type Error = RepositoryError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            email,
            display_name: row.display_name,
        })
    }
}

/// Repository for `user_profiles`.
pub struct ProfileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert or refresh the profile for a signed-in user.
    ///
    /// Called on every sign-in so later email changes in Supabase propagate.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if another profile already uses the email.
    pub async fn upsert(&self, user: &CurrentUser) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO user_profiles (id, email, display_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                display_name = COALESCE(EXCLUDED.display_name, user_profiles.display_name),
                updated_at = NOW()
            ",
        )
        .bind(user.id)
        .bind(user.email.as_str())
        .bind(user.display_name.as_deref())
        .execute(self.pool)
        .await
        .map_err(RepositoryError::from_write)?;

        Ok(())
    }

    /// Find a profile by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<CurrentUser>, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, email, display_name FROM user_profiles WHERE email = $1",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}
