//! Store access management.

use winqer_core::{Email, StoreId, StoreRole};
use winqer_dashboard::db::{AssignmentRepository, ProfileRepository, StoreRepository};

use super::{CommandError, connect};

/// Give an existing user `role` on a store, replacing any previous role.
///
/// # Errors
///
/// Returns `CommandError::Invalid` for a malformed email, an unknown store,
/// or a user who has never signed in. Demoting the last admin fails with the
/// repository error.
pub async fn assign(store_id: StoreId, email: &str, role: StoreRole) -> Result<(), CommandError> {
    let email = Email::parse(email).map_err(|e| CommandError::Invalid(e.to_string()))?;
    let pool = connect().await?;

    let store = StoreRepository::new(&pool)
        .get(store_id)
        .await?
        .ok_or_else(|| CommandError::Invalid(format!("no store with id {store_id}")))?;

    let user = ProfileRepository::new(&pool)
        .get_by_email(&email)
        .await?
        .ok_or_else(|| {
            CommandError::Invalid(format!("{email} has not signed in to WINQER yet"))
        })?;

    AssignmentRepository::new(&pool)
        .set_role(user.id, store.id, Some(role))
        .await?;

    tracing::info!(
        store_id = %store.id,
        store = %store.name,
        user_id = %user.id,
        %email,
        %role,
        "Store role assigned"
    );
    Ok(())
}
