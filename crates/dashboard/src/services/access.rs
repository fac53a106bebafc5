//! Store-level role checks.
//!
//! Viewing a store needs `STORE_VIEWER`; settings, billing, member
//! management and creative generation need `STORE_ADMIN`.

use sqlx::PgPool;
use tracing::debug;

use winqer_core::{StoreId, StoreRole};

use crate::db::{AccessRepository, StoreRepository};
use crate::error::AppError;
use crate::models::{CurrentUser, Store};

/// Compare a looked-up role with the required one.
///
/// # Errors
///
/// Returns `AppError::Forbidden` when there is no role or it is too weak.
pub fn check_role(found: Option<StoreRole>, minimum: StoreRole) -> Result<StoreRole, AppError> {
    match found {
        Some(role) if role.satisfies(minimum) => Ok(role),
        Some(_) => Err(AppError::Forbidden(format!("{minimum} role required"))),
        None => Err(AppError::Forbidden("no access to this store".to_string())),
    }
}

/// Require the user to hold at least `minimum` on the store.
///
/// Stores the user cannot see answer `Forbidden`, whether or not they exist.
///
/// # Errors
///
/// Returns `AppError::Forbidden` if the role is missing or insufficient.
pub async fn require_store_role(
    pool: &PgPool,
    user: &CurrentUser,
    store_id: StoreId,
    minimum: StoreRole,
) -> Result<StoreRole, AppError> {
    let found = AccessRepository::new(pool)
        .find_store_role(user.id, store_id)
        .await?;

    let result = check_role(found, minimum);
    if result.is_err() {
        debug!(user_id = %user.id, %store_id, ?found, %minimum, "Store access denied");
    }
    result
}

/// Role check followed by loading the store row.
///
/// # Errors
///
/// Returns `AppError::Forbidden` on insufficient role, `AppError::NotFound`
/// if the store vanished between the two queries.
pub async fn load_store_for(
    pool: &PgPool,
    user: &CurrentUser,
    store_id: StoreId,
    minimum: StoreRole,
) -> Result<(Store, StoreRole), AppError> {
    let role = require_store_role(pool, user, store_id, minimum).await?;
    let store = StoreRepository::new(pool)
        .get(store_id)
        .await?
        .ok_or_else(|| AppError::NotFound("store".to_string()))?;
    Ok((store, role))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_role_is_forbidden() {
        assert!(matches!(
            check_role(None, StoreRole::StoreViewer),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_viewer_cannot_mutate() {
        assert!(matches!(
            check_role(Some(StoreRole::StoreViewer), StoreRole::StoreAdmin),
            Err(AppError::Forbidden(msg)) if msg.contains("STORE_ADMIN")
        ));
        assert_eq!(
            check_role(Some(StoreRole::StoreViewer), StoreRole::StoreViewer).ok(),
            Some(StoreRole::StoreViewer)
        );
    }

    #[test]
    fn test_admin_can_view_and_mutate() {
        assert!(check_role(Some(StoreRole::StoreAdmin), StoreRole::StoreViewer).is_ok());
        assert!(check_role(Some(StoreRole::StoreAdmin), StoreRole::StoreAdmin).is_ok());
    }
}
