//! Store onboarding, settings and membership.

use axum::{
    Router,
    extract::State,
    routing::{delete, get},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use winqer_core::{Email, StoreId, StoreRole, UserId};

use crate::db::{AnalyticsCacheRepository, AssignmentRepository, ProfileRepository, StoreRepository};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{CurrentUser, NewStore, Store, StoreMember, StoreSettings, StoreSummary};
use crate::services::load_store_for;
use crate::state::AppState;

use super::extract::{Json, Path};
use super::{ApiResponse, ApiResult};

const MAX_STORE_NAME_CHARS: usize = 100;

/// Build the stores router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/stores", get(list_stores).post(create_store))
        .route("/api/stores/{id}", get(get_store).patch(update_store))
        .route(
            "/api/stores/{id}/members",
            get(list_members).post(assign_member),
        )
        .route("/api/stores/{id}/members/{user_id}", delete(remove_member))
}

/// A store with the caller's role on it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDetail {
    #[serde(flatten)]
    pub store: Store,
    pub role: StoreRole,
}

/// GET /api/stores
async fn list_stores(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> ApiResult<Vec<StoreSummary>> {
    let stores = StoreRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(ApiResponse::ok(stores))
}

#[derive(Debug, Deserialize)]
pub struct CreateStoreRequest {
    pub name: String,
}

fn validate_store_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("store name is required".to_string()));
    }
    if name.chars().count() > MAX_STORE_NAME_CHARS {
        return Err(AppError::BadRequest(format!(
            "store name must be at most {MAX_STORE_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

/// Onboarding: the creator becomes owner and `STORE_ADMIN`.
///
/// POST /api/stores
async fn create_store(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<CreateStoreRequest>,
) -> ApiResult<StoreDetail> {
    let name = validate_store_name(&body.name)?;

    // Bearer-token users may not have signed in through us yet.
    ProfileRepository::new(state.pool()).upsert(&user).await?;

    let store = StoreRepository::new(state.pool())
        .create(&NewStore {
            name,
            owner_user_id: user.id,
            organization_id: None,
        })
        .await?;

    info!(store_id = %store.id, user_id = %user.id, "Store created");

    Ok(ApiResponse::ok(StoreDetail {
        store,
        role: StoreRole::StoreAdmin,
    }))
}

/// GET /api/stores/{id}
async fn get_store(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<StoreId>,
) -> ApiResult<StoreDetail> {
    let (store, role) = load_store_for(state.pool(), &user, id, StoreRole::StoreViewer).await?;
    Ok(ApiResponse::ok(StoreDetail { store, role }))
}

/// Update name and linked platform IDs.
///
/// Cached metrics of every platform whose linked ID changed are dropped.
///
/// PATCH /api/stores/{id}
async fn update_store(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<StoreId>,
    Json(settings): Json<StoreSettings>,
) -> ApiResult<StoreDetail> {
    let (_, role) = load_store_for(state.pool(), &user, id, StoreRole::StoreAdmin).await?;
    if let Some(name) = &settings.name {
        validate_store_name(name)?;
    }

    let (store, changed) = StoreRepository::new(state.pool())
        .update_settings(id, &settings)
        .await?;

    let cache = AnalyticsCacheRepository::new(state.pool());
    for platform in changed {
        let removed = cache.invalidate(id, platform).await?;
        info!(store_id = %id, %platform, removed, "Linked ID changed, cache invalidated");
    }

    Ok(ApiResponse::ok(StoreDetail { store, role }))
}

/// GET /api/stores/{id}/members
async fn list_members(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<StoreId>,
) -> ApiResult<Vec<StoreMember>> {
    load_store_for(state.pool(), &user, id, StoreRole::StoreAdmin).await?;
    let members = AssignmentRepository::new(state.pool())
        .list_members(id)
        .await?;
    Ok(ApiResponse::ok(members))
}

#[derive(Debug, Deserialize)]
pub struct AssignMemberRequest {
    pub email: String,
    pub role: StoreRole,
}

/// Assign a role to an existing user by email.
///
/// The user must have signed in at least once.
///
/// POST /api/stores/{id}/members
async fn assign_member(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<StoreId>,
    Json(body): Json<AssignMemberRequest>,
) -> ApiResult<Vec<StoreMember>> {
    load_store_for(state.pool(), &user, id, StoreRole::StoreAdmin).await?;

    let email = Email::parse(&body.email).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let member: CurrentUser = ProfileRepository::new(state.pool())
        .get_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("no user with that email".to_string()))?;

    let assignments = AssignmentRepository::new(state.pool());
    assignments.set_role(member.id, id, Some(body.role)).await?;
    info!(store_id = %id, member_id = %member.id, role = %body.role, by = %user.id, "Member assigned");

    Ok(ApiResponse::ok(assignments.list_members(id).await?))
}

/// DELETE /api/stores/{id}/members/{user_id}
async fn remove_member(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path((id, member_id)): Path<(StoreId, UserId)>,
) -> ApiResult<Vec<StoreMember>> {
    load_store_for(state.pool(), &user, id, StoreRole::StoreAdmin).await?;

    let assignments = AssignmentRepository::new(state.pool());
    assignments.set_role(member_id, id, None).await?;
    info!(store_id = %id, %member_id, by = %user.id, "Member removed");

    Ok(ApiResponse::ok(assignments.list_members(id).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_store_name_validation() {
        assert_eq!(validate_store_name("  Harbor Bakery ").unwrap(), "Harbor Bakery");
        assert!(validate_store_name("   ").is_err());
        assert!(validate_store_name(&"x".repeat(MAX_STORE_NAME_CHARS + 1)).is_err());
    }
}
