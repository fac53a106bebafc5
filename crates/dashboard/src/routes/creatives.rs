//! AI ad creative generation.

use axum::{
    Router,
    extract::State,
    routing::post,
};

use winqer_core::{StoreId, StoreRole};

use crate::ai::CreativeRequest;
use crate::middleware::RequireAuth;
use crate::services::{CreativeResponse, generate_creatives, load_store_for};
use crate::state::AppState;

use super::extract::{Json, Path};
use super::{ApiResponse, ApiResult};

/// Build the creatives router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/stores/{id}/creatives", post(generate))
}

/// Generate ad copy variants for the store.
///
/// Requires `STORE_ADMIN` and a paid plan.
///
/// POST /api/stores/{id}/creatives
async fn generate(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<StoreId>,
    Json(request): Json<CreativeRequest>,
) -> ApiResult<CreativeResponse> {
    let (store, _) = load_store_for(state.pool(), &user, id, StoreRole::StoreAdmin).await?;
    let response = generate_creatives(&state, &store, &request).await?;
    Ok(ApiResponse::ok(response))
}
