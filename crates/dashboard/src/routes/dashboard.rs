//! Store analytics dashboard.

use axum::{
    Router,
    extract::State,
    routing::get,
};

use winqer_core::{StoreId, StoreRole};

use crate::middleware::RequireAuth;
use crate::services::{DashboardReport, load_store_for, store_dashboard};
use crate::state::AppState;

use super::extract::{Path, Query};
use super::{ApiResponse, ApiResult, RangeQuery};

/// Build the dashboard router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/stores/{id}/dashboard", get(show))
}

/// Meta, GA4 and Business Profile metrics for a range.
///
/// Platforms that are not connected or fail to load are reported per
/// platform; the request itself still succeeds.
///
/// GET /api/stores/{id}/dashboard?range=30d
/// GET /api/stores/{id}/dashboard?start=2026-04-01&end=2026-04-30
async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<StoreId>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<DashboardReport> {
    let range = query.resolve()?;
    let (store, _) = load_store_for(state.pool(), &user, id, StoreRole::StoreViewer).await?;
    let report = store_dashboard(&state, &store, &range).await;
    Ok(ApiResponse::ok(report))
}
