//! Meta Ads: connection, account discovery and scored ads.

use axum::{
    Router,
    extract::State,
    response::Redirect,
    routing::get,
};
use tower_sessions::Session;
use tracing::{info, warn};

use winqer_core::{StoreId, StoreRole};

use crate::db::StoreRepository;
use crate::error::AppError;
use crate::meta::{AdAccount, ScoredAd};
use crate::middleware::RequireAuth;
use crate::models::OAuthProvider;
use crate::services::{load_store_for, store_ads};
use crate::state::AppState;

use super::extract::{Path, Query};
use super::oauth::{self, ConnectCallbackQuery};
use super::{ApiResponse, ApiResult, RangeQuery};

const CALLBACK_PATH: &str = "/meta/callback";

/// Build the Meta router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/stores/{id}/meta/ads", get(ads))
        .route("/api/stores/{id}/meta/accounts", get(accounts))
        .route("/api/stores/{id}/meta/connect", get(connect))
        .route(CALLBACK_PATH, get(callback))
}

/// Per-ad results scored and sorted best first.
///
/// GET /api/stores/{id}/meta/ads?range=30d
async fn ads(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<StoreId>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Vec<ScoredAd>> {
    let range = query.resolve()?;
    let (store, _) = load_store_for(state.pool(), &user, id, StoreRole::StoreViewer).await?;
    Ok(ApiResponse::ok(store_ads(&state, &store, &range).await?))
}

/// Ad accounts the connected Meta user can read.
///
/// GET /api/stores/{id}/meta/accounts
async fn accounts(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<StoreId>,
) -> ApiResult<Vec<AdAccount>> {
    let client = state.require_meta()?;
    let (store, _) = load_store_for(state.pool(), &user, id, StoreRole::StoreAdmin).await?;
    let token = store
        .meta_access_token
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("Meta is not connected".to_string()))?;

    Ok(ApiResponse::ok(client.list_ad_accounts(token).await?))
}

/// Redirect to Facebook Login.
///
/// GET /api/stores/{id}/meta/connect
async fn connect(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<StoreId>,
) -> Result<Redirect, AppError> {
    let client = state.require_meta()?;
    load_store_for(state.pool(), &user, id, StoreRole::StoreAdmin).await?;

    let nonce = oauth::begin(&session, id, OAuthProvider::Meta).await?;
    let url = client.authorize_url(&state.config().url_for(CALLBACK_PATH), &nonce)?;

    Ok(Redirect::to(url.as_str()))
}

/// Exchange the code for a long-lived token and store it.
///
/// GET /meta/callback
async fn callback(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ConnectCallbackQuery>,
) -> Result<Redirect, AppError> {
    let client = state.require_meta()?;
    let store_id = oauth::finish(&session, query.state.as_deref(), OAuthProvider::Meta).await?;

    if let Some(error) = query.error {
        warn!(%store_id, %error, description = ?query.error_description, "Meta connection declined");
        return Ok(Redirect::to(&format!("/stores/{store_id}/settings?error=meta")));
    }
    let code = query
        .code
        .ok_or_else(|| AppError::BadRequest("missing code".to_string()))?;

    load_store_for(state.pool(), &user, store_id, StoreRole::StoreAdmin).await?;

    let token = client
        .exchange_code(&code, &state.config().url_for(CALLBACK_PATH))
        .await?;
    StoreRepository::new(state.pool())
        .set_meta_token(store_id, &token)
        .await?;

    info!(%store_id, user_id = %user.id, "Meta connected");
    Ok(Redirect::to(&format!("/stores/{store_id}/settings?connected=meta")))
}
