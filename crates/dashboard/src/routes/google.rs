//! Google (GA4 + Business Profile): connection and resource discovery.

use axum::{
    Router,
    extract::State,
    response::Redirect,
    routing::get,
};
use tower_sessions::Session;
use tracing::{info, warn};

use winqer_core::{Platform, StoreId, StoreRole};

use crate::db::{AnalyticsCacheRepository, StoreRepository};
use crate::error::AppError;
use crate::google::GoogleResources;
use crate::middleware::RequireAuth;
use crate::models::OAuthProvider;
use crate::services::load_store_for;
use crate::state::AppState;

use super::extract::{Path, Query};
use super::oauth::{self, ConnectCallbackQuery};
use super::{ApiResponse, ApiResult};

const CALLBACK_PATH: &str = "/google/callback";

/// Build the Google router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/stores/{id}/google/connect", get(connect))
        .route("/api/stores/{id}/google/resources", get(resources))
        .route(CALLBACK_PATH, get(callback))
}

/// Redirect to the Google consent screen.
///
/// GET /api/stores/{id}/google/connect
async fn connect(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<StoreId>,
) -> Result<Redirect, AppError> {
    let client = state.require_google()?;
    load_store_for(state.pool(), &user, id, StoreRole::StoreAdmin).await?;

    let nonce = oauth::begin(&session, id, OAuthProvider::Google).await?;
    let url = client.authorize_url(&state.config().url_for(CALLBACK_PATH), &nonce)?;

    Ok(Redirect::to(url.as_str()))
}

/// Store the refresh token from a completed consent.
///
/// A new grant may see different data, so cached GA4 and GBP days are dropped.
///
/// GET /google/callback
async fn callback(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ConnectCallbackQuery>,
) -> Result<Redirect, AppError> {
    let client = state.require_google()?;
    let store_id = oauth::finish(&session, query.state.as_deref(), OAuthProvider::Google).await?;

    if let Some(error) = query.error {
        warn!(%store_id, %error, description = ?query.error_description, "Google connection declined");
        return Ok(Redirect::to(&format!("/stores/{store_id}/settings?error=google")));
    }
    let code = query
        .code
        .ok_or_else(|| AppError::BadRequest("missing code".to_string()))?;

    load_store_for(state.pool(), &user, store_id, StoreRole::StoreAdmin).await?;

    let refresh = client
        .exchange_code(&code, &state.config().url_for(CALLBACK_PATH))
        .await?;
    StoreRepository::new(state.pool())
        .set_google_refresh_token(store_id, &refresh)
        .await?;

    let cache = AnalyticsCacheRepository::new(state.pool());
    for platform in [Platform::Ga4, Platform::Gbp] {
        cache.invalidate(store_id, platform).await?;
    }

    info!(%store_id, user_id = %user.id, "Google connected");
    Ok(Redirect::to(&format!("/stores/{store_id}/settings?connected=google")))
}

/// GA4 properties and Business Profile locations visible to the grant.
///
/// GET /api/stores/{id}/google/resources
async fn resources(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<StoreId>,
) -> ApiResult<GoogleResources> {
    let client = state.require_google()?;
    let (store, _) = load_store_for(state.pool(), &user, id, StoreRole::StoreAdmin).await?;
    let refresh = store
        .google_refresh_token
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("Google is not connected".to_string()))?;

    let token = client.access_token(refresh).await?;
    Ok(ApiResponse::ok(client.discover_resources(&token).await?))
}
