//! Authentication route handlers.
//!
//! Identity comes from Supabase Auth. A successful sign-in upserts the user
//! profile, cycles the session ID and stores the [`CurrentUser`] in the
//! session. API clients may instead send a Supabase bearer token.

use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use winqer_core::Email;

use crate::db::ProfileRepository;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;
use crate::supabase::{AuthSession, PkcePair};

use super::extract::{Json, Query};
use super::{ApiResponse, ApiResult};

/// Providers the login redirect accepts.
const OAUTH_PROVIDERS: &[&str] = &["google", "facebook", "apple", "azure"];

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login_redirect).post(password_login))
        .route("/auth/callback", get(callback))
        .route("/auth/logout", post(logout))
        .route("/api/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub provider: Option<String>,
}

/// Start an OAuth sign-in through Supabase.
///
/// GET /auth/login?provider=google
#[instrument(skip(state, session))]
async fn login_redirect(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<LoginQuery>,
) -> Result<Redirect, AppError> {
    let provider = query.provider.as_deref().unwrap_or("google");
    if !OAUTH_PROVIDERS.contains(&provider) {
        return Err(AppError::BadRequest(format!("unsupported provider: {provider}")));
    }

    let pkce = PkcePair::generate();
    session
        .insert(session_keys::PKCE_VERIFIER, &pkce.verifier)
        .await?;

    let redirect_to = state.config().url_for("/auth/callback");
    let url = state
        .supabase()
        .authorize_url(provider, &redirect_to, &pkce.challenge)?;

    Ok(Redirect::to(url.as_str()))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Finish the PKCE sign-in and start a session.
///
/// GET /auth/callback?code=
#[instrument(skip_all)]
async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    if let Some(error) = query.error {
        warn!(%error, description = ?query.error_description, "Sign-in was not completed");
        return Ok(Redirect::to("/login?error=oauth").into_response());
    }
    let code = query
        .code
        .ok_or_else(|| AppError::BadRequest("missing code".to_string()))?;

    let verifier: String = session
        .remove(session_keys::PKCE_VERIFIER)
        .await?
        .ok_or_else(|| AppError::BadRequest("sign-in expired, please try again".to_string()))?;

    let auth = state.supabase().exchange_code(&code, &verifier).await?;
    start_session(&state, &session, auth).await?;

    Ok(Redirect::to("/").into_response())
}

#[derive(Deserialize)]
pub struct PasswordLoginRequest {
    pub email: String,
    pub password: String,
}

/// Email and password sign-in.
///
/// POST /auth/login
async fn password_login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<PasswordLoginRequest>,
) -> ApiResult<CurrentUser> {
    let email = Email::parse(&body.email).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let password = SecretString::from(body.password);

    let auth = state
        .supabase()
        .sign_in_with_password(&email, &password)
        .await?;
    let user = start_session(&state, &session, auth).await?;

    Ok(ApiResponse::ok(user))
}

async fn start_session(
    state: &AppState,
    session: &Session,
    auth: AuthSession,
) -> Result<CurrentUser, AppError> {
    let user = auth.user;
    ProfileRepository::new(state.pool()).upsert(&user).await?;

    set_current_user(session, &user).await?;
    session
        .insert(
            session_keys::SUPABASE_ACCESS_TOKEN,
            auth.access_token.expose_secret(),
        )
        .await?;

    set_sentry_user(&user.id.to_string(), Some(user.email.as_str()));
    info!(user_id = %user.id, "User signed in");

    Ok(user)
}

/// Revoke the Supabase session and clear ours.
///
/// POST /auth/logout
async fn logout(State(state): State<AppState>, session: Session) -> ApiResult<()> {
    let token: Option<String> = session
        .get(session_keys::SUPABASE_ACCESS_TOKEN)
        .await
        .ok()
        .flatten();
    if let Some(token) = token {
        state.supabase().sign_out(&SecretString::from(token)).await;
    }

    clear_current_user(&session).await?;
    clear_sentry_user();

    Ok(ApiResponse::ok(()))
}

/// The signed-in user.
///
/// GET /api/me
async fn me(RequireAuth(user): RequireAuth) -> ApiResult<CurrentUser> {
    Ok(ApiResponse::ok(user))
}
