//! CSRF state for the Meta and Google connect flows.
//!
//! The connect handler stores an [`OAuthState`] in the session and sends its
//! nonce as the `state` parameter; the callback accepts only a matching nonce
//! for the same provider, and the state is consumed either way.

use serde::Deserialize;
use tower_sessions::Session;

use winqer_core::StoreId;

use crate::error::AppError;
use crate::models::{OAuthProvider, OAuthState, session_keys};
use crate::supabase::random_token;

/// Query parameters of a provider OAuth callback.
#[derive(Debug, Deserialize)]
pub struct ConnectCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Remember a pending connection and return the nonce to send as `state`.
///
/// # Errors
///
/// Returns an error if the session cannot be written.
pub async fn begin(
    session: &Session,
    store_id: StoreId,
    provider: OAuthProvider,
) -> Result<String, AppError> {
    let pending = OAuthState {
        nonce: random_token(),
        store_id,
        provider,
    };
    session.insert(session_keys::OAUTH_STATE, &pending).await?;
    Ok(pending.nonce)
}

/// Consume the pending connection and return its store.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if the state is missing or does not match.
pub async fn finish(
    session: &Session,
    returned: Option<&str>,
    provider: OAuthProvider,
) -> Result<StoreId, AppError> {
    let pending: Option<OAuthState> = session.remove(session_keys::OAUTH_STATE).await?;
    verify(pending.as_ref(), returned, provider)
}

fn verify(
    pending: Option<&OAuthState>,
    returned: Option<&str>,
    provider: OAuthProvider,
) -> Result<StoreId, AppError> {
    let pending = pending.ok_or_else(|| {
        AppError::BadRequest("connection expired, please try again".to_string())
    })?;
    match returned {
        Some(nonce) if pending.provider == provider && nonce == pending.nonce => {
            Ok(pending.store_id)
        }
        _ => Err(AppError::BadRequest("OAuth state mismatch".to_string())),
    }
}
