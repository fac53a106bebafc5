//! Session-related types.
//!
//! Types stored in the tower-sessions session for authentication and OAuth
//! round-trips.

use serde::{Deserialize, Serialize};

use winqer_core::{Email, StoreId, UserId};

/// Session-stored user identity, taken from the Supabase user at sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Supabase auth user ID.
    pub id: UserId,
    pub email: Email,
    pub display_name: Option<String>,
}

/// Which account a platform connection grants.
///
/// One Google grant covers both GA4 and Business Profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Meta,
    Google,
}

/// State carried through a platform OAuth redirect.
///
/// The `nonce` is echoed back in the `state` query parameter and must match
/// the session copy before any token is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    pub nonce: String,
    pub store_id: StoreId,
    pub provider: OAuthProvider,
}

/// Session keys.
pub mod keys {
    /// The signed-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// PKCE code verifier for the pending Supabase sign-in.
    pub const PKCE_VERIFIER: &str = "pkce_verifier";

    /// Pending Meta/Google OAuth state.
    pub const OAUTH_STATE: &str = "oauth_state";

    /// Supabase access token, revoked on logout.
    pub const SUPABASE_ACCESS_TOKEN: &str = "supabase_access_token";
}
