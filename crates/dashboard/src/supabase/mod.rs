//! Supabase Auth (GoTrue) client.
//!
//! Supabase owns identity. The dashboard signs users in through it and keeps
//! only a mirrored profile row plus the session cookie.
//!
//! # Flows
//!
//! - OAuth providers via PKCE: `/auth/login?provider=google` stores a code
//!   verifier in the session and redirects to [`SupabaseClient::authorize_url`];
//!   `/auth/callback` exchanges the code with the verifier.
//! - Email + password via `POST /auth/login`.
//! - Bearer tokens (API clients) via [`SupabaseClient::get_user`], cached
//!   briefly.

mod client;
mod pkce;

pub use client::{AuthSession, SupabaseClient};
pub use pkce::{PkcePair, random_token};

use thiserror::Error;

/// Errors that can occur when calling Supabase Auth.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Wrong email/password, or an expired/invalid code or token.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Auth API returned another error.
    #[error("Supabase error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Too many auth attempts.
    #[error("Supabase rate limit reached")]
    RateLimited,

    /// The returned user is unusable (e.g. no email).
    #[error("invalid Supabase user: {0}")]
    InvalidUser(String),

    /// Failed to parse a response.
    #[error("Supabase response error: {0}")]
    Parse(String),

    /// Failed to build a request URL.
    #[error("invalid Supabase URL: {0}")]
    Url(#[from] url::ParseError),
}
