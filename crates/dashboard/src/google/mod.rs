//! Google APIs integration: OAuth, GA4, and Business Profile.
//!
//! One Google OAuth grant (offline access) covers both GA4 and Business
//! Profile. The refresh token is stored on the store row; access tokens are
//! minted on demand and cached in memory until shortly before they expire.
//!
//! # APIs
//!
//! - Analytics Data API `runReport` for daily GA4 traffic
//! - Analytics Admin API `accountSummaries` for property discovery
//! - Account Management + Business Information APIs for location discovery
//! - Business Profile Performance API for daily location metrics

mod analytics;
mod business;
mod client;
pub mod types;

pub use client::{AccessToken, GoogleClient};
pub use types::{Ga4Property, GoogleResources, GoogleTokens, Location};

use thiserror::Error;

/// Errors that can occur when interacting with Google APIs.
#[derive(Debug, Error)]
pub enum GoogleError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("Google API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// The refresh token was revoked or expired (`invalid_grant`).
    #[error("Google authorization revoked; reconnect the account")]
    TokenRevoked,

    /// The OAuth exchange did not return a refresh token.
    #[error("Google did not return a refresh token")]
    MissingRefreshToken,

    /// Quota exceeded.
    #[error("Google rate limit reached")]
    RateLimited,

    /// Failed to parse a response.
    #[error("Google response error: {0}")]
    Parse(String),

    /// Failed to build a request URL.
    #[error("invalid Google URL: {0}")]
    Url(#[from] url::ParseError),
}
