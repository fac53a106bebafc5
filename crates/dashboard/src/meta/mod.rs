//! Meta Graph API integration (read-only ads insights).
//!
//! This module provides:
//! - [`MetaClient`] for OAuth token exchange and insights queries
//! - Typed ad account and insight rows
//! - Conversion of per-ad insights into scored ads
//!
//! # OAuth
//!
//! 1. `/api/stores/{id}/meta/connect` redirects to [`MetaClient::authorize_url`]
//! 2. Meta redirects back to `/meta/callback` with a code
//! 3. The code becomes a short-lived token, exchanged for a long-lived one
//! 4. The long-lived token is stored on the store row

mod client;
mod error;
mod types;

pub use client::MetaClient;
pub use error::MetaError;
pub use types::{AdAccount, AdInsight, ScoredAd, TokenResponse, score_ads};
