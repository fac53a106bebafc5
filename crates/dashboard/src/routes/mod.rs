//! HTTP route handlers for the dashboard.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                 - Liveness
//! GET  /health/ready                           - Database readiness
//!
//! # Auth (Supabase)
//! GET  /auth/login?provider=google             - Redirect to Supabase (PKCE)
//! POST /auth/login                             - Email/password sign-in
//! GET  /auth/callback?code=                    - PKCE exchange, starts session
//! POST /auth/logout                            - End session
//! GET  /api/me                                 - Signed-in user
//!
//! # Stores
//! GET    /api/stores                           - Stores visible to the user
//! POST   /api/stores                           - Create a store (onboarding)
//! GET    /api/stores/{id}                      - Store detail
//! PATCH  /api/stores/{id}                      - Settings (STORE_ADMIN)
//! GET    /api/stores/{id}/members              - Members (STORE_ADMIN)
//! POST   /api/stores/{id}/members              - Assign by email (STORE_ADMIN)
//! DELETE /api/stores/{id}/members/{user_id}    - Remove member (STORE_ADMIN)
//!
//! # Analytics
//! GET  /api/stores/{id}/dashboard              - Meta + GA4 + GBP for a range
//! GET  /api/stores/{id}/meta/ads               - Scored ads
//! GET  /api/stores/{id}/meta/accounts          - Ad account discovery
//! GET  /api/stores/{id}/google/resources       - GA4 properties + locations
//!
//! # Platform connections (STORE_ADMIN)
//! GET  /api/stores/{id}/meta/connect           - Redirect to Facebook Login
//! GET  /meta/callback                          - Facebook Login callback
//! GET  /api/stores/{id}/google/connect         - Redirect to Google consent
//! GET  /google/callback                        - Google OAuth callback
//!
//! # Billing
//! POST /api/stores/{id}/billing/checkout       - Stripe Checkout URL (STORE_ADMIN)
//! POST /api/stripe/webhook                     - Stripe webhook
//!
//! # Creatives
//! POST /api/stores/{id}/creatives              - AI ad copy (STORE_ADMIN, paid plan)
//! ```

pub mod auth;
pub mod billing;
pub mod creatives;
pub mod dashboard;
pub mod extract;
pub mod google;
pub mod health;
pub mod meta;
pub mod oauth;
pub mod stores;

use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use winqer_core::DateRange;

use crate::error::AppError;
use crate::state::AppState;

/// Success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wrap `data` in the success envelope.
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Handler result carrying the success envelope.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

/// Range selection shared by analytics endpoints.
///
/// `start`/`end` (`YYYY-MM-DD`) win over `range` (`7d`, `30d`, `90d`);
/// with neither, the last 30 days.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub range: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Default preset when no range is given.
pub const DEFAULT_RANGE: &str = "30d";

impl RangeQuery {
    /// Resolve to a concrete range ending today (UTC).
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for malformed or one-sided ranges.
    pub fn resolve(&self) -> Result<DateRange, AppError> {
        self.resolve_at(Utc::now().date_naive())
    }

    fn resolve_at(&self, today: chrono::NaiveDate) -> Result<DateRange, AppError> {
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => Ok(DateRange::parse(start, end)?),
            (None, None) => Ok(DateRange::from_preset(
                self.range.as_deref().unwrap_or(DEFAULT_RANGE),
                today,
            )?),
            _ => Err(AppError::BadRequest(
                "start and end must be given together".to_string(),
            )),
        }
    }
}

/// Build the complete router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(stores::router())
        .merge(dashboard::router())
        .merge(meta::router())
        .merge(google::router())
        .merge(billing::router())
        .merge(creatives::router())
        .fallback(unknown_route)
}

async fn unknown_route() -> AppError {
    AppError::NotFound("route".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 30).unwrap()
    }

    fn query(range: Option<&str>, start: Option<&str>, end: Option<&str>) -> RangeQuery {
        RangeQuery {
            range: range.map(String::from),
            start: start.map(String::from),
            end: end.map(String::from),
        }
    }

    #[test]
    fn test_default_range_is_last_30_days() {
        let range = RangeQuery::default().resolve_at(today()).unwrap();
        assert_eq!(range.end, today());
        assert_eq!(range.num_days(), 30);
    }

    #[test]
    fn test_explicit_bounds_win_over_preset() {
        let range = query(Some("7d"), Some("2026-04-01"), Some("2026-04-10"))
            .resolve_at(today())
            .unwrap();
        assert_eq!(range.num_days(), 10);
    }

    #[test]
    fn test_bad_ranges_are_bad_requests() {
        assert!(matches!(
            query(Some("365d"), None, None).resolve_at(today()),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            query(None, Some("2026-04-01"), None).resolve_at(today()),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            query(None, Some("2026-04-10"), Some("2026-04-01")).resolve_at(today()),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_success_envelope_shape() {
        let Json(body) = ApiResponse::ok(vec![1, 2]);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": [1, 2]}));
    }
}
