//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors render as
//! `{"success": false, "error": "<message>"}`; server-side failures are
//! captured to Sentry first and their details are not sent to the client.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::ai::AiError;
use crate::db::RepositoryError;
use crate::google::GoogleError;
use crate::meta::MetaError;
use crate::stripe::StripeError;
use crate::supabase::SupabaseError;

/// Application-level error type for the dashboard.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Meta Graph API call failed.
    #[error("Meta error: {0}")]
    Meta(#[from] MetaError),

    /// Google API call failed.
    #[error("Google error: {0}")]
    Google(#[from] GoogleError),

    /// Supabase Auth call failed.
    #[error("Auth error: {0}")]
    Supabase(#[from] SupabaseError),

    /// Stripe call or webhook failed.
    #[error("Billing error: {0}")]
    Stripe(#[from] StripeError),

    /// Creative generation failed.
    #[error("Creative generation error: {0}")]
    Ai(#[from] AiError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The store's plan does not include the feature.
    #[error("Upgrade required: {0}")]
    PaymentRequired(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body is not the expected JSON.
    #[error("Invalid request body: {0}")]
    InvalidJson(#[from] JsonRejection),

    /// Path parameter could not be parsed.
    #[error("Invalid path: {0}")]
    InvalidPath(#[from] PathRejection),

    /// Query string could not be parsed.
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] QueryRejection),

    /// An optional integration is not configured on this deployment.
    #[error("Not configured: {0}")]
    NotConfigured(&'static str),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidJson(rejection) => rejection.status(),
            Self::InvalidPath(rejection) => rejection.status(),
            Self::InvalidQuery(rejection) => rejection.status(),
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(RepositoryError::LastAdmin) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Meta(MetaError::RateLimited)
            | Self::Google(GoogleError::RateLimited)
            | Self::Supabase(SupabaseError::RateLimited)
            | Self::Ai(AiError::RateLimited(_)) => StatusCode::TOO_MANY_REQUESTS,
            Self::Meta(MetaError::TokenExpired) | Self::Google(GoogleError::TokenRevoked) => {
                StatusCode::CONFLICT
            }
            Self::Supabase(SupabaseError::InvalidCredentials) | Self::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Stripe(
                StripeError::InvalidSignature(_)
                | StripeError::InvalidPayload(_)
                | StripeError::UnpurchasablePlan(_),
            )
            | Self::Ai(AiError::InvalidRequest(_))
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Ai(AiError::ProviderNotConfigured(_)) | Self::NotConfigured(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Meta(_)
            | Self::Google(_)
            | Self::Supabase(_)
            | Self::Stripe(_)
            | Self::Ai(_) => StatusCode::BAD_GATEWAY,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
        }
    }

    /// Message safe to show the client.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(_)) => "Conflicting change".to_string(),
            Self::Database(e @ RepositoryError::LastAdmin) => e.to_string(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Meta(MetaError::TokenExpired | MetaError::RateLimited)
            | Self::Google(GoogleError::TokenRevoked | GoogleError::RateLimited)
            | Self::Supabase(SupabaseError::InvalidCredentials | SupabaseError::RateLimited)
            | Self::Stripe(StripeError::UnpurchasablePlan(_))
            | Self::Ai(
                AiError::InvalidRequest(_)
                | AiError::ProviderNotConfigured(_)
                | AiError::RateLimited(_),
            ) => self.to_string(),
            Self::Stripe(StripeError::InvalidSignature(_) | StripeError::InvalidPayload(_)) => {
                "Invalid webhook".to_string()
            }
            Self::Meta(_) | Self::Google(_) | Self::Supabase(_) | Self::Stripe(_) | Self::Ai(_) => {
                "External service error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if status == StatusCode::CONFLICT || status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(error = %self, "Request rejected");
        }

        let body = ErrorBody {
            success: false,
            error: self.public_message(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session error: {err}"))
    }
}

impl From<winqer_core::DateRangeError> for AppError {
    fn from(err: winqer_core::DateRangeError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// Set the Sentry user context for the signed-in user.
pub fn set_sentry_user(user_id: &str, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
