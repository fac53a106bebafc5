//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::ai::CreativeGenerator;
use crate::config::DashboardConfig;
use crate::error::AppError;
use crate::google::GoogleClient;
use crate::meta::MetaClient;
use crate::stripe::StripeClient;
use crate::supabase::SupabaseClient;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Optional integrations are `None` when their
/// configuration group is unset; handlers that need them answer 503.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: DashboardConfig,
    pool: PgPool,
    supabase: SupabaseClient,
    meta: Option<MetaClient>,
    google: Option<GoogleClient>,
    stripe: Option<StripeClient>,
    creatives: CreativeGenerator,
}

impl AppState {
    /// Create application state, building a client for every configured service.
    #[must_use]
    pub fn new(config: DashboardConfig, pool: PgPool) -> Self {
        let supabase = SupabaseClient::new(&config.supabase);
        let meta = config.meta.as_ref().map(MetaClient::new);
        let google = config.google.as_ref().map(GoogleClient::new);
        let stripe = config.stripe.as_ref().map(StripeClient::new);
        let creatives = CreativeGenerator::from_config(&config);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                supabase,
                meta,
                google,
                stripe,
                creatives,
            }),
        }
    }

    /// Get a reference to the dashboard configuration.
    #[must_use]
    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Supabase Auth client.
    #[must_use]
    pub fn supabase(&self) -> &SupabaseClient {
        &self.inner.supabase
    }

    /// Meta client, if configured.
    #[must_use]
    pub fn meta(&self) -> Option<&MetaClient> {
        self.inner.meta.as_ref()
    }

    /// Google client, if configured.
    #[must_use]
    pub fn google(&self) -> Option<&GoogleClient> {
        self.inner.google.as_ref()
    }

    /// Meta client or a 503.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConfigured` if Meta is not configured.
    pub fn require_meta(&self) -> Result<&MetaClient, AppError> {
        self.meta().ok_or(AppError::NotConfigured("Meta Ads"))
    }

    /// Google client or a 503.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConfigured` if Google is not configured.
    pub fn require_google(&self) -> Result<&GoogleClient, AppError> {
        self.google().ok_or(AppError::NotConfigured("Google"))
    }

    /// Stripe client or a 503.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConfigured` if Stripe is not configured.
    pub fn require_stripe(&self) -> Result<&StripeClient, AppError> {
        self.inner
            .stripe
            .as_ref()
            .ok_or(AppError::NotConfigured("Stripe billing"))
    }

    /// Creative generator (may have no providers).
    #[must_use]
    pub fn creatives(&self) -> &CreativeGenerator {
        &self.inner.creatives
    }
}
