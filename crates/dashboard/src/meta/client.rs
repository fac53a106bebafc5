//! Graph API client.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use winqer_core::metrics::MetaDailyMetrics;
use winqer_core::{DateRange, fill_days};

use super::error::{GraphErrorResponse, MetaError};
use super::types::{AdAccount, AdInsight, InsightRow, Paged, TokenResponse};
use crate::config::MetaConfig;

const GRAPH_BASE: &str = "https://graph.facebook.com";
const DIALOG_BASE: &str = "https://www.facebook.com";
const OAUTH_SCOPES: &str = "ads_read,read_insights";
const ACCOUNT_INSIGHT_FIELDS: &str = "spend,impressions,reach,clicks,actions";
const AD_INSIGHT_FIELDS: &str = "ad_id,ad_name,spend,impressions,clicks,actions";

/// Upper bound on followed `paging.next` links per request.
const MAX_PAGES: usize = 20;

/// Meta Graph API client.
#[derive(Clone)]
pub struct MetaClient {
    client: reqwest::Client,
    app_id: String,
    app_secret: SecretString,
    api_version: String,
    graph_base: String,
}

impl std::fmt::Debug for MetaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaClient")
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl MetaClient {
    /// Create a new Graph API client.
    #[must_use]
    pub fn new(config: &MetaConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
            api_version: config.api_version.clone(),
            graph_base: GRAPH_BASE.to_string(),
        }
    }

    /// Point the client at a different Graph host, e.g. a local test server.
    #[must_use]
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.graph_base = base.into();
        self
    }

    fn graph_url(&self, path: &str) -> Result<Url, MetaError> {
        Ok(Url::parse(&format!(
            "{}/{}/{}",
            self.graph_base,
            self.api_version,
            path.trim_start_matches('/')
        ))?)
    }

    /// The Facebook Login dialog URL for connecting an ad account.
    ///
    /// # Errors
    ///
    /// Returns `MetaError::Url` if the redirect URI cannot be encoded.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<Url, MetaError> {
        let mut url = Url::parse(&format!("{DIALOG_BASE}/{}/dialog/oauth", self.api_version))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.app_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("state", state)
            .append_pair("scope", OAUTH_SCOPES)
            .append_pair("response_type", "code");
        Ok(url)
    }

    /// Exchange an OAuth code for a long-lived user token.
    ///
    /// Performs both steps: code to short-lived token, then
    /// `fb_exchange_token` to a roughly 60-day token.
    ///
    /// # Errors
    ///
    /// Returns an error if either exchange fails.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<SecretString, MetaError> {
        let mut url = self.graph_url("oauth/access_token")?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.app_id)
            .append_pair("client_secret", self.app_secret.expose_secret())
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("code", code);
        let short: TokenResponse = self.get_json(url, None).await?;

        let mut url = self.graph_url("oauth/access_token")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "fb_exchange_token")
            .append_pair("client_id", &self.app_id)
            .append_pair("client_secret", self.app_secret.expose_secret())
            .append_pair("fb_exchange_token", &short.access_token);
        let long: TokenResponse = self.get_json(url, None).await?;

        debug!(expires_in = ?long.expires_in, "Exchanged Meta long-lived token");
        Ok(SecretString::from(long.access_token))
    }

    /// Ad accounts readable with `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the token is invalid.
    #[instrument(skip(self, token))]
    pub async fn list_ad_accounts(&self, token: &SecretString) -> Result<Vec<AdAccount>, MetaError> {
        let mut url = self.graph_url("me/adaccounts")?;
        url.query_pairs_mut()
            .append_pair("fields", "id,name,currency,account_status")
            .append_pair("limit", "100");
        self.get_all_pages(url, token).await
    }

    /// Account-level delivery for every day of `range`.
    ///
    /// Days without delivery are returned as zero records.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or a row cannot be parsed.
    #[instrument(skip(self, token), fields(range = ?range))]
    pub async fn account_daily_insights(
        &self,
        token: &SecretString,
        ad_account_id: &str,
        range: &DateRange,
    ) -> Result<Vec<MetaDailyMetrics>, MetaError> {
        let url = self.insights_url(ad_account_id, range, "account", ACCOUNT_INSIGHT_FIELDS, true)?;
        let rows: Vec<InsightRow> = self.get_all_pages(url, token).await?;
        let days = rows
            .into_iter()
            .map(InsightRow::into_daily)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(fill_days(days, range))
    }

    /// Per-ad delivery totals for `range`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or a row cannot be parsed.
    #[instrument(skip(self, token), fields(range = ?range))]
    pub async fn ad_insights(
        &self,
        token: &SecretString,
        ad_account_id: &str,
        range: &DateRange,
    ) -> Result<Vec<AdInsight>, MetaError> {
        let url = self.insights_url(ad_account_id, range, "ad", AD_INSIGHT_FIELDS, false)?;
        let rows: Vec<InsightRow> = self.get_all_pages(url, token).await?;
        rows.into_iter().map(InsightRow::into_ad).collect()
    }

    fn insights_url(
        &self,
        ad_account_id: &str,
        range: &DateRange,
        level: &str,
        fields: &str,
        daily: bool,
    ) -> Result<Url, MetaError> {
        let time_range = serde_json::json!({
            "since": range.start.format("%Y-%m-%d").to_string(),
            "until": range.end.format("%Y-%m-%d").to_string(),
        });

        let mut url = self.graph_url(&format!("{}/insights", normalize_account_id(ad_account_id)))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("level", level)
                .append_pair("fields", fields)
                .append_pair("time_range", &time_range.to_string())
                .append_pair("limit", "500");
            if daily {
                query.append_pair("time_increment", "1");
            }
        }
        Ok(url)
    }

    /// Follow `paging.next` until exhausted.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        first: Url,
        token: &SecretString,
    ) -> Result<Vec<T>, MetaError> {
        let mut items = Vec::new();
        let mut next = Some(first);
        let mut pages = 0;

        while let Some(url) = next.take() {
            let page: Paged<T> = self.get_json(url, Some(token)).await?;
            items.extend(page.data);
            pages += 1;

            if pages >= MAX_PAGES {
                tracing::warn!(pages, "Stopping Meta pagination at page limit");
                break;
            }
            next = page
                .paging
                .and_then(|p| p.next)
                .map(|n| Url::parse(&n))
                .transpose()?;
        }

        Ok(items)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        token: Option<&SecretString>,
    ) -> Result<T, MetaError> {
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token.expose_secret());
        }
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<GraphErrorResponse>(&body) {
                return Err(err.error.into());
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(MetaError::RateLimited);
            }
            return Err(MetaError::Api {
                code: i64::from(status.as_u16()),
                message: body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| MetaError::Parse(format!("Failed to parse response: {e}")))
    }
}

/// Graph edges are addressed as `act_<id>`; settings may hold the bare number.
fn normalize_account_id(id: &str) -> String {
    let id = id.trim();
    if id.starts_with("act_") {
        id.to_string()
    } else {
        format!("act_{id}")
    }
}
