//! Google OAuth and shared request plumbing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};
use url::Url;

use super::GoogleError;
use super::types::GoogleTokens;
use crate::config::GoogleConfig;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Read-only analytics plus Business Profile management (required by the
/// Performance API).
const OAUTH_SCOPES: &str = "https://www.googleapis.com/auth/analytics.readonly \
                            https://www.googleapis.com/auth/business.manage";

/// Cached access tokens are dropped this long before Google expires them.
const EXPIRY_MARGIN: Duration = Duration::from_secs(5 * 60);

/// A short-lived Google access token.
#[derive(Clone)]
pub struct AccessToken {
    token: SecretString,
    lifetime: Duration,
}

impl AccessToken {
    /// Wrap a raw token with its lifetime.
    #[must_use]
    pub fn new(token: SecretString, lifetime: Duration) -> Self {
        Self { token, lifetime }
    }

    pub(crate) fn expose(&self) -> &str {
        self.token.expose_secret()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Per-entry expiry: token lifetime minus [`EXPIRY_MARGIN`].
struct TokenExpiry;

impl Expiry<String, AccessToken> for TokenExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &AccessToken,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.lifetime.saturating_sub(EXPIRY_MARGIN))
    }
}

/// Google APIs client.
///
/// Cheap to clone; the access token cache is shared between clones.
#[derive(Clone)]
pub struct GoogleClient {
    pub(super) inner: Arc<GoogleClientInner>,
}

pub(super) struct GoogleClientInner {
    pub(super) client: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    token_cache: Cache<String, AccessToken>,
}

impl std::fmt::Debug for GoogleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleClient")
            .field("client_id", &self.inner.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl GoogleClient {
    /// Create a new Google client.
    #[must_use]
    pub fn new(config: &GoogleConfig) -> Self {
        let token_cache = Cache::builder()
            .max_capacity(10_000)
            .expire_after(TokenExpiry)
            .build();

        Self {
            inner: Arc::new(GoogleClientInner {
                client: reqwest::Client::new(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                token_cache,
            }),
        }
    }

    /// The consent screen URL.
    ///
    /// `prompt=consent` makes Google issue a refresh token even when the user
    /// granted access before.
    ///
    /// # Errors
    ///
    /// Returns `GoogleError::Url` if the URL cannot be built.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<Url, GoogleError> {
        let mut url = Url::parse(AUTH_URL)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.inner.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", OAUTH_SCOPES)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("include_granted_scopes", "true")
            .append_pair("state", state);
        Ok(url)
    }

    /// Exchange an authorization code for tokens.
    ///
    /// The access token is seeded into the cache under the refresh token.
    ///
    /// # Errors
    ///
    /// Returns `GoogleError::MissingRefreshToken` if Google returned no refresh
    /// token, or any request error.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<SecretString, GoogleError> {
        let tokens = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .await?;

        let refresh = tokens
            .refresh_token
            .map(SecretString::from)
            .ok_or(GoogleError::MissingRefreshToken)?;

        let access = AccessToken::new(
            SecretString::from(tokens.access_token),
            Duration::from_secs(tokens.expires_in),
        );
        self.inner
            .token_cache
            .insert(cache_key(&refresh), access)
            .await;

        Ok(refresh)
    }

    /// An access token for `refresh_token`, from cache when still valid.
    ///
    /// # Errors
    ///
    /// Returns `GoogleError::TokenRevoked` if Google rejects the refresh token.
    #[instrument(skip_all)]
    pub async fn access_token(&self, refresh_token: &SecretString) -> Result<AccessToken, GoogleError> {
        let key = cache_key(refresh_token);
        if let Some(token) = self.inner.token_cache.get(&key).await {
            return Ok(token);
        }

        let tokens = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret()),
            ])
            .await?;

        let access = AccessToken::new(
            SecretString::from(tokens.access_token),
            Duration::from_secs(tokens.expires_in),
        );
        self.inner.token_cache.insert(key, access.clone()).await;
        debug!(expires_in = tokens.expires_in, "Refreshed Google access token");

        Ok(access)
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<GoogleTokens, GoogleError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", self.inner.client_id.as_str()),
            ("client_secret", self.inner.client_secret.expose_secret()),
        ];
        form.extend_from_slice(params);

        let response = self.inner.client.post(TOKEN_URL).form(&form).send().await?;
        read_json(response).await
    }

    pub(super) async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        token: &AccessToken,
    ) -> Result<T, GoogleError> {
        let response = self
            .inner
            .client
            .get(url)
            .bearer_auth(token.expose())
            .send()
            .await?;
        read_json(response).await
    }

    pub(super) async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: Url,
        token: &AccessToken,
        body: &B,
    ) -> Result<T, GoogleError> {
        let response = self
            .inner
            .client
            .post(url)
            .bearer_auth(token.expose())
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }
}

/// Cache key derived from the refresh token so the raw token is not held twice.
fn cache_key(refresh_token: &SecretString) -> String {
    hex::encode(Sha256::digest(refresh_token.expose_secret().as_bytes()))
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GoogleError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(error_from_body(status.as_u16(), &body));
    }

    serde_json::from_str(&body).map_err(|e| GoogleError::Parse(format!("Failed to parse response: {e}")))
}

/// Map both error shapes Google uses: OAuth (`{"error": "invalid_grant"}`)
/// and API (`{"error": {"code", "message", "status"}}`).
pub(super) fn error_from_body(status: u16, body: &str) -> GoogleError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    match error {
        Some(serde_json::Value::String(code)) if code == "invalid_grant" => GoogleError::TokenRevoked,
        _ if status == 429 => GoogleError::RateLimited,
        Some(serde_json::Value::Object(obj)) => {
            if obj.get("status").and_then(serde_json::Value::as_str) == Some("RESOURCE_EXHAUSTED") {
                return GoogleError::RateLimited;
            }
            let message = obj
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            GoogleError::Api { status, message }
        }
        Some(serde_json::Value::String(code)) => {
            let description = parsed
                .as_ref()
                .and_then(|v| v.get("error_description"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            GoogleError::Api {
                status,
                message: format!("{code}: {description}"),
            }
        }
        _ => GoogleError::Api {
            status,
            message: body.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GoogleClient {
        GoogleClient::new(&GoogleConfig {
            client_id: "client-123.apps.googleusercontent.com".to_string(),
            client_secret: SecretString::from("client-secret"),
        })
    }

    #[test]
    fn test_authorize_url_requests_offline_access() {
        let url = client()
            .authorize_url("https://app.winqer.test/google/callback", "abc")
            .expect("url");
        let query: std::collections::HashMap<String, String> =
            url.query_pairs().into_owned().collect();
        assert_eq!(query["access_type"], "offline");
        assert_eq!(query["prompt"], "consent");
        assert_eq!(query["state"], "abc");
        assert!(query["scope"].contains("analytics.readonly"));
        assert!(query["scope"].contains("business.manage"));
    }

    #[test]
    fn test_error_from_body_shapes() {
        let revoked = error_from_body(400, r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#);
        assert!(matches!(revoked, GoogleError::TokenRevoked));

        let denied = error_from_body(
            403,
            r#"{"error":{"code":403,"message":"User does not have sufficient permissions","status":"PERMISSION_DENIED"}}"#,
        );
        assert!(
            matches!(denied, GoogleError::Api { status: 403, ref message } if message.contains("permissions"))
        );

        let quota = error_from_body(
            429,
            r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#,
        );
        assert!(matches!(quota, GoogleError::RateLimited));

        let plain = error_from_body(502, "Bad Gateway");
        assert!(matches!(plain, GoogleError::Api { status: 502, .. }));
    }

    #[test]
    fn test_token_expiry_applies_margin() {
        let token = AccessToken::new(SecretString::from("ya29.x"), Duration::from_secs(3599));
        let ttl = TokenExpiry.expire_after_create(&String::new(), &token, Instant::now());
        assert_eq!(ttl, Some(Duration::from_secs(3599 - 300)));
        assert!(!format!("{token:?}").contains("ya29"));
    }

    #[tokio::test]
    async fn test_access_token_served_from_cache() {
        let client = client();
        let refresh = SecretString::from("1//refresh");
        let seeded = AccessToken::new(SecretString::from("ya29.cached"), Duration::from_secs(3600));
        client
            .inner
            .token_cache
            .insert(cache_key(&refresh), seeded)
            .await;

        let token = client.access_token(&refresh).await.expect("cached token");
        assert_eq!(token.expose(), "ya29.cached");
    }
}
