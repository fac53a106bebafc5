//! Supabase Auth HTTP client.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};
use url::Url;

use winqer_core::{Email, UserId};

use super::SupabaseError;
use crate::config::SupabaseConfig;
use crate::models::CurrentUser;

/// Bearer lookups are cached this long.
const USER_CACHE_TTL: Duration = Duration::from_secs(60);

/// A signed-in Supabase session.
#[derive(Clone)]
pub struct AuthSession {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_in: u64,
    pub user: CurrentUser,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct SessionResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: u64,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: serde_json::Value,
}

impl TryFrom<UserResponse> for CurrentUser {
    type Error = SupabaseError;

    fn try_from(user: UserResponse) -> Result<Self, Self::Error> {
        let id: UserId = user
            .id
            .parse()
            .map_err(|e| SupabaseError::InvalidUser(format!("invalid id {}: {e}", user.id)))?;
        let email = user
            .email
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| SupabaseError::InvalidUser("user has no email".to_string()))
            .and_then(|e| {
                Email::parse(e).map_err(|err| SupabaseError::InvalidUser(err.to_string()))
            })?;

        // Google fills `full_name`, email sign-ups may set `name`.
        let display_name = ["full_name", "name"]
            .iter()
            .find_map(|key| user.user_metadata.get(key).and_then(serde_json::Value::as_str))
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from);

        Ok(Self {
            id,
            email,
            display_name,
        })
    }
}

#[derive(Serialize)]
struct PkceGrant<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

/// Supabase Auth client.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
}

struct SupabaseClientInner {
    client: reqwest::Client,
    auth_base: String,
    anon_key: SecretString,
    user_cache: Cache<String, CurrentUser>,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("auth_base", &self.inner.auth_base)
            .field("anon_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl SupabaseClient {
    /// Create a new Supabase Auth client.
    #[must_use]
    pub fn new(config: &SupabaseConfig) -> Self {
        let user_cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(USER_CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(SupabaseClientInner {
                client: reqwest::Client::new(),
                auth_base: format!("{}/auth/v1", config.url.trim_end_matches('/')),
                anon_key: config.anon_key.clone(),
                user_cache,
            }),
        }
    }

    /// URL that starts an OAuth sign-in with `provider` using PKCE.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Url` if the URL cannot be built.
    pub fn authorize_url(
        &self,
        provider: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<Url, SupabaseError> {
        let mut url = Url::parse(&format!("{}/authorize", self.inner.auth_base))?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "s256");
        Ok(url)
    }

    /// Exchange a PKCE auth code for a session.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::InvalidCredentials` if the code or verifier is rejected.
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<AuthSession, SupabaseError> {
        self.token_grant(
            "pkce",
            &PkceGrant {
                auth_code,
                code_verifier,
            },
        )
        .await
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::InvalidCredentials` on a wrong email or password.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, SupabaseError> {
        self.token_grant(
            "password",
            &PasswordGrant {
                email: email.as_str(),
                password: password.expose_secret(),
            },
        )
        .await
    }

    /// Resolve a bearer access token to its user.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::InvalidCredentials` if the token is invalid or expired.
    #[instrument(skip_all)]
    pub async fn get_user(&self, access_token: &str) -> Result<CurrentUser, SupabaseError> {
        let key = hex::encode(Sha256::digest(access_token.as_bytes()));
        if let Some(user) = self.inner.user_cache.get(&key).await {
            return Ok(user);
        }

        let response = self
            .inner
            .client
            .get(format!("{}/user", self.inner.auth_base))
            .header("apikey", self.inner.anon_key.expose_secret())
            .bearer_auth(access_token)
            .send()
            .await?;

        let user: UserResponse = read_json(response).await?;
        let user = CurrentUser::try_from(user)?;
        self.inner.user_cache.insert(key, user.clone()).await;

        Ok(user)
    }

    /// Revoke the session behind `access_token`.
    ///
    /// Failures are logged, not returned; the local session is cleared regardless.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, access_token: &SecretString) {
        let result = self
            .inner
            .client
            .post(format!("{}/logout", self.inner.auth_base))
            .header("apikey", self.inner.anon_key.expose_secret())
            .bearer_auth(access_token.expose_secret())
            .send()
            .await;

        let key = hex::encode(Sha256::digest(access_token.expose_secret().as_bytes()));
        self.inner.user_cache.invalidate(&key).await;

        match result {
            Ok(response) if response.status().is_success() => debug!("Supabase session revoked"),
            Ok(response) => warn!(status = %response.status(), "Supabase logout rejected"),
            Err(e) => warn!(error = %e, "Supabase logout failed"),
        }
    }

    async fn token_grant<B: Serialize + Sync>(
        &self,
        grant_type: &str,
        body: &B,
    ) -> Result<AuthSession, SupabaseError> {
        let mut url = Url::parse(&format!("{}/token", self.inner.auth_base))?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = self
            .inner
            .client
            .post(url)
            .header("apikey", self.inner.anon_key.expose_secret())
            .json(body)
            .send()
            .await?;

        let session: SessionResponse = read_json(response).await?;
        Ok(AuthSession {
            access_token: SecretString::from(session.access_token),
            refresh_token: session.refresh_token.map(SecretString::from),
            expires_in: session.expires_in,
            user: session.user.try_into()?,
        })
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, SupabaseError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(error_from_status(status.as_u16(), &body));
    }

    serde_json::from_str(&body)
        .map_err(|e| SupabaseError::Parse(format!("Failed to parse response: {e}")))
}

/// GoTrue reports errors as `{"error", "error_description"}` or `{"msg"}`.
fn error_from_status(status: u16, body: &str) -> SupabaseError {
    let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
    let error_code = parsed.get("error").and_then(serde_json::Value::as_str);

    match (status, error_code) {
        (429, _) => SupabaseError::RateLimited,
        (401 | 403, _) | (400, Some("invalid_grant")) => SupabaseError::InvalidCredentials,
        _ => {
            let message = ["error_description", "msg", "message"]
                .iter()
                .find_map(|key| parsed.get(key).and_then(serde_json::Value::as_str))
                .unwrap_or(body)
                .to_string();
            SupabaseError::Api { status, message }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> SupabaseClient {
        SupabaseClient::new(&SupabaseConfig {
            url: "https://abc.supabase.co".to_string(),
            anon_key: SecretString::from("anon-key"),
        })
    }

    #[test]
    fn test_authorize_url() {
        let url = client()
            .authorize_url("google", "https://app.winqer.test/auth/callback", "challenge")
            .unwrap();
        assert_eq!(url.path(), "/auth/v1/authorize");
        let query: std::collections::HashMap<String, String> =
            url.query_pairs().into_owned().collect();
        assert_eq!(query["provider"], "google");
        assert_eq!(query["code_challenge_method"], "s256");
    }

    #[test]
    fn test_user_response_conversion() {
        let json = r#"{
            "id": "0b7a3c1e-5b7d-4e8f-9a0b-1c2d3e4f5a6b",
            "email": "Owner@Bakery.test",
            "user_metadata": {"full_name": "Dana Reyes"}
        }"#;
        let user: UserResponse = serde_json::from_str(json).unwrap();
        let user = CurrentUser::try_from(user).unwrap();
        assert_eq!(user.email.as_str(), "owner@bakery.test");
        assert_eq!(user.display_name.as_deref(), Some("Dana Reyes"));
    }

    #[test]
    fn test_user_without_email_is_rejected() {
        let user: UserResponse =
            serde_json::from_str(r#"{"id":"0b7a3c1e-5b7d-4e8f-9a0b-1c2d3e4f5a6b","phone":"+1"}"#)
                .unwrap();
        assert!(matches!(
            CurrentUser::try_from(user),
            Err(SupabaseError::InvalidUser(_))
        ));
    }

    #[test]
    fn test_error_from_status() {
        assert!(matches!(
            error_from_status(400, r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            SupabaseError::InvalidCredentials
        ));
        assert!(matches!(error_from_status(429, ""), SupabaseError::RateLimited));
        assert!(matches!(
            error_from_status(422, r#"{"msg":"Signups not allowed"}"#),
            SupabaseError::Api { status: 422, ref message } if message == "Signups not allowed"
        ));
    }
}
