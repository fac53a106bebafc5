//! Dashboard configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `WINQER_DATABASE_URL` - Supabase `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `WINQER_BASE_URL` - Public URL of the dashboard (used for OAuth redirects)
//! - `SUPABASE_URL` - Supabase project URL (e.g., <https://abc.supabase.co>)
//! - `SUPABASE_ANON_KEY` - Supabase anon (public) API key
//!
//! ## Optional
//! - `WINQER_HOST` - Bind address (default: 127.0.0.1)
//! - `WINQER_PORT` - Listen port (default: 3000)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional groups (all variables of a group must be set together)
//! - Stripe: `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`, `STRIPE_PRICE_STANDARD`, `STRIPE_PRICE_PREMIUM`
//! - Meta: `META_APP_ID`, `META_APP_SECRET` (+ `META_API_VERSION`, default v21.0)
//! - Google: `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`
//! - `OpenAI`: `OPENAI_API_KEY` (+ `OPENAI_MODEL`, default gpt-4o-mini)
//! - Gemini: `GEMINI_API_KEY` (+ `GEMINI_MODEL`, default gemini-2.0-flash)
//! - TLS: `WINQER_TLS_CERT`, `WINQER_TLS_KEY`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_META_API_VERSION: &str = "v21.0";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Dashboard application configuration.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, without trailing slash
    pub base_url: String,
    pub supabase: SupabaseConfig,
    pub stripe: Option<StripeConfig>,
    pub meta: Option<MetaConfig>,
    pub google: Option<GoogleConfig>,
    pub openai: Option<OpenAIConfig>,
    pub gemini: Option<GeminiConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// Supabase project configuration.
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project URL, without trailing slash
    pub url: String,
    /// Anon key sent as `apikey` on every Auth request
    pub anon_key: SecretString,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

/// Stripe billing configuration.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: SecretString,
    /// Signing secret of the webhook endpoint (whsec_...)
    pub webhook_secret: SecretString,
    /// Price ID of the standard plan
    pub price_standard: String,
    /// Price ID of the premium plan
    pub price_premium: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("price_standard", &self.price_standard)
            .field("price_premium", &self.price_premium)
            .finish()
    }
}

/// Meta app configuration for the Graph API and Facebook Login.
#[derive(Clone)]
pub struct MetaConfig {
    pub app_id: String,
    pub app_secret: SecretString,
    /// Graph API version (e.g., v21.0)
    pub api_version: String,
}

impl std::fmt::Debug for MetaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaConfig")
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Google OAuth client used for GA4 and Business Profile access.
#[derive(Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// `OpenAI` configuration for creative generation.
#[derive(Clone)]
pub struct OpenAIConfig {
    pub api_key: SecretString,
    pub model: String,
}

impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

/// Gemini configuration for creative generation.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: SecretString,
    pub model: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl DashboardConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, if
    /// an optional group is only partially set, or if secrets fail validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("WINQER_DATABASE_URL")?;
        let host = get_env_or_default("WINQER_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("WINQER_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("WINQER_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("WINQER_PORT".to_string(), e.to_string()))?;
        let base_url = normalize_url("WINQER_BASE_URL", &get_required_env("WINQER_BASE_URL")?)?;

        let supabase = SupabaseConfig {
            url: normalize_url("SUPABASE_URL", &get_required_env("SUPABASE_URL")?)?,
            anon_key: get_validated_secret("SUPABASE_ANON_KEY")?,
        };

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.2);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            supabase,
            stripe: StripeConfig::from_env()?,
            meta: MetaConfig::from_env()?,
            google: GoogleConfig::from_env()?,
            openai: OpenAIConfig::from_env()?,
            gemini: GeminiConfig::from_env()?,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            tls: TlsConfig::from_env()?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Absolute URL for a path on this dashboard.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl StripeConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(values) = load_group(&[
            "STRIPE_SECRET_KEY",
            "STRIPE_WEBHOOK_SECRET",
            "STRIPE_PRICE_STANDARD",
            "STRIPE_PRICE_PREMIUM",
        ])?
        else {
            return Ok(None);
        };
        let [secret_key, webhook_secret, price_standard, price_premium] = values;

        validate_secret_strength(&secret_key, "STRIPE_SECRET_KEY")?;
        validate_secret_strength(&webhook_secret, "STRIPE_WEBHOOK_SECRET")?;

        Ok(Some(Self {
            secret_key: SecretString::from(secret_key),
            webhook_secret: SecretString::from(webhook_secret),
            price_standard,
            price_premium,
        }))
    }
}

impl MetaConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some([app_id, app_secret]) = load_group(&["META_APP_ID", "META_APP_SECRET"])? else {
            return Ok(None);
        };
        validate_secret_strength(&app_secret, "META_APP_SECRET")?;

        Ok(Some(Self {
            app_id,
            app_secret: SecretString::from(app_secret),
            api_version: get_env_or_default("META_API_VERSION", DEFAULT_META_API_VERSION),
        }))
    }
}

impl GoogleConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some([client_id, client_secret]) =
            load_group(&["GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"])?
        else {
            return Ok(None);
        };
        validate_secret_strength(&client_secret, "GOOGLE_CLIENT_SECRET")?;

        Ok(Some(Self {
            client_id,
            client_secret: SecretString::from(client_secret),
        }))
    }
}

impl OpenAIConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_key) = get_optional_env("OPENAI_API_KEY") else {
            return Ok(None);
        };
        validate_secret_strength(&api_key, "OPENAI_API_KEY")?;
        Ok(Some(Self {
            api_key: SecretString::from(api_key),
            model: get_env_or_default("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
        }))
    }
}

impl GeminiConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_key) = get_optional_env("GEMINI_API_KEY") else {
            return Ok(None);
        };
        validate_secret_strength(&api_key, "GEMINI_API_KEY")?;
        Ok(Some(Self {
            api_key: SecretString::from(api_key),
            model: get_env_or_default("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
        }))
    }
}

impl TlsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        Ok(
            load_group(&["WINQER_TLS_CERT", "WINQER_TLS_KEY"])?.map(|[cert, key]| Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            }),
        )
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Load a group of variables that must be set together.
///
/// Returns `None` when none are set and an error when only some are.
fn load_group<const N: usize>(keys: &[&str; N]) -> Result<Option<[String; N]>, ConfigError> {
    resolve_group(keys, get_optional_env)
}

fn resolve_group<const N: usize>(
    keys: &[&str; N],
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<[String; N]>, ConfigError> {
    let values = (*keys).map(|key| lookup(key));
    let set = values.iter().filter(|v| v.is_some()).count();

    if set == 0 {
        return Ok(None);
    }
    if set < N {
        let missing = keys
            .iter()
            .zip(values.iter())
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| *k)
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ConfigError::InvalidEnvVar(
            keys.join("/"),
            format!("must be set together (missing: {missing})"),
        ));
    }

    Ok(Some(values.map(Option::unwrap_or_default)))
}

/// Validate a URL and strip any trailing slash.
fn normalize_url(key: &str, value: &str) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an http(s) URL".to_string(),
        ));
    }
    Ok(value.trim_end_matches('/').to_string())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
