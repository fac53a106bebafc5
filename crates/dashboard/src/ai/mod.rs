//! Ad creative generation with `OpenAI` or Gemini.
//!
//! A [`CreativeRequest`] plus the store's current winning Meta ads become a
//! prompt; the model answers in JSON which is parsed into [`AdCreative`]s.

mod gemini;
mod openai;
mod prompt;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use prompt::{build_prompt, parse_creatives};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::config::DashboardConfig;
use crate::meta::ScoredAd;

/// Longest accepted product description, in characters.
pub const MAX_PRODUCT_CHARS: usize = 500;

/// Errors that can occur during creative generation.
#[derive(Debug, Error)]
pub enum AiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error.
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: AiProvider,
        status: u16,
        message: String,
    },

    /// Provider rate limit or quota reached.
    #[error("{0} rate limit reached")]
    RateLimited(AiProvider),

    /// The provider has no API key configured.
    #[error("{0} is not configured")]
    ProviderNotConfigured(AiProvider),

    /// The request itself is unusable.
    #[error("invalid creative request: {0}")]
    InvalidRequest(String),

    /// The model answer was not the expected JSON.
    #[error("could not parse model output: {0}")]
    Parse(String),
}

/// Which model vendor writes the copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    OpenAi,
    Gemini,
}

impl std::fmt::Display for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "OpenAI"),
            Self::Gemini => write!(f, "Gemini"),
        }
    }
}

const fn default_variants() -> u8 {
    3
}

/// What the store admin asked for.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeRequest {
    /// Product or offer being advertised.
    pub product: String,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    /// Output language, e.g. "Japanese". Defaults to the product text's language.
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_variants")]
    pub variants: u8,
    /// Falls back to whichever provider is configured.
    #[serde(default)]
    pub provider: Option<AiProvider>,
}

impl CreativeRequest {
    /// Check the request against the plan's variant limit.
    ///
    /// # Errors
    ///
    /// Returns `AiError::InvalidRequest` describing the first problem.
    pub fn validate(&self, max_variants: u8) -> Result<(), AiError> {
        let product = self.product.trim();
        if product.is_empty() {
            return Err(AiError::InvalidRequest("product is required".to_string()));
        }
        if product.chars().count() > MAX_PRODUCT_CHARS {
            return Err(AiError::InvalidRequest(format!(
                "product must be at most {MAX_PRODUCT_CHARS} characters"
            )));
        }
        if self.variants == 0 || self.variants > max_variants {
            return Err(AiError::InvalidRequest(format!(
                "variants must be between 1 and {max_variants}"
            )));
        }
        Ok(())
    }
}

/// One generated ad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdCreative {
    pub headline: String,
    #[serde(alias = "primary_text")]
    pub primary_text: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "image_prompt")]
    pub image_prompt: String,
}

/// Dispatches creative requests to the configured providers.
#[derive(Debug, Clone, Default)]
pub struct CreativeGenerator {
    openai: Option<OpenAiClient>,
    gemini: Option<GeminiClient>,
}

impl CreativeGenerator {
    /// Build from configuration; unconfigured providers are left out.
    #[must_use]
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            openai: config.openai.as_ref().map(OpenAiClient::new),
            gemini: config.gemini.as_ref().map(GeminiClient::new),
        }
    }

    /// Whether any provider is available.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.openai.is_some() || self.gemini.is_some()
    }

    fn resolve(&self, requested: Option<AiProvider>) -> Result<AiProvider, AiError> {
        match requested {
            Some(AiProvider::OpenAi) if self.openai.is_none() => {
                Err(AiError::ProviderNotConfigured(AiProvider::OpenAi))
            }
            Some(AiProvider::Gemini) if self.gemini.is_none() => {
                Err(AiError::ProviderNotConfigured(AiProvider::Gemini))
            }
            Some(provider) => Ok(provider),
            None if self.openai.is_some() => Ok(AiProvider::OpenAi),
            None if self.gemini.is_some() => Ok(AiProvider::Gemini),
            None => Err(AiError::ProviderNotConfigured(AiProvider::default())),
        }
    }

    /// Generate creatives for a validated request.
    ///
    /// # Errors
    ///
    /// Returns an error if no provider is available, the call fails, or the
    /// answer cannot be parsed.
    #[instrument(skip_all, fields(variants = request.variants, winners = winners.len()))]
    pub async fn generate(
        &self,
        request: &CreativeRequest,
        winners: &[ScoredAd],
    ) -> Result<(AiProvider, Vec<AdCreative>), AiError> {
        let provider = self.resolve(request.provider)?;
        let (system, user) = build_prompt(request, winners);

        let raw = match (provider, &self.openai, &self.gemini) {
            (AiProvider::OpenAi, Some(client), _) => client.complete_json(&system, &user).await?,
            (AiProvider::Gemini, _, Some(client)) => client.generate_json(&system, &user).await?,
            _ => return Err(AiError::ProviderNotConfigured(provider)),
        };

        let creatives = parse_creatives(&raw, usize::from(request.variants))?;
        Ok((provider, creatives))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreativeRequest {
        serde_json::from_str(r#"{"product": "Seasonal strawberry tart"}"#).expect("request")
    }

    #[test]
    fn test_request_defaults() {
        let req = request();
        assert_eq!(req.variants, 3);
        assert!(req.provider.is_none());
        assert!(req.validate(3).is_ok());
    }

    #[test]
    fn test_request_validation() {
        let mut req = request();
        req.variants = 4;
        assert!(matches!(req.validate(3), Err(AiError::InvalidRequest(_))));

        req.variants = 1;
        req.product = "   ".to_string();
        assert!(req.validate(3).is_err());

        req.product = "x".repeat(MAX_PRODUCT_CHARS + 1);
        assert!(req.validate(3).is_err());
    }

    #[test]
    fn test_provider_resolution() {
        let none = CreativeGenerator::default();
        assert!(!none.is_configured());
        assert!(matches!(
            none.resolve(None),
            Err(AiError::ProviderNotConfigured(AiProvider::OpenAi))
        ));

        let gemini_only = CreativeGenerator {
            openai: None,
            gemini: Some(GeminiClient::new(&crate::config::GeminiConfig {
                api_key: secrecy::SecretString::from("gemini-key"),
                model: "gemini-2.0-flash".to_string(),
            })),
        };
        assert_eq!(gemini_only.resolve(None).expect("gemini"), AiProvider::Gemini);
        assert!(gemini_only.resolve(Some(AiProvider::OpenAi)).is_err());
    }

    #[test]
    fn test_provider_serde() {
        let provider: AiProvider = serde_json::from_str(r#""gemini""#).expect("provider");
        assert_eq!(provider, AiProvider::Gemini);
        assert_eq!(serde_json::to_string(&AiProvider::OpenAi).expect("json"), r#""openai""#);
    }
}
