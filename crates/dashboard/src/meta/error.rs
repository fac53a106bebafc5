//! Meta Graph API errors.

use thiserror::Error;

/// Errors that can occur when calling the Graph API.
#[derive(Debug, Error)]
pub enum MetaError {
    /// HTTP request failed.
    #[error("Meta request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Graph API returned an error object.
    #[error("Meta API error ({code}): {message}")]
    Api {
        /// Graph error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// The stored token was revoked or expired (code 190).
    #[error("Meta access token expired or revoked")]
    TokenExpired,

    /// Application or account request limit reached.
    #[error("Meta rate limit reached")]
    RateLimited,

    /// Failed to parse a response.
    #[error("Meta response error: {0}")]
    Parse(String),

    /// Failed to build a request URL.
    #[error("invalid Meta URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Graph API error envelope.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct GraphErrorResponse {
    pub error: GraphError,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct GraphError {
    pub message: String,
    #[serde(default)]
    pub code: i64,
}

impl From<GraphError> for MetaError {
    fn from(err: GraphError) -> Self {
        match err.code {
            190 => Self::TokenExpired,
            // Application, user, and ad account level throttling.
            4 | 17 | 32 | 613 | 80_004 => Self::RateLimited,
            code => Self::Api {
                code,
                message: err.message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_mapping() {
        let json = r#"{"error":{"message":"Error validating access token","type":"OAuthException","code":190}}"#;
        let parsed: GraphErrorResponse = serde_json::from_str(json).expect("deserialize");
        assert!(matches!(MetaError::from(parsed.error), MetaError::TokenExpired));

        let throttled = GraphError {
            message: "User request limit reached".to_string(),
            code: 17,
        };
        assert!(matches!(MetaError::from(throttled), MetaError::RateLimited));

        let other = GraphError {
            message: "Unsupported get request".to_string(),
            code: 100,
        };
        assert_eq!(
            MetaError::from(other).to_string(),
            "Meta API error (100): Unsupported get request"
        );
    }
}
