//! Prompt construction and model output parsing.

use std::fmt::Write as _;

use super::{AdCreative, AiError, CreativeRequest};
use crate::meta::ScoredAd;

/// At most this many winning ads are quoted in the prompt.
const MAX_EXAMPLE_ADS: usize = 5;

const SYSTEM_PROMPT: &str = "You are a performance marketing copywriter for local businesses \
running Meta (Facebook/Instagram) ads. Write concise, specific ad copy. \
Answer with a single JSON object of the form \
{\"creatives\": [{\"headline\": string, \"primaryText\": string, \
\"description\": string, \"imagePrompt\": string}]} and nothing else.";

/// Build `(system, user)` prompts for a request.
///
/// Winning ads (already sorted best first) are quoted with their CTR so the
/// model can imitate what works for this store.
#[must_use]
pub fn build_prompt(request: &CreativeRequest, winners: &[ScoredAd]) -> (String, String) {
    let mut user = String::new();

    let _ = writeln!(
        user,
        "Write {} distinct ad variants for: {}",
        request.variants,
        request.product.trim()
    );
    if let Some(audience) = request.audience.as_deref().filter(|a| !a.trim().is_empty()) {
        let _ = writeln!(user, "Target audience: {}", audience.trim());
    }
    if let Some(tone) = request.tone.as_deref().filter(|t| !t.trim().is_empty()) {
        let _ = writeln!(user, "Tone: {}", tone.trim());
    }
    if let Some(language) = request.language.as_deref().filter(|l| !l.trim().is_empty()) {
        let _ = writeln!(user, "Write in {}.", language.trim());
    }

    let examples: Vec<&ScoredAd> = winners
        .iter()
        .filter(|ad| ad.performance.is_winner)
        .take(MAX_EXAMPLE_ADS)
        .collect();
    if !examples.is_empty() {
        let _ = writeln!(user, "\nThese ads from the same store perform best:");
        for ad in examples {
            let _ = writeln!(
                user,
                "- \"{}\" (score {}, CTR {:.2}%, {} landing page views)",
                ad.insight.ad_name, ad.performance.score, ad.metrics.ctr, ad.metrics.landing_page_views
            );
        }
        let _ = writeln!(user, "Keep what makes them work, but do not copy them.");
    }

    let _ = write!(
        user,
        "\nHeadlines at most 40 characters, primary text at most 125 characters. \
         imagePrompt describes a photo for an image model."
    );

    (SYSTEM_PROMPT.to_string(), user)
}

/// Parse model output into at most `limit` creatives.
///
/// Accepts `{"creatives": [...]}`, a bare array, and JSON wrapped in a
/// Markdown code fence.
///
/// # Errors
///
/// Returns `AiError::Parse` if no creative can be read.
pub fn parse_creatives(raw: &str, limit: usize) -> Result<Vec<AdCreative>, AiError> {
    let text = strip_code_fence(raw.trim());

    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| AiError::Parse(e.to_string()))?;
    let list = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut obj) => match obj.remove("creatives") {
            Some(serde_json::Value::Array(items)) => items,
            _ => return Err(AiError::Parse("missing \"creatives\" array".to_string())),
        },
        _ => return Err(AiError::Parse("expected a JSON object or array".to_string())),
    };

    let creatives: Vec<AdCreative> = list
        .into_iter()
        .map(serde_json::from_value::<AdCreative>)
        .collect::<Result<_, _>>()
        .map_err(|e| AiError::Parse(e.to_string()))?;

    let creatives: Vec<AdCreative> = creatives
        .into_iter()
        .filter(|c| !c.headline.trim().is_empty() && !c.primary_text.trim().is_empty())
        .take(limit)
        .collect();

    if creatives.is_empty() {
        return Err(AiError::Parse("no usable creatives".to_string()));
    }
    Ok(creatives)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an info string such as `json`.
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
