//! Structured-reply parsing for model output.
//!
//! Models often wrap JSON in Markdown fences or surround it with prose. The
//! helpers here cut out the JSON object before handing it to serde.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

/// Return the JSON object embedded in `text`.
///
/// Prefers the body of the first fenced code block; otherwise takes the span
/// from the first `{` to the last `}`; otherwise returns the trimmed text.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```") {
        let body = &trimmed[start + 3..];
        let body = body
            .strip_prefix("json")
            .or_else(|| body.strip_prefix("JSON"))
            .unwrap_or(body);
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Parse a model reply into `T`.
pub fn parse_reply<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(extract_json(text))
}

/// Accept a number or a numeric string; anything else becomes `None`.
///
/// Use with `#[serde(default, deserialize_with = "lenient_number")]`.
pub fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Scored {
        #[serde(default, deserialize_with = "lenient_number")]
        score: Option<f64>,
        #[serde(default)]
        reason: String,
    }

    #[test]
    fn extracts_fenced_json() {
        let text = "Here you go:\n```json\n{\"score\": 8}\n```\nThanks";
        assert_eq!(extract_json(text), "{\"score\": 8}");
    }

    #[test]
    fn extracts_unlabelled_fence() {
        let text = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json(text), "{\"a\": 1}");
    }

    #[test]
    fn extracts_braced_span_from_prose() {
        let text = "Sure! {\"score\": 7, \"reason\": \"ok\"} Hope that helps.";
        let parsed: Scored = parse_reply(text).unwrap();
        assert_eq!(parsed.score, Some(7.0));
        assert_eq!(parsed.reason, "ok");
    }

    #[test]
    fn lenient_number_accepts_strings() {
        let parsed: Scored = parse_reply(r#"{"score": " 6.5 "}"#).unwrap();
        assert_eq!(parsed.score, Some(6.5));
        let parsed: Scored = parse_reply(r#"{"score": "high"}"#).unwrap();
        assert_eq!(parsed.score, None);
        let parsed: Scored = parse_reply(r#"{"reason": "missing"}"#).unwrap();
        assert_eq!(parsed.score, None);
    }

    #[test]
    fn malformed_reply_is_an_error() {
        assert!(parse_reply::<Scored>("no json here").is_err());
        assert!(parse_reply::<Scored>("{ not valid }").is_err());
    }
}
