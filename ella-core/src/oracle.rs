//! Narrow capability interface over the generative oracle.
//!
//! Selection and ending-arbitration policy only ever see `generate` and
//! `judge`, so they can be exercised with a deterministic stub (see
//! [`crate::testing::MockOracle`]) and never touch network or timeout
//! concerns directly.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Errors from oracle calls.
///
/// A judgment that cannot be parsed, or that carries values outside the
/// declared enumerations, is a failure to be propagated — never defaulted.
/// The ending-mode rubric evaluators are the one place a caller recovers
/// locally (see [`crate::ending`]).
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("chat API error: {0}")]
    Api(#[from] openai::Error),

    #[error("no JSON object found in oracle reply")]
    MissingJson,

    #[error("malformed judgment: {0}")]
    MalformedJudgment(String),
}

/// A structured judgment elicited from the oracle.
#[derive(Debug, Clone, Deserialize)]
pub struct Judgment {
    /// Complexity/engagement score, declared range 0-10.
    #[serde(alias = "complexity_score")]
    pub score: f32,
    pub support_level: String,
    #[serde(default)]
    pub selected_technique: Option<String>,
}

/// The generative oracle capability.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Generate free text from a system instruction and user content.
    async fn generate(
        &self,
        system: &str,
        user: &str,
        max_tokens: usize,
        temperature: f32,
    ) -> Result<String, OracleError>;

    /// Elicit a structured judgment. The first brace-delimited object in
    /// the reply is extracted, tolerating surrounding prose.
    async fn judge(&self, system: &str, user: &str) -> Result<Judgment, OracleError> {
        let text = self.generate(system, user, 150, 0.2).await?;
        parse_judgment(&text)
    }
}

/// Parse a judgment out of free oracle text.
pub fn parse_judgment(text: &str) -> Result<Judgment, OracleError> {
    let json = extract_json_object(text).ok_or(OracleError::MissingJson)?;
    serde_json::from_str(json).map_err(|e| OracleError::MalformedJudgment(e.to_string()))
}

/// Extract the first brace-delimited object from a reply, spanning to the
/// last closing brace so nested objects survive.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[async_trait]
impl Oracle for openai::OpenAi {
    async fn generate(
        &self,
        system: &str,
        user: &str,
        max_tokens: usize,
        temperature: f32,
    ) -> Result<String, OracleError> {
        let request = openai::ChatRequest::new(vec![openai::ChatMessage::user(user)])
            .with_system(system)
            .with_max_tokens(max_tokens)
            .with_temperature(temperature);

        let completion = self.complete(request).await?;
        Ok(completion.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Oracle that always replies with the same text; exercises the
    /// default `judge` path.
    struct CannedOracle(&'static str);

    #[async_trait]
    impl Oracle for CannedOracle {
        async fn generate(
            &self,
            _system: &str,
            _user: &str,
            _max_tokens: usize,
            _temperature: f32,
        ) -> Result<String, OracleError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_extract_json_object_with_prose() {
        let text = "Sure! Here you go: {\"score\": 7, \"support_level\": \"low\"} Hope it helps.";
        assert_eq!(
            extract_json_object(text),
            Some("{\"score\": 7, \"support_level\": \"low\"}")
        );
    }

    #[test]
    fn test_extract_json_object_missing() {
        assert!(extract_json_object("no braces here").is_none());
        assert!(extract_json_object("} reversed {").is_none());
    }

    #[test]
    fn test_parse_judgment_accepts_complexity_score_alias() {
        let judgment = parse_judgment(
            "{\"complexity_score\": 6, \"support_level\": \"low\", \"selected_technique\": \"reasoning\"}",
        )
        .unwrap();
        assert_eq!(judgment.score, 6.0);
        assert_eq!(judgment.support_level, "low");
        assert_eq!(judgment.selected_technique.as_deref(), Some("reasoning"));
    }

    #[test]
    fn test_parse_judgment_missing_score_is_error() {
        let result = parse_judgment("{\"support_level\": \"low\"}");
        assert!(matches!(result, Err(OracleError::MalformedJudgment(_))));
    }

    #[tokio::test]
    async fn test_default_judge_extracts_from_prose() {
        let oracle =
            CannedOracle("The rubric says {\"score\": 3, \"support_level\": \"high\"} overall.");
        let judgment = oracle.judge("sys", "user").await.unwrap();
        assert_eq!(judgment.score, 3.0);
        assert_eq!(judgment.support_level, "high");
    }

    #[tokio::test]
    async fn test_default_judge_rejects_plain_text() {
        let oracle = CannedOracle("I would rate this a seven out of ten.");
        assert!(matches!(
            oracle.judge("sys", "user").await,
            Err(OracleError::MissingJson)
        ));
    }
}
