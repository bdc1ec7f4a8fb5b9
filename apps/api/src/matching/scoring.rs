//! Match Scoring — pluggable, trait-based scorer that measures a processed
//! loan application against a processed lender policy.
//!
//! The orchestrator holds an `Arc<dyn MatchScorer>`, so tests fan out against
//! scripted scorers while production uses `LlmMatchScorer`.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::{strip_json_fences, LlmClient, MODEL, TEMPERATURE};
use crate::matching::prompts::{MATCH_SCORING_PROMPT, MATCH_SCORING_SYSTEM};

/// Result of scoring one (application, lender) pair: the 0-100 score plus the
/// full analysis blob stored on the match record.
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub match_score: f64,
    pub match_analysis: Value,
}

/// The scorer seam. One call per (application, lender) pair; an error is
/// fatal for that pair only and never aborts the batch.
#[async_trait]
pub trait MatchScorer: Send + Sync {
    async fn score(
        &self,
        application_data: &Value,
        lender_data: &Value,
        lender_name: &str,
    ) -> Result<MatchReport, AppError>;
}

/// Production scorer: one LLM call over the ten-criterion comparison prompt.
pub struct LlmMatchScorer {
    llm: LlmClient,
}

impl LlmMatchScorer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl MatchScorer for LlmMatchScorer {
    async fn score(
        &self,
        application_data: &Value,
        lender_data: &Value,
        lender_name: &str,
    ) -> Result<MatchReport, AppError> {
        if is_empty_payload(application_data) {
            return Err(AppError::Validation(
                "Application data is empty".to_string(),
            ));
        }
        if is_empty_payload(lender_data) {
            return Err(AppError::Validation("Lender data is empty".to_string()));
        }

        let prompt = MATCH_SCORING_PROMPT
            .replace("{lender_name}", lender_name)
            .replace(
                "{lender_data}",
                &serde_json::to_string_pretty(lender_data).unwrap_or_default(),
            )
            .replace(
                "{application_data}",
                &serde_json::to_string_pretty(application_data).unwrap_or_default(),
            );

        let response = self
            .llm
            .call(&prompt, MATCH_SCORING_SYSTEM)
            .await
            .map_err(|e| AppError::Llm(format!("Match calculation failed: {e}")))?;

        let text = response.text().unwrap_or_default();
        let mut analysis = parse_match_analysis(text);
        let match_score = analysis
            .get("match_score")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .clamp(0.0, 100.0);

        if let Some(map) = analysis.as_object_mut() {
            // Models occasionally omit the band; derive it from the score.
            map.entry("match_category")
                .or_insert_with(|| json!(match_category(match_score)));
            map.insert(
                "_metadata".to_string(),
                json!({
                    "model": MODEL,
                    "temperature": TEMPERATURE,
                    "tokens_used": response.total_tokens(),
                    "lender_name": lender_name,
                    "calculation_successful": true,
                }),
            );
        }

        info!("Match calculation completed for {lender_name}. Score: {match_score}/100");

        Ok(MatchReport {
            match_score,
            match_analysis: analysis,
        })
    }
}

/// Parses the model's analysis, falling back to a zero-score error envelope
/// when the JSON is malformed — the attempt is recorded, never lost.
pub(crate) fn parse_match_analysis(text: &str) -> Value {
    let stripped = strip_json_fences(text);
    match serde_json::from_str::<Value>(stripped) {
        Ok(value) if value.is_object() => value,
        _ => {
            warn!("Failed to parse match analysis as JSON");
            json!({
                "match_score": 0,
                "match_category": "error",
                "error": "Failed to parse response",
                "raw_response": text,
            })
        }
    }
}

/// Maps a 0-100 score to its categorical band.
pub fn match_category(score: f64) -> &'static str {
    match score {
        s if s >= 90.0 => "excellent",
        s if s >= 75.0 => "very_good",
        s if s >= 60.0 => "good",
        s if s >= 40.0 => "fair",
        s if s >= 20.0 => "poor",
        _ => "very_poor",
    }
}

fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_band_edges() {
        assert_eq!(match_category(100.0), "excellent");
        assert_eq!(match_category(90.0), "excellent");
        assert_eq!(match_category(89.9), "very_good");
        assert_eq!(match_category(75.0), "very_good");
        assert_eq!(match_category(60.0), "good");
        assert_eq!(match_category(59.9), "fair");
        assert_eq!(match_category(40.0), "fair");
        assert_eq!(match_category(20.0), "poor");
        assert_eq!(match_category(19.9), "very_poor");
        assert_eq!(match_category(0.0), "very_poor");
    }

    #[test]
    fn test_valid_analysis_passes_through() {
        let analysis = parse_match_analysis(r#"{"match_score": 82, "match_category": "very_good"}"#);
        assert_eq!(analysis["match_score"], 82);
        assert!(analysis.get("error").is_none());
    }

    #[test]
    fn test_malformed_analysis_becomes_zero_score_envelope() {
        let analysis = parse_match_analysis("I cannot score this match.");
        assert_eq!(analysis["match_score"], 0);
        assert_eq!(analysis["match_category"], "error");
        assert_eq!(analysis["raw_response"], "I cannot score this match.");
    }

    #[test]
    fn test_fenced_analysis_is_unwrapped() {
        let analysis = parse_match_analysis("```json\n{\"match_score\": 55}\n```");
        assert_eq!(analysis["match_score"], 55);
    }

    #[test]
    fn test_empty_payload_detection() {
        assert!(is_empty_payload(&Value::Null));
        assert!(is_empty_payload(&json!({})));
        assert!(!is_empty_payload(&json!({"loan_type": "home"})));
    }
}
