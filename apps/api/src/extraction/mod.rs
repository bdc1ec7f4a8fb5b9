//! Structured extraction: raw OCR text → structured JSON via the LLM.
//!
//! The "never lose data" policy: malformed LLM output is stored as a degraded
//! error envelope instead of being raised, so a document that produced
//! unparseable output survives as a record the client can inspect.

pub mod completeness;
pub mod prompts;
pub mod worker;

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::{strip_json_fences, LlmClient, LlmResponse, MODEL, TEMPERATURE};
use crate::extraction::prompts::{
    APPLICATION_EXTRACTION_PROMPT, APPLICATION_EXTRACTION_SYSTEM, LENDER_EXTRACTION_PROMPT,
    LENDER_EXTRACTION_SYSTEM,
};

/// Extracts structured policy terms from a lender document's raw text.
pub async fn process_lender_document(
    llm: &LlmClient,
    raw_text: &str,
    lender_name: &str,
) -> Result<Value, AppError> {
    if raw_text.trim().is_empty() {
        return Err(AppError::Validation("Raw text is empty".to_string()));
    }

    info!("Starting LLM extraction for lender: {lender_name}");

    let prompt = LENDER_EXTRACTION_PROMPT
        .replace("{lender_name}", lender_name)
        .replace("{raw_text}", raw_text);

    let response = llm
        .call(&prompt, LENDER_EXTRACTION_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(format!("Lender extraction failed: {e}")))?;

    Ok(structured_output(&response))
}

/// Extracts a structured applicant profile from a loan application's raw text.
pub async fn process_application_document(
    llm: &LlmClient,
    raw_text: &str,
    applicant_name: &str,
) -> Result<Value, AppError> {
    if raw_text.trim().is_empty() {
        return Err(AppError::Validation("Raw text is empty".to_string()));
    }

    info!("Starting LLM extraction for loan application: {applicant_name}");

    let prompt = APPLICATION_EXTRACTION_PROMPT
        .replace("{applicant_name}", applicant_name)
        .replace("{raw_text}", raw_text);

    let response = llm
        .call(&prompt, APPLICATION_EXTRACTION_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(format!("Application extraction failed: {e}")))?;

    Ok(structured_output(&response))
}

fn structured_output(response: &LlmResponse) -> Value {
    let text = response.text().unwrap_or_default();
    let mut data = parse_or_envelope(text);
    attach_metadata(&mut data, response);
    info!(
        "LLM extraction completed. Tokens used: {}",
        response.total_tokens()
    );
    data
}

/// Parses the model's text output as a JSON object, falling back to a
/// degraded envelope carrying the raw response when parsing fails. The
/// envelope keeps the record alive; the `error` key marks it as degraded.
pub(crate) fn parse_or_envelope(text: &str) -> Value {
    let stripped = strip_json_fences(text);
    match serde_json::from_str::<Value>(stripped) {
        Ok(value) if value.is_object() => value,
        Ok(_) => {
            warn!("LLM returned valid JSON that is not an object");
            degraded_envelope(text)
        }
        Err(e) => {
            warn!("Failed to parse LLM response as JSON: {e}");
            degraded_envelope(text)
        }
    }
}

fn degraded_envelope(raw: &str) -> Value {
    json!({
        "error": "Failed to parse response",
        "raw_response": raw,
    })
}

/// Attaches processing metadata under the consumer-invisible-by-convention
/// `_metadata` key.
pub(crate) fn attach_metadata(data: &mut Value, response: &LlmResponse) {
    if let Some(map) = data.as_object_mut() {
        map.insert(
            "_metadata".to_string(),
            metadata_object(response.total_tokens()),
        );
    }
}

fn metadata_object(tokens_used: u32) -> Value {
    let mut meta = Map::new();
    meta.insert("model".to_string(), json!(MODEL));
    meta.insert("temperature".to_string(), json!(TEMPERATURE));
    meta.insert("tokens_used".to_string(), json!(tokens_used));
    meta.insert("processing_successful".to_string(), json!(true));
    Value::Object(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_json_object_passes_through() {
        let parsed = parse_or_envelope(r#"{"loan_types": ["home"]}"#);
        assert_eq!(parsed["loan_types"][0], "home");
        assert!(parsed.get("error").is_none());
    }

    #[test]
    fn test_fenced_json_is_unwrapped() {
        let parsed = parse_or_envelope("```json\n{\"loan_types\": null}\n```");
        assert!(parsed.get("loan_types").is_some());
    }

    #[test]
    fn test_malformed_json_becomes_degraded_envelope() {
        let raw = "Sorry, I could not process that document.";
        let parsed = parse_or_envelope(raw);
        assert_eq!(parsed["error"], "Failed to parse response");
        assert_eq!(parsed["raw_response"], raw);
    }

    #[test]
    fn test_non_object_json_becomes_degraded_envelope() {
        let parsed = parse_or_envelope(r#"[1, 2, 3]"#);
        assert_eq!(parsed["error"], "Failed to parse response");
    }

    #[test]
    fn test_metadata_carries_model_and_tokens() {
        let meta = metadata_object(1234);
        assert_eq!(meta["model"], MODEL);
        assert_eq!(meta["tokens_used"], 1234);
        assert_eq!(meta["processing_successful"], true);
    }
}
