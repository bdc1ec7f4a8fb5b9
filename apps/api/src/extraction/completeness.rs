use serde_json::{json, Value};

/// Fields a usable lender policy extraction must carry. The completeness
/// score is the fraction of these present and non-null.
const REQUIRED_FIELDS: &[&str] = &["loan_types", "interest_rates", "eligibility_criteria"];

/// Attaches a `_validation` block to extracted lender data: a per-field
/// presence map plus an overall completeness score.
///
/// Non-object payloads (degraded envelopes are always objects, so this only
/// covers pathological LLM output) are returned unchanged.
pub fn enrich_with_validation(mut data: Value) -> Value {
    let Some(map) = data.as_object_mut() else {
        return data;
    };

    let field_completeness: serde_json::Map<String, Value> = REQUIRED_FIELDS
        .iter()
        .map(|field| {
            let present = map.get(*field).map(|v| !v.is_null()).unwrap_or(false);
            (field.to_string(), Value::Bool(present))
        })
        .collect();

    let present_count = field_completeness
        .values()
        .filter(|v| v.as_bool().unwrap_or(false))
        .count();
    let completeness_score = present_count as f64 / REQUIRED_FIELDS.len() as f64;

    map.insert(
        "_validation".to_string(),
        json!({
            "field_completeness": field_completeness,
            "completeness_score": completeness_score,
        }),
    );

    data
}
