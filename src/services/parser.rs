use serde_json::Value;

use crate::error::IngestError;
use crate::models::CandidateTransaction;

/// Decodes the raw model response into unvalidated candidates.
///
/// The response must be a non-empty JSON array; anything else is a fatal
/// parse failure. Individual elements are not validated here — a candidate
/// with missing or mistyped fields is handed through so the ingestion loop
/// can record it as a per-item failure without aborting the batch.
pub fn parse_candidates(raw: &str) -> Result<Vec<CandidateTransaction>, IngestError> {
    let cleaned = strip_code_fences(raw);

    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| IngestError::MalformedExtraction(format!("invalid JSON: {}", e)))?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(IngestError::MalformedExtraction(format!(
                "expected a JSON array, got {}",
                json_shape(&other)
            )))
        }
    };

    if items.is_empty() {
        return Err(IngestError::MalformedExtraction(
            "no transactions found in the image".to_string(),
        ));
    }

    Ok(items.into_iter().map(candidate_from_value).collect())
}

/// Models sometimes wrap the JSON in a markdown fence despite instructions.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the language tag on the opening fence line, if any.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn candidate_from_value(value: Value) -> CandidateTransaction {
    match value {
        Value::Object(mut map) => CandidateTransaction {
            merchant: map.remove("merchant"),
            amount: map.remove("amount"),
            date: map.remove("date"),
            category: map.remove("category"),
        },
        // Non-object elements carry nothing usable; they fail field
        // validation downstream instead of aborting the batch here.
        _ => CandidateTransaction {
            merchant: None,
            amount: None,
            date: None,
            category: None,
        },
    }
}

fn json_shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
