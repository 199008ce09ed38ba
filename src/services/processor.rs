use chrono::NaiveDate;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::db::Database;
use crate::error::IngestError;
use crate::models::{
    CandidateTransaction, IngestionFailure, IngestionReport, Transaction, UploadedImage,
};
use crate::services::openai::TransactionExtractor;
use crate::services::parser::parse_candidates;
use crate::services::report::build_report;
use crate::utils::{now_rfc3339, parse_date, sha256_bytes};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Runs one upload through the whole pipeline: validate the image, call the
/// extractor, parse its response, then persist each candidate independently.
/// A single bad candidate never aborts the batch; a batch where nothing
/// could be saved is a fatal error.
pub async fn ingest<E>(
    db: &Arc<Mutex<Database>>,
    extractor: &E,
    image: &UploadedImage,
) -> Result<IngestionReport, IngestError>
where
    E: TransactionExtractor + ?Sized,
{
    validate_upload(image)?;

    let content_hash = sha256_bytes(&image.bytes);
    tracing::info!(
        mime = %image.mime_type,
        bytes = image.bytes.len(),
        hash = %&content_hash[..12],
        file = image.file_name.as_deref().unwrap_or("-"),
        "processing upload"
    );

    let raw = extractor
        .extract(image)
        .await
        .map_err(IngestError::ExtractionUnavailable)?;
    let candidates = parse_candidates(&raw)?;
    let found = candidates.len();
    tracing::info!(candidates = found, "extraction returned candidates");

    let mut saved = Vec::new();
    let mut failures = Vec::new();
    for candidate in candidates {
        match ingest_candidate(db, &candidate) {
            Ok(transaction) => saved.push(transaction),
            Err(reason) => {
                tracing::warn!(%reason, "skipping candidate");
                failures.push(IngestionFailure { candidate, reason });
            }
        }
    }

    tracing::info!(saved = saved.len(), failed = failures.len(), "batch finished");

    if saved.is_empty() {
        return Err(IngestError::BatchExhausted { found, failures });
    }

    Ok(build_report(found, saved, failures))
}

pub fn validate_upload(image: &UploadedImage) -> Result<(), IngestError> {
    if !image.mime_type.starts_with("image/") {
        return Err(IngestError::InputRejected(format!(
            "unsupported content type: {}",
            image.mime_type
        )));
    }
    if image.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(IngestError::InputRejected(format!(
            "file too large: {} bytes (limit {})",
            image.bytes.len(),
            MAX_UPLOAD_BYTES
        )));
    }
    Ok(())
}

/// Validates one candidate, resolves its category and writes the
/// transaction. Every problem, including a storage error, comes back as a
/// reason string so the caller can record it and move on.
fn ingest_candidate(
    db: &Arc<Mutex<Database>>,
    candidate: &CandidateTransaction,
) -> Result<Transaction, String> {
    let (merchant, amount, date, label) = validate_candidate(candidate)?;

    let db = db
        .lock()
        .map_err(|_| "database lock poisoned".to_string())?;

    let category_id = match label {
        Some(name) => Some(
            db.find_or_create_category(&name)
                .map_err(|e| format!("could not resolve category '{}': {}", name, e))?
                .id,
        ),
        None => None,
    };

    let transaction = Transaction {
        id: uuid::Uuid::new_v4().to_string(),
        merchant,
        amount,
        date,
        description: None,
        category_id,
        created_at: now_rfc3339(),
    };

    db.insert_transaction(&transaction)
        .map_err(|e| format!("could not save transaction: {}", e))?;

    Ok(transaction)
}

fn validate_candidate(
    candidate: &CandidateTransaction,
) -> Result<(String, f64, NaiveDate, Option<String>), String> {
    let merchant = match &candidate.merchant {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::String(_)) | Some(Value::Null) | None => {
            return Err("missing or empty merchant".to_string())
        }
        Some(_) => return Err("merchant is not a string".to_string()),
    };

    let amount = match &candidate.amount {
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| "amount is not a representable number".to_string())?,
        Some(Value::Null) | None => return Err("missing amount".to_string()),
        Some(_) => return Err("amount is not a number".to_string()),
    };

    let date = match &candidate.date {
        Some(Value::String(s)) => {
            parse_date(s).ok_or_else(|| format!("invalid date: {}", s))?
        }
        Some(Value::Null) | None => return Err("missing date".to_string()),
        Some(_) => return Err("date is not a string".to_string()),
    };

    // Category is optional; a non-string label is treated as absent rather
    // than failing the item.
    let label = match &candidate.category {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    };

    Ok((merchant, amount, date, label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image(mime: &str, size: usize) -> UploadedImage {
        UploadedImage {
            bytes: vec![0u8; size],
            mime_type: mime.to_string(),
            file_name: None,
        }
    }

    fn candidate(merchant: Value, amount: Value, date: Value, category: Value) -> CandidateTransaction {
        CandidateTransaction {
            merchant: Some(merchant),
            amount: Some(amount),
            date: Some(date),
            category: Some(category),
        }
    }

    #[test]
    fn accepts_small_images() {
        assert!(validate_upload(&image("image/png", 1024)).is_ok());
        assert!(validate_upload(&image("image/jpeg", MAX_UPLOAD_BYTES)).is_ok());
    }

    #[test]
    fn rejects_non_image_content_types() {
        let err = validate_upload(&image("application/pdf", 1024)).unwrap_err();
        assert!(matches!(err, IngestError::InputRejected(_)));
    }

    #[test]
    fn rejects_oversize_uploads() {
        let err = validate_upload(&image("image/png", MAX_UPLOAD_BYTES + 1)).unwrap_err();
        assert!(matches!(err, IngestError::InputRejected(_)));
    }

    #[test]
    fn valid_candidate_passes_field_checks() {
        let c = candidate(
            json!("Cafe Luna"),
            json!(-12.5),
            json!("2024-03-15"),
            json!("Dining"),
        );
        let (merchant, amount, date, label) = validate_candidate(&c).unwrap();
        assert_eq!(merchant, "Cafe Luna");
        assert_eq!(amount, -12.5);
        assert_eq!(date.to_string(), "2024-03-15");
        assert_eq!(label.as_deref(), Some("Dining"));
    }

    #[test]
    fn null_merchant_is_missing() {
        let c = candidate(json!(null), json!(5.0), json!("2024-01-01"), json!("Other"));
        let reason = validate_candidate(&c).unwrap_err();
        assert!(reason.contains("merchant"));
    }

    #[test]
    fn string_amount_is_a_type_error() {
        let c = candidate(json!("Shop"), json!("12.50"), json!("2024-01-01"), json!(null));
        let reason = validate_candidate(&c).unwrap_err();
        assert_eq!(reason, "amount is not a number");
    }

    #[test]
    fn bad_calendar_date_is_rejected() {
        let c = candidate(json!("Shop"), json!(1.0), json!("2024-02-30"), json!(null));
        let reason = validate_candidate(&c).unwrap_err();
        assert!(reason.contains("invalid date"));
    }

    #[test]
    fn null_category_means_uncategorized() {
        let c = candidate(json!("Shop"), json!(1.0), json!("2024-01-01"), json!(null));
        let (_, _, _, label) = validate_candidate(&c).unwrap();
        assert!(label.is_none());
    }

    #[test]
    fn non_string_category_is_treated_as_absent() {
        let c = candidate(json!("Shop"), json!(1.0), json!("2024-01-01"), json!(7));
        let (_, _, _, label) = validate_candidate(&c).unwrap();
        assert!(label.is_none());
    }
}
