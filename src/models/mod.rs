use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One uploaded document image. Lives only for the duration of a single
/// ingestion request and is never persisted.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: Option<String>,
}

/// A transaction as the model reported it, before any validation.
/// Fields are kept as raw JSON values so that a single malformed field
/// surfaces as a per-item failure instead of a decode error for the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateTransaction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub created_at: String,
}

/// A validated, persisted transaction. Negative amount means expense,
/// positive means income.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub merchant: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub created_at: String,
}

/// Why a single candidate was skipped, together with the candidate as it
/// came out of the model so the caller can correct and re-submit.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionFailure {
    pub candidate: CandidateTransaction,
    pub reason: String,
}

/// Final response for one ingestion request.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub status: String,
    pub message: String,
    pub transactions: Vec<Transaction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<IngestionFailure>,
}
