use thiserror::Error;

use crate::models::IngestionFailure;

/// Request-fatal failures of the ingestion pipeline. Per-item problems are
/// not errors; they are collected as `IngestionFailure` descriptors and only
/// become fatal when every candidate in the batch fell through.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("rejected upload: {0}")]
    InputRejected(String),

    #[error("extraction service unavailable: {0}")]
    ExtractionUnavailable(#[source] anyhow::Error),

    #[error("malformed extraction response: {0}")]
    MalformedExtraction(String),

    #[error("no transactions could be saved from {found} candidate(s)")]
    BatchExhausted {
        found: usize,
        failures: Vec<IngestionFailure>,
    },
}
