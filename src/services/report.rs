use crate::models::{IngestionFailure, IngestionReport, Transaction};

/// Shapes the final response. Pure formatting: counts come from the caller,
/// and the failures list is serialized only when non-empty.
pub fn build_report(
    found: usize,
    transactions: Vec<Transaction>,
    failures: Vec<IngestionFailure>,
) -> IngestionReport {
    let message = format!(
        "Processed {} potential transactions. Saved {}.",
        found,
        transactions.len()
    );
    IngestionReport {
        status: "created".to_string(),
        message,
        transactions,
        failures,
    }
}
