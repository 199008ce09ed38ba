pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::IngestError;
pub use services::openai::{OpenAiExtractor, TransactionExtractor};
pub use services::processor::ingest;
