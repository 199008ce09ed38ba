pub mod openai;
pub mod parser;
pub mod processor;
pub mod report;
