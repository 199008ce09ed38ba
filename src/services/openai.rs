use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::UploadedImage;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Boundary to the vision inference service: image in, raw text out.
/// Parsing and validation of that text happen downstream.
#[async_trait]
pub trait TransactionExtractor: Send + Sync {
    async fn extract(&self, image: &UploadedImage) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

pub struct OpenAiExtractor {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiExtractor {
    pub fn new(api_key: impl Into<String>) -> Self {
        OpenAiExtractor {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_model(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        OpenAiExtractor {
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TransactionExtractor for OpenAiExtractor {
    async fn extract(&self, image: &UploadedImage) -> Result<String> {
        let data_url = format!(
            "data:{};base64,{}",
            image.mime_type,
            BASE64.encode(&image.bytes)
        );

        let request = ChatRequest {
            model: self.model.clone(),
            temperature: 0.1,
            max_tokens: 2000,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: Value::String(extraction_prompt().to_string()),
                },
                Message {
                    role: "user".to_string(),
                    content: json!([
                        {
                            "type": "text",
                            "text": "Extract every transaction from this document image."
                        },
                        {
                            "type": "image_url",
                            "image_url": { "url": data_url }
                        }
                    ]),
                },
            ],
        };

        let response = self
            .client
            .post(OPENAI_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI error {}: {}", status, body));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .first()
            .ok_or_else(|| anyhow!("Empty response"))?
            .message
            .content
            .trim()
            .to_string();
        Ok(content)
    }
}

pub fn extraction_prompt() -> &'static str {
    r#"You are a financial document extraction system. The user sends a photo or screenshot of a receipt or bank statement.
List every distinct transaction visible in the image. Respond with a single JSON array and nothing else: no prose, no markdown.
Each element is an object with exactly these fields:
- merchant (string|null): the merchant or counterparty name
- amount (number|null): negative for expenses/debits, positive for income/credits
- date (string|null): the transaction date as YYYY-MM-DD
- category (string|null): one of Groceries, Dining, Transport, Utilities, Entertainment, Shopping, Income, Transfer, Rent/Mortgage, Fees, Other
Use null for any field that cannot be determined from the image.
"#
}
