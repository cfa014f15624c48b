/// LLM Client — the single point of entry for all Claude API calls in Scout.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// All LLM interactions MUST go through this module.
///
/// Model: claude-sonnet-4-5 (hardcoded — do not make configurable to prevent drift)
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::retry::Sleeper;
use crate::settings::SettingsStore;

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls in Scout.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 8192;

/// Attempt budget for per-batch calls.
pub const BATCH_ATTEMPTS: u32 = 3;
/// Attempt budget for the final ranking call — the expensive,
/// non-resumable step is weighted more heavily against failure.
pub const FINAL_ATTEMPTS: u32 = 5;

const BACKOFF_CAP: Duration = Duration::from_secs(60);
/// Base delay for rate-limit / server errors.
const API_ERROR_BASE: Duration = Duration::from_secs(2);
/// Base delay for connection-class errors (reset, timeout).
const CONNECTION_ERROR_BASE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM call failed after {attempts} attempts: {message}")]
    Exhausted { attempts: u32, message: String },

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    /// Retryable classes: rate limit, transient server errors, and
    /// connection resets/timeouts. Everything else fails fast.
    fn retry_base(&self) -> Option<Duration> {
        match self {
            LlmError::Api { status, .. } if matches!(status, 429 | 500 | 502 | 503) => {
                Some(API_ERROR_BASE)
            }
            LlmError::Http(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                Some(CONNECTION_ERROR_BASE)
            }
            _ => None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Request / response wire types
// ────────────────────────────────────────────────────────────────────────────

/// A user-message content block: plain text or an inline base64 document
/// (the model reads PDFs directly).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Document { source: DocumentSource },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn pdf(bytes: &[u8]) -> Self {
        ContentBlock::Document {
            source: DocumentSource {
                kind: "base64",
                media_type: "application/pdf",
                data: BASE64.encode(bytes),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a [ContentBlock],
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ResponseBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The single LLM client used by all services in Scout.
/// Wraps the Anthropic Messages API with bounded retry and backoff.
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    settings: Arc<SettingsStore>,
    sleeper: Arc<dyn Sleeper>,
}

impl LlmClient {
    pub fn new(settings: Arc<SettingsStore>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .expect("Failed to build LLM HTTP client"),
            settings,
            sleeper,
        }
    }

    /// Makes a call to the Claude API with up to `max_attempts` attempts.
    /// Retries on 429 / 500 / 502 / 503 and connection-class failures with
    /// exponential backoff (2s base, 5s base for connection errors, capped
    /// at 60s); other failures propagate immediately.
    pub async fn call(
        &self,
        system: &str,
        content: Vec<ContentBlock>,
        max_attempts: u32,
    ) -> Result<LlmResponse, LlmError> {
        let mut last_error: Option<LlmError> = None;

        for attempt in 1..=max_attempts {
            if let Some(e) = &last_error {
                // retry_base is Some for every error that reaches here
                let base = e.retry_base().unwrap_or(API_ERROR_BASE);
                let shift = (attempt - 2).min(16);
                let delay = base.saturating_mul(1 << shift).min(BACKOFF_CAP);
                warn!(
                    "LLM attempt {}/{} failed ({e}), retrying after {}ms",
                    attempt - 1,
                    max_attempts,
                    delay.as_millis()
                );
                self.sleeper.sleep(delay).await;
            }

            match self.call_once(system, &content).await {
                Ok(response) => {
                    debug!(
                        "LLM call succeeded: input_tokens={}, output_tokens={}",
                        response.usage.input_tokens, response.usage.output_tokens
                    );
                    return Ok(response);
                }
                Err(e) => {
                    if e.retry_base().is_none() {
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(LlmError::Exhausted {
            attempts: max_attempts,
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        })
    }

    async fn call_once(
        &self,
        system: &str,
        content: &[ContentBlock],
    ) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content,
            }],
        };

        let api_key = self.settings.snapshot().anthropic_api_key.clone();
        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Prefer the structured upstream error message when present
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Convenience wrapper returning the first text block of the response.
    pub async fn call_text(
        &self,
        system: &str,
        content: Vec<ContentBlock>,
        max_attempts: u32,
    ) -> Result<String, LlmError> {
        let response = self.call(system, content, max_attempts).await?;
        response
            .text()
            .map(|t| t.to_string())
            .ok_or(LlmError::EmptyContent)
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_text_block_serializes_with_type_tag() {
        let block = ContentBlock::text("hello");
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hello");
    }

    #[test]
    fn test_pdf_block_serializes_base64_document() {
        let block = ContentBlock::pdf(b"%PDF-1.4 fake");
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "document");
        assert_eq!(json["source"]["type"], "base64");
        assert_eq!(json["source"]["media_type"], "application/pdf");
        assert_eq!(json["source"]["data"], BASE64.encode(b"%PDF-1.4 fake"));
    }

    #[test]
    fn test_retry_classification() {
        for status in [429u16, 500, 502, 503] {
            let e = LlmError::Api {
                status,
                message: String::new(),
            };
            assert_eq!(e.retry_base(), Some(API_ERROR_BASE), "status {status}");
        }
        let e = LlmError::Api {
            status: 400,
            message: String::new(),
        };
        assert_eq!(e.retry_base(), None);
        assert_eq!(LlmError::EmptyContent.retry_base(), None);
    }

    #[test]
    fn test_response_text_takes_first_text_block() {
        let response: LlmResponse = serde_json::from_str(
            r#"{
                "content": [
                    {"type": "thinking", "text": null},
                    {"type": "text", "text": "[]"}
                ],
                "usage": {"input_tokens": 10, "output_tokens": 2}
            }"#,
        )
        .unwrap();
        assert_eq!(response.text(), Some("[]"));
    }
}
