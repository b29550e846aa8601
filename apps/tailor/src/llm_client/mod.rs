//! Text-completion port and its Anthropic-backed implementation.
//!
//! Engines depend on `TextCompletion` only. The model is pinned in `MODEL`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::retry::RetryPolicy;

pub mod prompts;

pub use prompts::PromptKind;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
/// Pinned so completions stay comparable across runs.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 2048;
/// Transport attempts per completion (429 and 5xx only).
const TRANSPORT_ATTEMPTS: u32 = 3;
const TRANSPORT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("{kind:?} completion timed out after {after:?}")]
    Timeout { kind: PromptKind, after: Duration },
}

impl LlmError {
    /// Overload and transport failures are worth another attempt; client errors are not.
    fn is_transient(&self) -> bool {
        match self {
            LlmError::Http(_) | LlmError::RateLimited { .. } => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// The text-completion port. Stateless; may be slow or rate-limited.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(
        &self,
        kind: PromptKind,
        input: &str,
        temperature: f32,
    ) -> Result<String, AppError>;
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<Block>,
    usage: TokenUsage,
}

#[derive(Debug, Deserialize)]
struct Block {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesResponse {
    fn into_text(self) -> Option<String> {
        self.content
            .into_iter()
            .find(|b| b.kind == "text")
            .and_then(|b| b.text)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Anthropic Messages API behind the completion port.
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    api_key: String,
    backoff: RetryPolicy,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        Ok(Self {
            http: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?,
            api_key,
            backoff: RetryPolicy::new(TRANSPORT_ATTEMPTS, TRANSPORT_BACKOFF),
        })
    }

    /// Sends one prompt, retrying transient failures with exponential backoff.
    async fn send(&self, kind: PromptKind, input: &str, temperature: f32) -> Result<String, LlmError> {
        let request = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            temperature,
            system: kind.system_prompt(),
            messages: [UserMessage {
                role: "user",
                content: input,
            }],
        };

        let mut attempt = 1;
        loop {
            match self.send_once(&request).await {
                Ok(response) => {
                    debug!(
                        "{kind:?} completion: input_tokens={}, output_tokens={}",
                        response.usage.input_tokens, response.usage.output_tokens
                    );
                    return response.into_text().ok_or(LlmError::EmptyContent);
                }
                Err(e) if e.is_transient() && attempt < TRANSPORT_ATTEMPTS => {
                    let delay = self.backoff.backoff_for(attempt);
                    warn!("{kind:?} completion attempt {attempt} failed ({e}); retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    warn!("{kind:?} completion gave up: {e}");
                    return Err(LlmError::RateLimited {
                        retries: TRANSPORT_ATTEMPTS,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, request: &MessagesRequest<'_>) -> Result<MessagesResponse, LlmError> {
        let response = self
            .http
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        Err(LlmError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl TextCompletion for LlmClient {
    async fn complete(
        &self,
        kind: PromptKind,
        input: &str,
        temperature: f32,
    ) -> Result<String, AppError> {
        let text = self.send(kind, input, temperature).await?;
        Ok(strip_code_fences(&text).to_string())
    }
}

/// Applies a per-call deadline to any completion port.
pub struct TimedCompletion {
    inner: Arc<dyn TextCompletion>,
    timeout: Duration,
}

impl TimedCompletion {
    pub fn new(inner: Arc<dyn TextCompletion>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl TextCompletion for TimedCompletion {
    async fn complete(
        &self,
        kind: PromptKind,
        input: &str,
        temperature: f32,
    ) -> Result<String, AppError> {
        match tokio::time::timeout(self.timeout, self.inner.complete(kind, input, temperature))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                kind,
                after: self.timeout,
            }
            .into()),
        }
    }
}

/// Strips ``` fences the model sometimes wraps plain answers in.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    match text.strip_prefix("```") {
        Some(stripped) => {
            // drop an optional language tag on the opening fence line
            let body = match stripped.find('\n') {
                Some(idx) if !stripped[..idx].contains(' ') => &stripped[idx + 1..],
                _ => stripped,
            };
            body.trim_end().strip_suffix("```").unwrap_or(body).trim()
        }
        None => text,
    }
}
