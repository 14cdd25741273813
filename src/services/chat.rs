//! Chat-completion client for the extraction, arbitration, and translation
//! prompts.
//!
//! The production client targets an OpenAI-compatible chat-completions
//! endpoint with deterministic sampling. Models habitually wrap their JSON
//! in markdown code fences, so [`strip_code_fences`] runs before parsing.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{ServiceError, StructuredReply, backoff_delay};

const SERVICE_NAME: &str = "chat service";

/// Sampling temperature for all prompts. Low and fixed: the pipeline wants
/// reproducible structured output, not creativity.
const TEMPERATURE: f32 = 0.1;

/// Maximum tokens per completion.
const MAX_TOKENS: u32 = 2048;

/// Trait for chat-completion services.
///
/// Implementations must be thread-safe; one client instance is shared
/// across concurrent requests.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends a system + user message pair and returns the assistant text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, ServiceError>;
}

/// Production client against an OpenAI-compatible `/chat/completions`
/// endpoint (the default settings point at Groq).
pub struct HttpChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl HttpChatClient {
    /// Creates a new client.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Transport {
                service: SERVICE_NAME,
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into().trim().to_string(),
            model: model.into(),
            max_retries,
        })
    }

    async fn send_once(&self, system: &str, user: &str) -> Result<String, ServiceError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Transport {
                service: SERVICE_NAME,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ServiceError::Http {
                service: SERVICE_NAME,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| ServiceError::InvalidResponse {
                    service: SERVICE_NAME,
                    reason: e.to_string(),
                })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(ServiceError::InvalidResponse {
                service: SERVICE_NAME,
                reason: "Response contained no choices".to_string(),
            })
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ServiceError> {
        let mut last_error = String::new();

        for attempt in 0..self.max_retries {
            match self.send_once(system, user).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt + 1 < self.max_retries {
                        let delay = backoff_delay(attempt);
                        warn!(
                            attempt = attempt + 1,
                            max = self.max_retries,
                            delay_secs = delay.as_secs(),
                            "Chat request failed, retrying: {last_error}"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(ServiceError::Unavailable {
            service: SERVICE_NAME,
            attempts: self.max_retries,
            last: last_error,
        })
    }
}

/// Strips a surrounding markdown code fence from model output.
///
/// Handles ` ```json `, plain ` ``` `, and fence-free text unchanged.
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let mut trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix("```json") {
        trimmed = rest;
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        trimmed = rest;
    }
    if let Some(rest) = trimmed.strip_suffix("```") {
        trimmed = rest;
    }

    trimmed.trim()
}

/// Requests a completion and parses it as JSON of the expected shape.
///
/// Transport failure maps to `Unavailable`; a reply that arrives but does
/// not parse maps to `Malformed` so the caller can apply its deterministic
/// fallback without retrying.
pub async fn complete_structured<T: DeserializeOwned>(
    client: &dyn ChatClient,
    system: &str,
    user: &str,
) -> StructuredReply<T> {
    let raw = match client.complete(system, user).await {
        Ok(raw) => raw,
        Err(e) => return StructuredReply::Unavailable(e),
    };

    let cleaned = strip_code_fences(&raw);
    match serde_json::from_str(cleaned) {
        Ok(value) => StructuredReply::Parsed(value),
        Err(e) => {
            debug!("Structured reply failed to parse: {e}");
            StructuredReply::Malformed { raw }
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}
