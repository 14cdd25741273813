//! Embedding client for query vectors.
//!
//! Query keywords are embedded through the same model the offline job used
//! for the catalog, exposed here as an Ollama-style HTTP endpoint. One
//! client instance is shared across all requests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::warn;

use super::{ServiceError, backoff_delay};
use crate::vector::VectorDimension;

const SERVICE_NAME: &str = "embedding service";

/// Trait for generating a query embedding from text.
///
/// Implementations must be thread-safe and must produce vectors of exactly
/// `dimension()` length.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generates the embedding for one text string.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;

    /// Dimension of the vectors this embedder produces.
    fn dimension(&self) -> VectorDimension;
}

/// Production embedder against an Ollama-style `/api/embeddings` endpoint.
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimension: VectorDimension,
    max_retries: u32,
}

impl HttpEmbedder {
    /// Creates a new embedder.
    ///
    /// The declared dimension must match the vector index; that check
    /// happens once at pipeline construction, while each response is also
    /// validated against the declared dimension here.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimension: VectorDimension,
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
            model: model.into(),
            dimension,
            max_retries,
        })
    }

    async fn fetch_once(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let payload = json!({
            "model": self.model,
            "prompt": text,
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&payload)
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

        let value: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| ServiceError::InvalidResponse {
                    service: SERVICE_NAME,
                    reason: e.to_string(),
                })?;

        let vector: Vec<f32> = value["embedding"]
            .as_array()
            .ok_or(ServiceError::InvalidResponse {
                service: SERVICE_NAME,
                reason: "Missing embedding array".to_string(),
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        if vector.len() != self.dimension.get() {
            return Err(ServiceError::InvalidResponse {
                service: SERVICE_NAME,
                reason: format!(
                    "Expected {} dimensions, got {}",
                    self.dimension.get(),
                    vector.len()
                ),
            });
        }

        Ok(vector)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let mut last_error = String::new();

        for attempt in 0..self.max_retries {
            match self.fetch_once(text).await {
                Ok(vector) => return Ok(vector),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt + 1 < self.max_retries {
                        let delay = backoff_delay(attempt);
                        warn!(
                            attempt = attempt + 1,
                            max = self.max_retries,
                            delay_secs = delay.as_secs(),
                            "Embedding request failed, retrying: {last_error}"
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

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}
