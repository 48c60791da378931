//! Ollama Embedding Provider
//!
//! Semantic embeddings via Ollama's local `/api/embed` endpoint using models
//! like nomic-embed-text. Local-first: no API costs, nothing leaves the host.
//!
//! The base URL comes from the `endpoint` setting, then `OLLAMA_URL`, then
//! `http://localhost:11434`.

use super::{http_client, with_retries};
use crate::embeddings::EmbeddingProvider;
use askdoc_core::{AppError, AppResult, EmbeddingSettings};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBED_ENDPOINT: &str = "/api/embed";

/// Ollama embedding provider using the local API
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

/// Request payload for the Ollama embed API
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response from the Ollama embed API
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Error response from the Ollama API
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaProvider {
    /// Create a provider from settings. No request is made until the first embed.
    pub fn new(settings: &EmbeddingSettings) -> AppResult<Self> {
        let base_url = settings
            .endpoint
            .clone()
            .or_else(|| std::env::var("OLLAMA_URL").ok())
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            dimensions: settings.dimensions,
            batch_size: settings.batch_size,
        })
    }

    /// Embed one batch (no retries)
    #[instrument(skip(self, texts), fields(batch_size = texts.len()))]
    async fn embed_once(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let url = format!("{}{}", self.base_url, EMBED_ENDPOINT);
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        debug!("Sending embedding request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                AppError::Provider(format!(
                    "Failed to reach Ollama at {} (is it running? try `ollama pull {}`): {}",
                    self.base_url, self.model, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(AppError::Provider(format!(
                "Ollama API error ({}): {}",
                status, message
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to parse Ollama response: {}", e)))?;

        Ok(body.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "ollama", model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let embeddings = with_retries("Ollama embedding", || self.embed_once(texts)).await?;

        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(AppError::Provider(format!(
                "Ollama model '{}' returned {} dimensions, expected {}",
                self.model,
                bad.len(),
                self.dimensions
            )));
        }

        Ok(embeddings)
    }
}
