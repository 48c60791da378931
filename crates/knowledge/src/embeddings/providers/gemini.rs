//! Google Gemini embedding provider.
//!
//! Documents go through `batchEmbedContents` with the `RETRIEVAL_DOCUMENT`
//! task type; queries go through `embedContent` with `RETRIEVAL_QUERY`, so the
//! two sides of a search are embedded asymmetrically as the API intends.

use super::{http_client, with_retries};
use crate::embeddings::EmbeddingProvider;
use askdoc_core::{AppError, AppResult, EmbeddingSettings};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini caps `batchEmbedContents` at 100 requests.
const MAX_BATCH: usize = 100;

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

impl GeminiProvider {
    pub fn new(settings: &EmbeddingSettings, api_key: &str) -> AppResult<Self> {
        if api_key.trim().is_empty() {
            return Err(AppError::Config(
                "API key not found. Set GOOGLE_API_KEY or GEMINI_API_KEY".to_string(),
            ));
        }

        let base_url = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_GEMINI_URL.to_string());

        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            model: settings.model.clone(),
            dimensions: settings.dimensions,
            batch_size: settings.batch_size.min(MAX_BATCH),
        })
    }

    /// Fully qualified model resource name.
    fn model_resource(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }

    fn request<'a>(
        model: &'a str,
        text: &'a str,
        task_type: &'static str,
    ) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model,
            content: Content {
                parts: [Part { text }],
            },
            task_type,
        }
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> AppResult<R> {
        let url = format!("{}/{}:{}", self.base_url, self.model_resource(), method);
        debug!("Sending Gemini request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to reach Gemini API: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let err = format!("Gemini API error ({}): {}", status, body);
            return Err(match status.as_u16() {
                400 | 401 | 403 => AppError::Config(err),
                _ => AppError::Provider(err),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to parse Gemini response: {}", e)))
    }

    fn check_dimensions(&self, values: &[f32]) -> AppResult<()> {
        if values.len() != self.dimensions {
            return Err(AppError::Provider(format!(
                "Gemini model '{}' returned {} dimensions, expected {}",
                self.model,
                values.len(),
                self.dimensions
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn provider_name(&self) -> &str {
        "gemini"
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

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "gemini", model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let model = self.model_resource();
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_BATCH) {
            let body = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|text| Self::request(&model, text, "RETRIEVAL_DOCUMENT"))
                    .collect(),
            };

            let response: BatchEmbedResponse = with_retries("Gemini batch embedding", || {
                self.post("batchEmbedContents", &body)
            })
            .await?;

            if response.embeddings.len() != batch.len() {
                return Err(AppError::Provider(format!(
                    "Gemini returned {} embeddings for {} texts",
                    response.embeddings.len(),
                    batch.len()
                )));
            }

            for embedding in response.embeddings {
                self.check_dimensions(&embedding.values)?;
                embeddings.push(embedding.values);
            }
        }

        Ok(embeddings)
    }

    #[instrument(skip(self, text), fields(text_len = text.len(), provider = "gemini", model = %self.model))]
    async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>> {
        let model = self.model_resource();
        let body = Self::request(&model, text, "RETRIEVAL_QUERY");

        let response: EmbedContentResponse =
            with_retries("Gemini query embedding", || self.post("embedContent", &body)).await?;

        self.check_dimensions(&response.embedding.values)?;
        Ok(response.embedding.values)
    }
}
