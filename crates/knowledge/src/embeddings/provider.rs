//! Embedding provider trait and factory.

use askdoc_core::{AppError, AppResult, EmbeddingSettings};
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "hash", "ollama", "gemini")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Maximum number of texts sent per `embed_batch` call during a build.
    fn batch_size(&self) -> usize {
        100
    }

    /// Generate document embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate a document embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Provider("No embedding returned".to_string()))
    }

    /// Generate an embedding for a search query.
    ///
    /// Providers with distinct query/document modes override this.
    async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>> {
        self.embed(text).await
    }
}

/// Create an embedding provider based on configuration.
pub fn create_provider(
    settings: &EmbeddingSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    if settings.dimensions == 0 || settings.batch_size == 0 {
        return Err(AppError::Config(
            "embedding dimensions and batch_size must be greater than 0".to_string(),
        ));
    }

    match settings.provider.as_str() {
        "hash" => {
            let provider = super::providers::hash::HashProvider::new(settings.dimensions)
                .with_batch_size(settings.batch_size);
            Ok(Arc::new(provider))
        }

        "ollama" => {
            let provider = super::providers::ollama::OllamaProvider::new(settings)?;
            Ok(Arc::new(provider))
        }

        "gemini" => {
            let key = api_key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
                AppError::Config(
                    "API key not found. Set GOOGLE_API_KEY or GEMINI_API_KEY".to_string(),
                )
            })?;
            let provider = super::providers::gemini::GeminiProvider::new(settings, key)?;
            Ok(Arc::new(provider))
        }

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: hash, ollama, gemini",
            settings.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_hash_provider() {
        let settings = EmbeddingSettings::default();

        let provider = create_provider(&settings, None).unwrap();
        assert_eq!(provider.provider_name(), "hash");
        assert_eq!(provider.model_name(), "trigram-v1");
        assert_eq!(provider.dimensions(), 384);
        assert_eq!(provider.batch_size(), 100);
    }

    #[test]
    fn test_create_unknown_provider() {
        let settings = EmbeddingSettings {
            provider: "unknown".to_string(),
            ..EmbeddingSettings::default()
        };

        let err = create_provider(&settings, None).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_gemini_without_key_is_config_error() {
        let settings = EmbeddingSettings::for_provider("gemini");

        assert!(create_provider(&settings, None).unwrap_err().is_config());
        assert!(create_provider(&settings, Some("  ")).unwrap_err().is_config());
        assert!(create_provider(&settings, Some("key")).is_ok());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let settings = EmbeddingSettings {
            dimensions: 0,
            ..EmbeddingSettings::default()
        };

        assert!(create_provider(&settings, None).unwrap_err().is_config());
    }

    #[tokio::test]
    async fn test_provider_embed_single_and_query() {
        let provider = create_provider(&EmbeddingSettings::default(), None).unwrap();

        let embedding = provider.embed("test text").await.unwrap();
        assert_eq!(embedding.len(), 384);

        let query = provider.embed_query("test text").await.unwrap();
        assert_eq!(embedding, query);
    }
}
