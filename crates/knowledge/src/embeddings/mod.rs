//! Embedding providers for collection indexes.
//!
//! A provider turns chunk texts (and queries) into fixed-length vectors. The
//! provider is chosen from `EmbeddingSettings` and shared behind an `Arc` by
//! the index manager and the retrieval pipeline.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};

use askdoc_core::{AppError, AppResult};

/// Embed `texts` in `provider.batch_size()` sized requests.
///
/// Every returned vector is checked against the provider's declared dimensions.
pub async fn embed_in_batches(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
) -> AppResult<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let batch_size = provider.batch_size().max(1);
    let mut embeddings = Vec::with_capacity(texts.len());

    tracing::info!(
        "Embedding {} texts using provider '{}' (model: {}, batch size: {})",
        texts.len(),
        provider.provider_name(),
        provider.model_name(),
        batch_size
    );

    for (batch_no, batch) in texts.chunks(batch_size).enumerate() {
        let vectors = provider.embed_batch(batch).await?;

        if vectors.len() != batch.len() {
            return Err(AppError::Provider(format!(
                "Provider '{}' returned {} embeddings for {} texts",
                provider.provider_name(),
                vectors.len(),
                batch.len()
            )));
        }

        if let Some(bad) = vectors.iter().find(|v| v.len() != provider.dimensions()) {
            return Err(AppError::Provider(format!(
                "Provider '{}' returned a {}-dimensional vector, expected {}",
                provider.provider_name(),
                bad.len(),
                provider.dimensions()
            )));
        }

        tracing::debug!("Embedded batch {} ({} texts)", batch_no + 1, batch.len());
        embeddings.extend(vectors);
    }

    Ok(embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::hash::HashProvider;

    #[derive(Debug)]
    struct ShortProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for ShortProvider {
        fn provider_name(&self) -> &str {
            "short"
        }

        fn model_name(&self) -> &str {
            "short-v0"
        }

        fn dimensions(&self) -> usize {
            4
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts.iter().skip(1).map(|_| vec![0.0; 4]).collect())
        }
    }

    #[tokio::test]
    async fn test_embed_in_batches_splits_requests() {
        let provider = HashProvider::new(32).with_batch_size(3);
        let texts: Vec<String> = (0..7).map(|i| format!("text number {i}")).collect();

        let embeddings = embed_in_batches(&provider, &texts).await.unwrap();
        assert_eq!(embeddings.len(), 7);

        let single = provider.embed("text number 5").await.unwrap();
        assert_eq!(embeddings[5], single);
    }

    #[tokio::test]
    async fn test_count_mismatch_is_provider_error() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let err = embed_in_batches(&ShortProvider, &texts).await.unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
    }
}
