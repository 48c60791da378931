//! Offline embedding provider based on feature hashing.

use crate::embeddings::provider::EmbeddingProvider;
use askdoc_core::AppResult;

/// Words too common to help tell passages apart.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "with", "from", "this", "that", "have", "has",
    "had", "its", "their", "they", "them", "but", "not", "you", "your", "our",
];

/// Deterministic embeddings from hashed words and character trigrams.
///
/// Each token contributes its whole-word hash plus the hashes of its
/// boundary-padded trigrams (`^ab`, `abc`, `bc$`), so texts sharing words or
/// word fragments land close together. The vector is L2-normalized; text with
/// no usable tokens embeds to the zero vector. Not semantic, but stable across
/// runs and machines, which is what local development and tests need.
#[derive(Debug, Clone)]
pub struct HashProvider {
    dimensions: usize,
    batch_size: usize,
}

impl HashProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            batch_size: 100,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();

        let tokens = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() > 1 && !STOP_WORDS.contains(t));

        for token in tokens {
            self.accumulate(&mut embedding, token.as_bytes(), 1.0);

            let padded: Vec<char> = std::iter::once('^')
                .chain(token.chars())
                .chain(std::iter::once('$'))
                .collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.accumulate(&mut embedding, trigram.as_bytes(), 0.5);
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }

    /// Add `weight` to the bucket picked by the feature's FNV-1a hash.
    fn accumulate(&self, embedding: &mut [f32], feature: &[u8], weight: f32) {
        let hash = feature.iter().fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
            (acc ^ u64::from(*b)).wrapping_mul(0x0100_0000_01b3)
        });
        let bucket = (hash % self.dimensions as u64) as usize;
        embedding[bucket] += weight;
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashProvider {
    fn provider_name(&self) -> &str {
        "hash"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>() / (norm(a) * norm(b))
    }

    #[tokio::test]
    async fn test_dimensions_and_normalization() {
        let provider = HashProvider::new(384);
        let embedding = provider.embed("hello world").await.unwrap();

        assert_eq!(embedding.len(), 384);
        assert!((norm(&embedding) - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let provider = HashProvider::new(128);
        let a = provider.embed("deterministic test").await.unwrap();
        let b = HashProvider::new(128)
            .embed("deterministic test")
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_shared_words_are_closer() {
        let provider = HashProvider::new(384);
        let query = provider.embed("rotate the api keys").await.unwrap();
        let related = provider
            .embed("How to rotate API keys every quarter")
            .await
            .unwrap();
        let unrelated = provider
            .embed("Lunch menu for the company picnic")
            .await
            .unwrap();

        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let provider = HashProvider::new(64);
        let embedding = provider.embed("   ").await.unwrap();

        assert_eq!(embedding.len(), 64);
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_utf8_safety() {
        let provider = HashProvider::new(384);
        let embedding = provider
            .embed("Gamedex é um aplicativo 🎮 brasileiro para gerenciar jogos!")
            .await
            .unwrap();

        assert!((norm(&embedding) - 1.0).abs() < 0.001);
    }
}
