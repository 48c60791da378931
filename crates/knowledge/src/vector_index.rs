//! In-memory vector index over embedded chunks.
//!
//! An index is immutable once built: a rebuild produces a fresh `VectorIndex`
//! that replaces the published one wholesale, so readers holding an
//! `Arc<VectorIndex>` never see a partially updated set of entries.

use crate::embeddings::{embed_in_batches, EmbeddingProvider};
use crate::types::{Chunk, ChunkMetadata, SearchHit};
use askdoc_core::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Default trade-off between relevance and diversity for MMR.
pub const DEFAULT_MMR_LAMBDA: f32 = 0.5;

/// Build-time facts stored next to the entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub count: usize,
    /// SHA-256 over every chunk text, in order
    pub corpus_fingerprint: String,
    pub built_at: DateTime<Utc>,
}

/// One embedded chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub embedding: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Embed `chunks` with `embedder` and build an index over them.
    ///
    /// Fails with a configuration error on empty input, and with a provider
    /// error if the embedder returns the wrong number or size of vectors.
    pub async fn build(chunks: Vec<Chunk>, embedder: &dyn EmbeddingProvider) -> AppResult<Self> {
        if chunks.is_empty() {
            return Err(AppError::Config(
                "cannot build an index from zero chunks".to_string(),
            ));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embed_in_batches(embedder, &texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(AppError::Provider(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let manifest = IndexManifest {
            provider: embedder.provider_name().to_string(),
            model: embedder.model_name().to_string(),
            dimensions: embedder.dimensions(),
            count: chunks.len(),
            corpus_fingerprint: corpus_fingerprint(&texts),
            built_at: Utc::now(),
        };

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry {
                embedding,
                text: chunk.text,
                metadata: chunk.metadata,
            })
            .collect();

        Self::from_parts(manifest, entries)
    }

    /// Assemble an index from stored parts, checking they agree.
    pub fn from_parts(manifest: IndexManifest, entries: Vec<IndexEntry>) -> AppResult<Self> {
        if entries.len() != manifest.count {
            return Err(AppError::Provider(format!(
                "index manifest lists {} entries but {} are present",
                manifest.count,
                entries.len()
            )));
        }
        if let Some(bad) = entries
            .iter()
            .find(|e| e.embedding.len() != manifest.dimensions)
        {
            return Err(AppError::Provider(format!(
                "index entry has {} dimensions, manifest says {}",
                bad.embedding.len(),
                manifest.dimensions
            )));
        }
        Ok(Self { manifest, entries })
    }

    /// Persist to `dir`, atomically replacing any previous artifact.
    pub fn save(&self, dir: &Path) -> AppResult<()> {
        crate::index::save_index(self, dir)
    }

    /// Load the artifact in `dir` for use with `embedder`.
    ///
    /// A dimension mismatch with the embedder is a configuration error; a
    /// different model name with equal dimensions is only logged.
    pub fn load(dir: &Path, embedder: &dyn EmbeddingProvider) -> AppResult<Self> {
        let index = crate::index::load_index(dir)?;

        if index.dimensions() != embedder.dimensions() {
            return Err(AppError::Config(format!(
                "index at {:?} has {} dimensions but provider '{}' produces {}; rebuild the collection",
                dir,
                index.dimensions(),
                embedder.provider_name(),
                embedder.dimensions()
            )));
        }

        if index.manifest.model != embedder.model_name() {
            tracing::warn!(
                "Index at {:?} was built with model '{}', querying with '{}'",
                dir,
                index.manifest.model,
                embedder.model_name()
            );
        }

        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.manifest.dimensions
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// The `k` entries nearest to `query` by cosine distance, nearest first.
    ///
    /// Ties keep insertion order. Returns `min(k, len)` hits.
    pub fn similarity_search(&self, query: &[f32], k: usize) -> AppResult<Vec<SearchHit>> {
        self.check_query(query, k)?;

        Ok(self
            .ranked(query, k)
            .into_iter()
            .map(|(i, distance)| self.hit(i, distance))
            .collect())
    }

    /// Maximal marginal relevance search with the default lambda.
    pub fn max_marginal_relevance_search(
        &self,
        query: &[f32],
        k: usize,
        fetch_candidates: usize,
    ) -> AppResult<Vec<SearchHit>> {
        self.max_marginal_relevance_search_with_lambda(query, k, fetch_candidates, DEFAULT_MMR_LAMBDA)
    }

    /// Maximal marginal relevance search.
    ///
    /// Takes the `fetch_candidates` nearest entries (at least `k`) and greedily
    /// picks the one maximising `lambda * sim(query, d) - (1 - lambda) * max
    /// sim(d, picked)`. Equal scores go to the better-ranked candidate. Hits
    /// come back in pick order.
    pub fn max_marginal_relevance_search_with_lambda(
        &self,
        query: &[f32],
        k: usize,
        fetch_candidates: usize,
        lambda: f32,
    ) -> AppResult<Vec<SearchHit>> {
        self.check_query(query, k)?;
        if !(0.0..=1.0).contains(&lambda) {
            return Err(AppError::Config(format!(
                "MMR lambda must be within [0, 1], got {}",
                lambda
            )));
        }

        let mut remaining = self.ranked(query, fetch_candidates.max(k));
        let mut picked: Vec<(usize, f32)> = Vec::with_capacity(k.min(remaining.len()));

        while picked.len() < k && !remaining.is_empty() {
            let mut best = 0;
            let mut best_score = f32::NEG_INFINITY;

            for (pos, (i, distance)) in remaining.iter().enumerate() {
                let relevance = 1.0 - distance;
                let redundancy = if picked.is_empty() {
                    0.0
                } else {
                    picked
                        .iter()
                        .map(|(j, _)| {
                            cosine_similarity(
                                &self.entries[*i].embedding,
                                &self.entries[*j].embedding,
                            )
                        })
                        .fold(f32::NEG_INFINITY, f32::max)
                };
                let score = lambda * relevance - (1.0 - lambda) * redundancy;

                if score > best_score {
                    best = pos;
                    best_score = score;
                }
            }

            picked.push(remaining.remove(best));
        }

        Ok(picked
            .into_iter()
            .map(|(i, distance)| self.hit(i, distance))
            .collect())
    }

    fn check_query(&self, query: &[f32], k: usize) -> AppResult<()> {
        if k == 0 {
            return Err(AppError::Config("k must be greater than 0".to_string()));
        }
        if query.len() != self.manifest.dimensions {
            return Err(AppError::Config(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.manifest.dimensions
            )));
        }
        Ok(())
    }

    /// `(entry position, distance)` of the `limit` nearest entries.
    fn ranked(&self, query: &[f32], limit: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_distance(query, &e.embedding)))
            .collect();

        // stable: equal distances keep insertion order
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(limit);
        scored
    }

    fn hit(&self, i: usize, distance: f32) -> SearchHit {
        let entry = &self.entries[i];
        SearchHit {
            text: entry.text.clone(),
            metadata: entry.metadata.clone(),
            distance,
        }
    }
}

/// SHA-256 hex digest over chunk texts, each followed by a NUL separator.
pub fn corpus_fingerprint(texts: &[String]) -> String {
    let mut hasher = Sha256::new();
    for text in texts {
        hasher.update(text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Cosine similarity; 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// `1 - cosine_similarity`, in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentMetadata;

    fn entry(text: &str, embedding: Vec<f32>, chunk_index: u64) -> IndexEntry {
        IndexEntry {
            embedding,
            text: text.to_string(),
            metadata: ChunkMetadata {
                document: DocumentMetadata::new("a.txt", ".txt"),
                chunk_index,
                start: 0,
                end: text.chars().count(),
            },
        }
    }

    fn index(entries: Vec<IndexEntry>) -> VectorIndex {
        let dimensions = entries[0].embedding.len();
        let manifest = IndexManifest {
            provider: "fixed".to_string(),
            model: "fixed-v1".to_string(),
            dimensions,
            count: entries.len(),
            corpus_fingerprint: String::new(),
            built_at: Utc::now(),
        };
        VectorIndex::from_parts(manifest, entries).unwrap()
    }

    /// Eight near-duplicates of the query direction plus two outliers.
    fn clustered() -> VectorIndex {
        let mut entries: Vec<IndexEntry> = (0..8)
            .map(|i| entry(&format!("dup-{i}"), vec![1.0, 0.2, 0.05 * i as f32], i))
            .collect();
        entries.push(entry("outlier-1", vec![1.0, -0.3, 0.0], 8));
        entries.push(entry("outlier-2", vec![1.0, 0.0, -0.8], 9));
        index(entries)
    }

    #[test]
    fn test_k_larger_than_len_returns_all_nearest_first() {
        let index = index(vec![
            entry("far", vec![0.0, 1.0], 0),
            entry("near", vec![1.0, 0.1], 1),
        ]);

        let hits = index.similarity_search(&[1.0, 0.0], 4).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "near");
        assert!(hits[0].distance < hits[1].distance);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = index(vec![
            entry("first", vec![1.0, 0.0], 0),
            entry("second", vec![2.0, 0.0], 1),
            entry("third", vec![0.0, 1.0], 2),
        ]);

        let hits = index.similarity_search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].text, "first");
        assert_eq!(hits[1].text, "second");
    }

    #[test]
    fn test_invalid_queries_are_config_errors() {
        let index = index(vec![entry("only", vec![1.0, 0.0], 0)]);

        assert!(index.similarity_search(&[1.0, 0.0], 0).unwrap_err().is_config());
        assert!(index
            .similarity_search(&[1.0, 0.0, 0.0], 1)
            .unwrap_err()
            .is_config());
        assert!(index
            .max_marginal_relevance_search_with_lambda(&[1.0, 0.0], 1, 4, 1.5)
            .unwrap_err()
            .is_config());
    }

    #[test]
    fn test_mmr_picks_outlier_where_top_k_does_not() {
        let index = clustered();
        let query = [1.0, 0.0, 0.0];

        let plain = index.similarity_search(&query, 2).unwrap();
        assert_eq!(plain[0].text, "dup-0");
        assert_eq!(plain[1].text, "dup-1");

        let mmr = index.max_marginal_relevance_search(&query, 2, 8).unwrap();
        assert_eq!(mmr.len(), 2);
        assert_eq!(mmr[0].text, "dup-0");
        assert!(mmr.iter().any(|h| h.text.starts_with("outlier")));
    }

    #[test]
    fn test_mmr_lambda_one_matches_similarity_order() {
        let index = clustered();
        let query = [1.0, 0.0, 0.0];

        let plain = index.similarity_search(&query, 4).unwrap();
        let mmr = index
            .max_marginal_relevance_search_with_lambda(&query, 4, 10, 1.0)
            .unwrap();

        let plain: Vec<_> = plain.iter().map(|h| h.text.as_str()).collect();
        let mmr: Vec<_> = mmr.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(plain, mmr);
    }

    #[test]
    fn test_mmr_fetch_clamped_up_to_k() {
        let index = clustered();
        let hits = index
            .max_marginal_relevance_search(&[1.0, 0.0, 0.0], 5, 1)
            .unwrap();
        assert_eq!(hits.len(), 5);
    }

    #[test]
    fn test_from_parts_rejects_inconsistent_entries() {
        let manifest = IndexManifest {
            provider: "fixed".to_string(),
            model: "fixed-v1".to_string(),
            dimensions: 3,
            count: 1,
            corpus_fingerprint: String::new(),
            built_at: Utc::now(),
        };

        let result = VectorIndex::from_parts(manifest, vec![entry("x", vec![1.0, 0.0], 0)]);
        assert!(matches!(result, Err(AppError::Provider(_))));
    }

    #[test]
    fn test_corpus_fingerprint_is_order_sensitive() {
        let a = corpus_fingerprint(&["one".to_string(), "two".to_string()]);
        let b = corpus_fingerprint(&["two".to_string(), "one".to_string()]);
        let c = corpus_fingerprint(&["on".to_string(), "etwo".to_string()]);

        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cosine_helpers() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_build_rejects_empty_input() {
        let provider = crate::embeddings::providers::hash::HashProvider::new(16);
        let err = VectorIndex::build(vec![], &provider).await.unwrap_err();
        assert!(err.is_config());
    }
}
