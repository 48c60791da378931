//! Query-time retrieval over a collection index.

use super::types::{Passage, RetrievalRequest, RetrievalResult};
use crate::manager::IndexManager;
use askdoc_core::{AppError, AppResult};
use std::time::Instant;
use tracing::instrument;

/// Lower bound on MMR candidates, so small `k` still has room to diversify.
const MIN_MMR_CANDIDATES: usize = 8;

/// Retrieve the passages of `request.collection` closest to `request.query`.
///
/// Errors from loading the collection keep their kind, so a collection that
/// was never built surfaces as `NotFound`.
#[instrument(skip(manager, request), fields(collection = %request.collection, k = request.k, mmr = request.use_mmr))]
pub async fn retrieve(
    manager: &IndexManager,
    request: &RetrievalRequest,
) -> AppResult<RetrievalResult> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(AppError::Config("query must not be empty".to_string()));
    }
    if request.k == 0 {
        return Err(AppError::Config("k must be greater than 0".to_string()));
    }

    let start = Instant::now();
    let index = manager.load(&request.collection).await?;

    let embedding = manager
        .embedder()
        .embed_query(query)
        .await
        .map_err(|e| e.in_collection(&request.collection))?;

    let hits = if request.use_mmr {
        let fetch = (2 * request.k).max(MIN_MMR_CANDIDATES);
        index.max_marginal_relevance_search(&embedding, request.k, fetch)
    } else {
        index.similarity_search(&embedding, request.k)
    }
    .map_err(|e| e.in_collection(&request.collection))?;

    tracing::info!(
        "Retrieved {} passages from '{}' in {:.3}s",
        hits.len(),
        request.collection,
        start.elapsed().as_secs_f64()
    );

    Ok(RetrievalResult {
        collection: request.collection.trim().to_string(),
        query: query.to_string(),
        passages: hits.into_iter().map(Passage::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::hash::HashProvider;
    use crate::layout::CollectionLayout;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn manager(temp: &TempDir) -> IndexManager {
        let layout = CollectionLayout::new(temp.path().join("data"), temp.path().join("index"));
        IndexManager::new(layout, Arc::new(HashProvider::new(64)))
    }

    #[tokio::test]
    async fn test_blank_query_and_zero_k_rejected() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);

        let err = retrieve(&manager, &RetrievalRequest::new("docs", "   ", 4))
            .await
            .unwrap_err();
        assert!(err.is_config());

        let err = retrieve(&manager, &RetrievalRequest::new("docs", "keys", 0))
            .await
            .unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_unbuilt_collection_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = retrieve(&manager(&temp), &RetrievalRequest::new("docs", "keys", 4))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
