//! Per-collection index lifecycle: lazy loading, rebuilds, and publication.
//!
//! Each collection gets a slot holding the currently published index and an
//! async gate. The gate serializes disk loads and rebuilds of one collection;
//! the published index sits behind a lock that is only held long enough to
//! clone or swap an `Arc`, so queries served from the cache never wait on a
//! rebuild. The map of slots is locked only to look up or insert a slot.

use crate::chunker::{chunk_documents, ChunkConfig};
use crate::embeddings::EmbeddingProvider;
use crate::index;
use crate::layout::{validate_name, CollectionLayout};
use crate::loader::{DirectoryLoader, DocumentLoader};
use crate::progress::{ProgressReporter, RebuildPhase};
use crate::types::{RebuildOutcome, RebuildStats};
use crate::vector_index::VectorIndex;
use askdoc_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;
use tokio::task::JoinHandle;

/// Characters of the first chunk echoed in the rebuild log.
const PREVIEW_CHARS: usize = 200;

#[derive(Default)]
struct CollectionSlot {
    current: RwLock<Option<Arc<VectorIndex>>>,
    gate: tokio::sync::Mutex<()>,
}

impl CollectionSlot {
    fn published(&self) -> Option<Arc<VectorIndex>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, index: Arc<VectorIndex>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(index);
    }
}

/// Owns the published index of every collection touched by this process.
pub struct IndexManager {
    layout: CollectionLayout,
    embedder: Arc<dyn EmbeddingProvider>,
    loader: Arc<dyn DocumentLoader>,
    progress: ProgressReporter,
    slots: Mutex<HashMap<String, Arc<CollectionSlot>>>,
}

impl std::fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexManager")
            .field("layout", &self.layout)
            .field("embedder", &self.embedder)
            .finish_non_exhaustive()
    }
}

impl IndexManager {
    pub fn new(layout: CollectionLayout, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            layout,
            embedder,
            loader: Arc::new(DirectoryLoader::new()),
            progress: ProgressReporter::noop(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the document loader used by rebuilds.
    pub fn with_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn layout(&self) -> &CollectionLayout {
        &self.layout
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn list_collections(&self) -> AppResult<Vec<String>> {
        self.layout.list_collections()
    }

    fn slot(&self, name: &str) -> Arc<CollectionSlot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(name.to_string()).or_default())
    }

    fn existing_slot(&self, name: &str) -> Option<Arc<CollectionSlot>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(name).cloned()
    }

    /// The published index of `name`, without loading anything.
    pub fn cached(&self, name: &str) -> Option<Arc<VectorIndex>> {
        let name = validate_name(name).ok()?;
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(name).and_then(|slot| slot.published())
    }

    /// The index of `name`, loading it from disk on first use.
    ///
    /// `NotFound` when the collection has never been built. A slot is only
    /// created for collections with a persisted artifact.
    pub async fn load(&self, name: &str) -> AppResult<Arc<VectorIndex>> {
        let name = validate_name(name)?;
        let slot = match self.existing_slot(name) {
            Some(slot) => slot,
            None => {
                let dir = self.layout.index_path(name)?;
                if !index::artifact_exists(&dir) {
                    return Err(AppError::NotFound(format!(
                        "no persisted index at {:?}",
                        index::artifact_path(&dir)
                    ))
                    .in_collection(name));
                }
                self.slot(name)
            }
        };

        if let Some(index) = slot.published() {
            return Ok(index);
        }

        let _gate = slot.gate.lock().await;

        // a rebuild or another loader may have published while we waited
        if let Some(index) = slot.published() {
            return Ok(index);
        }

        let start = Instant::now();
        let dir = self.layout.index_path(name)?;
        let embedder = Arc::clone(&self.embedder);

        let index = tokio::task::spawn_blocking(move || VectorIndex::load(&dir, embedder.as_ref()))
            .await
            .map_err(join_error)?
            .map_err(|e| e.in_collection(name))?;

        let index = Arc::new(index);
        slot.publish(Arc::clone(&index));

        tracing::info!(
            "Loaded collection '{}' ({} entries) in {:.2}s",
            name,
            index.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(index)
    }

    /// Rebuild `name` from its data directory and publish the result.
    ///
    /// A second rebuild of the same collection waits for the first. When the
    /// data directory holds no usable documents, nothing is changed and
    /// `RebuildOutcome::NoDocuments` is returned. On any error the previously
    /// persisted and published index stays in place.
    pub async fn rebuild(&self, name: &str, chunk_config: &ChunkConfig) -> AppResult<RebuildOutcome> {
        let name = validate_name(name)?;
        let slot = self.slot(name);

        let _gate = slot.gate.lock().await;

        self.rebuild_locked(name, &slot, chunk_config)
            .await
            .map_err(|e| e.in_collection(name))
    }

    async fn rebuild_locked(
        &self,
        name: &str,
        slot: &CollectionSlot,
        chunk_config: &ChunkConfig,
    ) -> AppResult<RebuildOutcome> {
        let start = Instant::now();
        let data_dir = self.layout.data_dir(name)?;
        let index_dir = self.layout.index_dir(name)?;

        tracing::info!("Rebuilding collection '{}' from {:?}", name, data_dir);

        let loader = Arc::clone(&self.loader);
        let dir = data_dir.clone();
        let documents = tokio::task::spawn_blocking(move || loader.load(&dir))
            .await
            .map_err(join_error)??;

        self.progress.emit(
            name,
            RebuildPhase::Load,
            documents.len() as u64,
            None,
            format!("{} documents", documents.len()),
        );

        if documents.is_empty() {
            tracing::warn!(
                "No documents found for collection '{}' in {:?}; keeping the current index",
                name,
                data_dir
            );
            return Ok(RebuildOutcome::NoDocuments {
                collection: name.to_string(),
                data_dir,
            });
        }

        let chunk_start = Instant::now();
        let chunks = chunk_documents(&documents, chunk_config);
        self.progress.emit(
            name,
            RebuildPhase::Chunk,
            chunks.len() as u64,
            None,
            format!("{} chunks created", chunks.len()),
        );

        tracing::info!(
            "Split {} documents into {} chunks in {:.2}s",
            documents.len(),
            chunks.len(),
            chunk_start.elapsed().as_secs_f64()
        );
        if let Some(first) = chunks.first() {
            let preview: String = first.text.chars().take(PREVIEW_CHARS).collect();
            tracing::info!("First chunk preview: {:?}", preview);
        }

        let chunk_count = chunks.len();
        let embed_start = Instant::now();
        let index = VectorIndex::build(chunks, self.embedder.as_ref()).await?;
        self.progress.emit(
            name,
            RebuildPhase::Embed,
            index.len() as u64,
            Some(chunk_count as u64),
            format!("model={}", self.embedder.model_name()),
        );
        tracing::info!(
            "Embedded {} chunks in {:.2}s",
            index.len(),
            embed_start.elapsed().as_secs_f64()
        );

        let index = Arc::new(index);
        let to_save = Arc::clone(&index);
        tokio::task::spawn_blocking(move || to_save.save(&index_dir))
            .await
            .map_err(join_error)??;
        self.progress.emit(
            name,
            RebuildPhase::Persist,
            index.len() as u64,
            Some(index.len() as u64),
            "index saved",
        );

        slot.publish(Arc::clone(&index));

        let stats = RebuildStats {
            collection: name.to_string(),
            documents: documents.len(),
            chunks: index.len(),
            dimensions: index.dimensions(),
            corpus_fingerprint: index.manifest().corpus_fingerprint.clone(),
            duration_secs: start.elapsed().as_secs_f64(),
        };

        tracing::info!(
            "Rebuilt collection '{}': {} documents, {} chunks in {:.2}s",
            name,
            stats.documents,
            stats.chunks,
            stats.duration_secs
        );

        Ok(RebuildOutcome::Rebuilt(stats))
    }

    /// Run `rebuild` as a background task.
    pub fn schedule_rebuild(
        self: &Arc<Self>,
        name: &str,
        chunk_config: &ChunkConfig,
    ) -> JoinHandle<AppResult<RebuildOutcome>> {
        let manager = Arc::clone(self);
        let name = name.to_string();
        let chunk_config = *chunk_config;

        tokio::spawn(async move {
            let result = manager.rebuild(&name, &chunk_config).await;
            match &result {
                Ok(RebuildOutcome::Rebuilt(stats)) => tracing::info!(
                    "Background rebuild of '{}' finished: {} chunks",
                    name,
                    stats.chunks
                ),
                Ok(RebuildOutcome::NoDocuments { .. }) => {
                    tracing::info!("Background rebuild of '{}' found no documents", name)
                }
                Err(e) => tracing::error!("Background rebuild of '{}' failed: {}", name, e),
            }
            result
        })
    }
}

fn join_error(err: tokio::task::JoinError) -> AppError {
    AppError::Other(format!("background task failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::hash::HashProvider;
    use crate::progress::ProgressEvent;
    use tempfile::TempDir;

    fn manager(temp: &TempDir) -> IndexManager {
        let layout = CollectionLayout::new(temp.path().join("data"), temp.path().join("index"));
        IndexManager::new(layout, Arc::new(HashProvider::new(64)))
    }

    #[tokio::test]
    async fn test_load_fresh_collection_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = manager(&temp).load("docs").await.unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().contains("collection 'docs'"));
    }

    #[tokio::test]
    async fn test_rebuild_publishes_and_persists() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let data = manager.layout().data_dir("docs").unwrap();
        std::fs::write(data.join("a.txt"), "Rotate API keys every quarter.").unwrap();

        let outcome = manager.rebuild("docs", &ChunkConfig::default()).await.unwrap();
        assert!(outcome.is_rebuilt());
        assert_eq!(manager.cached("docs").unwrap().len(), 1);

        // a fresh manager finds the persisted artifact
        let reopened = self::manager(&temp);
        assert!(reopened.cached("docs").is_none());
        assert_eq!(reopened.load("docs").await.unwrap().len(), 1);
        assert!(reopened.cached("docs").is_some());
    }

    #[tokio::test]
    async fn test_missing_collections_leave_no_slots_behind() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);

        for i in 0..1000 {
            let err = manager.load(&format!("nope-{i}")).await.unwrap_err();
            assert!(err.is_not_found());
        }
        assert!(manager.slots.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_with_different_dimensions_is_config_error() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let data = manager.layout().data_dir("docs").unwrap();
        std::fs::write(data.join("a.txt"), "Rotate API keys every quarter.").unwrap();
        manager.rebuild("docs", &ChunkConfig::default()).await.unwrap();

        let layout = CollectionLayout::new(temp.path().join("data"), temp.path().join("index"));
        let narrower = IndexManager::new(layout, Arc::new(HashProvider::new(32)));
        let err = narrower.load("docs").await.unwrap_err();

        assert!(err.is_config());
        assert!(err.to_string().contains("64 dimensions"));
        assert!(narrower.cached("docs").is_none());
    }

    #[tokio::test]
    async fn test_invalid_name_rejected() {
        let temp = TempDir::new().unwrap();
        let err = manager(&temp)
            .rebuild("../escape", &ChunkConfig::default())
            .await
            .unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_progress_phases_reported() {
        let temp = TempDir::new().unwrap();
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&phases);

        let manager = manager(&temp).with_progress(ProgressReporter::new(Arc::new(move |e: ProgressEvent| {
            sink.lock().unwrap().push(e.phase);
        })));
        let data = manager.layout().data_dir("docs").unwrap();
        std::fs::write(data.join("a.md"), "# Title\n\nSome text").unwrap();

        manager.rebuild("docs", &ChunkConfig::default()).await.unwrap();

        assert_eq!(
            *phases.lock().unwrap(),
            vec![
                RebuildPhase::Load,
                RebuildPhase::Chunk,
                RebuildPhase::Embed,
                RebuildPhase::Persist
            ]
        );
    }
}
