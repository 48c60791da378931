//! Document collections with local vector indexes.
//!
//! Raw files live under `<data_root>/<collection>/`; each collection's index is
//! a single SQLite artifact under `<index_root>/<collection>/`. The
//! [`IndexManager`] owns the published index of every collection and
//! serializes rebuilds per collection; [`CollectionService`] is the entry
//! point used by the CLI.

pub mod chunker;
pub mod embeddings;
pub mod index;
pub mod layout;
pub mod loader;
pub mod manager;
pub mod progress;
pub mod rag;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

pub use chunker::{chunk_documents, ChunkConfig};
pub use embeddings::{create_provider, EmbeddingProvider};
pub use layout::CollectionLayout;
pub use loader::{DirectoryLoader, DocumentLoader};
pub use manager::IndexManager;
pub use progress::{ProgressEvent, ProgressReporter, RebuildPhase};
pub use rag::{retrieve, Passage, PassageMetadata, RetrievalRequest, RetrievalResult};
pub use types::{
    Chunk, ChunkMetadata, DocumentMetadata, RebuildOutcome, RebuildStats, SearchHit,
    SourceDocument,
};
pub use vector_index::{IndexManifest, VectorIndex};

use askdoc_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Collection operations with configured chunking.
#[derive(Debug, Clone)]
pub struct CollectionService {
    manager: Arc<IndexManager>,
    chunk_config: ChunkConfig,
}

impl CollectionService {
    pub fn new(manager: Arc<IndexManager>, chunk_config: ChunkConfig) -> Self {
        Self {
            manager,
            chunk_config,
        }
    }

    /// Build the service, its embedding provider and layout from configuration.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        Self::from_config_with_progress(config, ProgressReporter::noop())
    }

    /// Like [`CollectionService::from_config`], reporting rebuild phases to `progress`.
    pub fn from_config_with_progress(
        config: &AppConfig,
        progress: ProgressReporter,
    ) -> AppResult<Self> {
        let chunk_config = ChunkConfig::new(config.chunk_size, config.chunk_overlap)?;
        let embedder = create_provider(&config.embedding, config.api_key.as_deref())?;
        let manager = IndexManager::new(CollectionLayout::from_config(config), embedder)
            .with_progress(progress);

        Ok(Self::new(Arc::new(manager), chunk_config))
    }

    pub fn manager(&self) -> &Arc<IndexManager> {
        &self.manager
    }

    pub fn chunk_config(&self) -> &ChunkConfig {
        &self.chunk_config
    }

    pub fn list_collections(&self) -> AppResult<Vec<String>> {
        self.manager.list_collections()
    }

    /// Ensure both directories of `name` exist. Returns the trimmed name.
    pub fn create_collection(&self, name: &str) -> AppResult<String> {
        self.manager.layout().create_collection(name)
    }

    /// Store an uploaded file in the collection and rebuild it in the background.
    ///
    /// The file name is reduced to its final path component and must carry a
    /// supported extension. The bytes are written under a temporary name and
    /// renamed into place, so a rebuild never reads a partial upload.
    pub async fn upload_and_rebuild(
        &self,
        collection: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> AppResult<JoinHandle<AppResult<RebuildOutcome>>> {
        let file_name = sanitize_file_name(file_name)?;
        let data_dir = self.manager.layout().data_dir(collection)?;

        let target = data_dir.join(&file_name);
        let partial = data_dir.join(format!(".upload-{}.part", uuid::Uuid::new_v4()));

        tokio::fs::write(&partial, bytes).await?;
        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        tracing::info!(
            "Stored {} ({} bytes) in collection '{}'",
            file_name,
            bytes.len(),
            collection.trim()
        );

        Ok(self
            .manager
            .schedule_rebuild(collection, &self.chunk_config))
    }

    /// Rebuild `collection` in the foreground.
    pub async fn rebuild(&self, collection: &str) -> AppResult<RebuildOutcome> {
        self.manager.rebuild(collection, &self.chunk_config).await
    }

    /// Retrieve the `k` passages of `collection` most relevant to `query`.
    pub async fn ask(
        &self,
        collection: &str,
        query: &str,
        k: usize,
        use_mmr: bool,
    ) -> AppResult<RetrievalResult> {
        let request = RetrievalRequest::new(collection, query, k).with_mmr(use_mmr);
        retrieve(&self.manager, &request).await
    }
}

/// Final path component of an uploaded file name, if it is a supported document.
fn sanitize_file_name(file_name: &str) -> AppResult<String> {
    let name = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(AppError::Config(format!(
            "invalid upload file name '{}'",
            file_name
        )));
    }

    if loader::supported_extension(std::path::Path::new(name)).is_none() {
        return Err(AppError::Config(format!(
            "unsupported file type '{}'; expected one of: {}",
            name,
            loader::SUPPORTED_EXTENSIONS.join(", ")
        )));
    }

    Ok(name.to_string())
}

#[cfg(test)]
mod service_tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("notes.txt").unwrap(), "notes.txt");
        assert_eq!(sanitize_file_name("../../etc/guide.PDF").unwrap(), "guide.PDF");
        assert_eq!(sanitize_file_name("C:\\docs\\readme.md").unwrap(), "readme.md");

        for bad in ["", "dir/", "..", "photo.png", "archive"] {
            assert!(sanitize_file_name(bad).unwrap_err().is_config(), "{bad:?}");
        }
    }
}
