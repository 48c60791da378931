//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Metadata attached to a loaded document.
///
/// The fields the pipeline reasons about are typed; anything else a loader
/// wants to carry goes into `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Originating file name
    pub source: String,

    /// Lowercased file extension including the dot (".pdf", ".txt", ".md")
    pub file_type: String,

    /// Page number inside the source, 0-based (PDF only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Loader-specific extension fields
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DocumentMetadata {
    /// Metadata for a whole-file document.
    pub fn new(source: impl Into<String>, file_type: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            file_type: file_type.into(),
            page: None,
            extra: BTreeMap::new(),
        }
    }

    /// Same metadata, pinned to a 0-based page.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// One unit of loaded text, as produced by a document loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub text: String,
    pub metadata: DocumentMetadata,
}

impl SourceDocument {
    pub fn new(text: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// Metadata of a chunk: its document's metadata plus where it sits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(flatten)]
    pub document: DocumentMetadata,

    /// Sequential index across one ingestion batch (tracing aid, not an identity)
    pub chunk_index: u64,

    /// Character offset of the first char inside the source text
    pub start: usize,

    /// Character offset one past the last char inside the source text
    pub end: usize,
}

/// A bounded, overlapping slice of a source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.metadata.end - self.metadata.start
    }
}

/// A search result: chunk text, its metadata and the cosine distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub distance: f32,
}

/// Statistics from a completed rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildStats {
    /// Collection that was rebuilt
    pub collection: String,

    /// Number of documents loaded
    pub documents: usize,

    /// Number of chunks embedded
    pub chunks: usize,

    /// Embedding vector dimension
    pub dimensions: usize,

    /// SHA-256 over every chunk text, in order
    pub corpus_fingerprint: String,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Result of a rebuild request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RebuildOutcome {
    /// A fresh index was built, persisted and published.
    Rebuilt(RebuildStats),

    /// The data directory held no eligible documents; nothing changed.
    NoDocuments { collection: String, data_dir: PathBuf },
}

impl RebuildOutcome {
    pub fn is_rebuilt(&self) -> bool {
        matches!(self, RebuildOutcome::Rebuilt(_))
    }
}
