//! Retrieval request and response types.

use crate::types::SearchHit;
use serde::{Deserialize, Serialize};

/// A question against one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub collection: String,
    pub query: String,

    /// Number of passages to return
    pub k: usize,

    /// Diversify results with maximal marginal relevance
    #[serde(default)]
    pub use_mmr: bool,
}

impl RetrievalRequest {
    pub fn new(collection: impl Into<String>, query: impl Into<String>, k: usize) -> Self {
        Self {
            collection: collection.into(),
            query: query.into(),
            k,
            use_mmr: false,
        }
    }

    pub fn with_mmr(mut self, use_mmr: bool) -> Self {
        self.use_mmr = use_mmr;
        self
    }
}

/// User-facing location of a passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageMetadata {
    /// Source file name
    pub source: String,

    /// Lowercased extension including the dot
    pub file_type: String,

    /// 1-based page number (PDF only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    pub chunk_index: u64,
}

/// One retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,

    /// Cosine distance to the query (lower is closer)
    pub distance: f32,

    pub metadata: PassageMetadata,
}

impl From<SearchHit> for Passage {
    fn from(hit: SearchHit) -> Self {
        let document = hit.metadata.document;
        Self {
            text: hit.text,
            distance: hit.distance,
            metadata: PassageMetadata {
                source: document.source,
                file_type: document.file_type,
                page: document.page.map(|p| p + 1),
                chunk_index: hit.metadata.chunk_index,
            },
        }
    }
}

/// Passages retrieved for a request, best first (or in MMR pick order).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub collection: String,
    pub query: String,
    pub passages: Vec<Passage>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Passage texts joined by blank lines, ready to hand to an answer generator.
    pub fn context(&self) -> String {
        self.passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
