//! Test embedders and fixtures shared by the scenario tests.

use crate::embeddings::providers::hash::HashProvider;
use crate::embeddings::EmbeddingProvider;
use crate::layout::CollectionLayout;
use crate::manager::IndexManager;
use askdoc_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::{Notify, Semaphore};

/// Embeds known texts to fixed vectors; anything else is a provider error.
#[derive(Debug)]
pub struct FixedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    dimensions: usize,
}

impl FixedEmbedder {
    pub fn new(pairs: Vec<(&str, Vec<f32>)>) -> Self {
        let dimensions = pairs.first().map(|(_, v)| v.len()).unwrap_or(0);
        Self {
            vectors: pairs
                .into_iter()
                .map(|(text, vector)| (text.to_string(), vector))
                .collect(),
            dimensions,
        }
    }

    fn lookup(&self, text: &str) -> AppResult<Vec<f32>> {
        self.vectors
            .get(text.trim())
            .cloned()
            .ok_or_else(|| AppError::Provider(format!("no fixed vector for {:?}", text)))
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for FixedEmbedder {
    fn provider_name(&self) -> &str {
        "fixed"
    }

    fn model_name(&self) -> &str {
        "fixed-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.lookup(t)).collect()
    }
}

/// Hash embedder whose document embedding can be held open or made to fail.
///
/// While gated, every `embed_batch` call signals `entered` and then waits for
/// `release`. Query embeddings are never gated.
#[derive(Debug)]
pub struct GatedEmbedder {
    inner: HashProvider,
    gated: AtomicBool,
    failing: AtomicBool,
    entered: Notify,
    permits: Semaphore,
}

impl GatedEmbedder {
    pub fn new() -> Self {
        Self {
            inner: HashProvider::new(64),
            gated: AtomicBool::new(false),
            failing: AtomicBool::new(false),
            entered: Notify::new(),
            permits: Semaphore::new(0),
        }
    }

    pub fn close_gate(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Wait until a gated embedding call is in progress.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Let every waiting and future call through.
    pub fn open_gate(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.permits.add_permits(1024);
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for GatedEmbedder {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if self.gated.load(Ordering::SeqCst) {
            self.entered.notify_one();
            let permit = self
                .permits
                .acquire()
                .await
                .map_err(|e| AppError::Provider(e.to_string()))?;
            permit.forget();
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Provider("embedding service unavailable".to_string()));
        }

        self.inner.embed_batch(texts).await
    }

    async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>> {
        self.inner.embed_query(text).await
    }
}

pub fn layout(temp: &TempDir) -> CollectionLayout {
    CollectionLayout::new(temp.path().join("data"), temp.path().join("index"))
}

pub fn manager_with(temp: &TempDir, embedder: Arc<dyn EmbeddingProvider>) -> Arc<IndexManager> {
    Arc::new(IndexManager::new(layout(temp), embedder))
}

/// Write `contents` to `<data_root>/<collection>/<file>`.
pub fn write_doc(temp: &TempDir, collection: &str, file: &str, contents: &str) {
    let dir = layout(temp).data_dir(collection).unwrap();
    std::fs::write(dir.join(file), contents).unwrap();
}

pub fn remove_doc(temp: &TempDir, collection: &str, file: &str) {
    let dir = layout(temp).data_dir(collection).unwrap();
    std::fs::remove_file(dir.join(file)).unwrap();
}
