//! Upload command handler.
//!
//! Copies a file into a collection and waits for the rebuild it triggers.

use super::{print_outcome, progress_reporter};
use anyhow::{anyhow, Context};
use askdoc_core::config::AppConfig;
use askdoc_knowledge::CollectionService;
use clap::Args;
use std::path::PathBuf;

/// Add a document to a collection and reindex it
#[derive(Args, Debug)]
pub struct UploadCommand {
    /// Collection name
    pub collection: String,

    /// File to add (.pdf, .txt or .md)
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl UploadCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let file_name = self
            .file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("{:?} does not name a file", self.file))?;

        let bytes = tokio::fs::read(&self.file)
            .await
            .with_context(|| format!("failed to read {:?}", self.file))?;

        let service = CollectionService::from_config_with_progress(
            config,
            progress_reporter(self.json),
        )?;

        let handle = service
            .upload_and_rebuild(&self.collection, file_name, &bytes)
            .await?;
        if !self.json {
            println!("Stored {} in '{}', rebuilding...", file_name, self.collection.trim());
        }

        let outcome = handle.await.context("rebuild task did not complete")??;
        print_outcome(&outcome, self.json)
    }
}
