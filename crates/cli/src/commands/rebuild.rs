//! Rebuild command handler.

use super::{print_outcome, progress_reporter};
use askdoc_core::config::AppConfig;
use askdoc_knowledge::CollectionService;
use clap::Args;

/// Rebuild a collection's index from its raw files
#[derive(Args, Debug)]
pub struct RebuildCommand {
    /// Collection name
    pub collection: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RebuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Rebuilding collection '{}'", self.collection);

        let service = CollectionService::from_config_with_progress(
            config,
            progress_reporter(self.json),
        )?;
        let outcome = service.rebuild(&self.collection).await?;

        print_outcome(&outcome, self.json)
    }
}
