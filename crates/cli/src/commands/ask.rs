//! Ask command handler.
//!
//! Retrieves passages for a question; answer synthesis is left to the reader.

use askdoc_core::config::AppConfig;
use askdoc_knowledge::CollectionService;
use clap::Args;

/// Retrieve the passages most relevant to a question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// Collection name
    pub collection: String,

    /// Question text
    pub query: String,

    /// Number of passages to retrieve
    #[arg(short = 'k', long, default_value = "4")]
    pub top_k: usize,

    /// Diversify passages with maximal marginal relevance
    #[arg(long)]
    pub mmr: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::debug!("Ask command options: {:?}", self);

        let service = CollectionService::from_config(config)?;
        let result = service
            .ask(&self.collection, &self.query, self.top_k, self.mmr)
            .await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
        }

        if result.is_empty() {
            println!("No passages found in '{}'", result.collection);
            return Ok(());
        }

        for (rank, passage) in result.passages.iter().enumerate() {
            let meta = &passage.metadata;
            let location = match meta.page {
                Some(page) => format!("{}, page {}", meta.source, page),
                None => meta.source.clone(),
            };
            println!(
                "[{}] {} (distance {:.4})",
                rank + 1,
                location,
                passage.distance
            );
            println!("{}", passage.text.trim());
            println!();
        }

        Ok(())
    }
}
