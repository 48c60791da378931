//! Collections command handler.

use anyhow::Context;
use askdoc_core::config::AppConfig;
use askdoc_knowledge::CollectionLayout;
use clap::{Args, Subcommand};

/// List or create collections
#[derive(Args, Debug)]
pub struct CollectionsCommand {
    #[command(subcommand)]
    pub action: CollectionsAction,
}

#[derive(Subcommand, Debug)]
pub enum CollectionsAction {
    /// List collections under the data root
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create the data and index directories of a collection
    Create {
        /// Collection name
        name: String,
    },
}

impl CollectionsCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        // directory work only; no embedding provider needed
        let layout = CollectionLayout::from_config(config);

        match &self.action {
            CollectionsAction::List { json } => {
                let names = layout.list_collections()?;
                if *json {
                    println!("{}", serde_json::to_string_pretty(&names)?);
                } else if names.is_empty() {
                    println!("No collections under {:?}", config.data_root);
                } else {
                    for name in names {
                        println!("{}", name);
                    }
                }
            }
            CollectionsAction::Create { name } => {
                let name = layout
                    .create_collection(name)
                    .with_context(|| format!("failed to create collection '{}'", name))?;
                println!("Collection '{}' created", name);
            }
        }

        Ok(())
    }
}
