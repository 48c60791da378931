//! Health command handler.
//!
//! Reports the embedding configuration and which collections have a
//! persisted index. `--probe` also embeds a short query to check that the
//! provider answers.

use askdoc_core::config::AppConfig;
use askdoc_knowledge::{index, CollectionService};
use clap::Args;
use std::time::Instant;

/// Show provider settings and collection status
#[derive(Args, Debug)]
pub struct HealthCommand {
    /// Embed a probe query against the configured provider
    #[arg(long)]
    pub probe: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HealthCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let service = CollectionService::from_config(config)?;
        let manager = service.manager();
        let embedder = manager.embedder();

        let mut collections = Vec::new();
        for name in service.list_collections()? {
            let indexed = index::artifact_exists(&manager.layout().index_path(&name)?);
            collections.push(serde_json::json!({ "name": name, "indexed": indexed }));
        }

        let probe = if self.probe {
            let start = Instant::now();
            let status = match embedder.embed_query("health check").await {
                Ok(_) => serde_json::json!({
                    "ok": true,
                    "latencyMs": start.elapsed().as_millis() as u64,
                }),
                Err(e) => serde_json::json!({ "ok": false, "error": e.to_string() }),
            };
            Some(status)
        } else {
            None
        };

        let report = serde_json::json!({
            "provider": embedder.provider_name(),
            "model": embedder.model_name(),
            "dimensions": embedder.dimensions(),
            "dataRoot": manager.layout().data_root(),
            "indexRoot": manager.layout().index_root(),
            "chunkSize": service.chunk_config().chunk_size(),
            "chunkOverlap": service.chunk_config().chunk_overlap(),
            "collections": collections,
            "probe": probe,
        });

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        println!(
            "Embeddings: {} / {} ({} dims)",
            embedder.provider_name(),
            embedder.model_name(),
            embedder.dimensions()
        );
        println!("Data root:  {:?}", manager.layout().data_root());
        println!("Index root: {:?}", manager.layout().index_root());
        println!(
            "Chunking:   {} chars, {} overlap",
            service.chunk_config().chunk_size(),
            service.chunk_config().chunk_overlap()
        );

        if collections.is_empty() {
            println!("Collections: (none)");
        } else {
            println!("Collections:");
            for entry in &collections {
                let status = if entry["indexed"].as_bool().unwrap_or(false) {
                    "indexed"
                } else {
                    "not indexed"
                };
                println!("  - {} ({})", entry["name"].as_str().unwrap_or_default(), status);
            }
        }

        if let Some(probe) = &probe {
            match probe["ok"].as_bool() {
                Some(true) => println!("Probe: ok ({} ms)", probe["latencyMs"]),
                _ => println!("Probe: failed ({})", probe["error"].as_str().unwrap_or_default()),
            }
        }

        Ok(())
    }
}
