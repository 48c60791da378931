//! Command handlers for the AskDoc CLI.
//!
//! Each command lives in its own submodule; shared output helpers live here.

pub mod ask;
pub mod collections;
pub mod health;
pub mod rebuild;
pub mod upload;

pub use ask::AskCommand;
pub use collections::CollectionsCommand;
pub use health::HealthCommand;
pub use rebuild::RebuildCommand;
pub use upload::UploadCommand;

use askdoc_knowledge::{ProgressEvent, ProgressReporter, RebuildOutcome};
use std::sync::Arc;

/// Progress lines on stderr, or nothing when stdout carries JSON.
pub(crate) fn progress_reporter(json: bool) -> ProgressReporter {
    if json {
        ProgressReporter::noop()
    } else {
        ProgressReporter::new(Arc::new(|event: ProgressEvent| {
            eprintln!("{}", event.format_simple())
        }))
    }
}

pub(crate) fn print_outcome(outcome: &RebuildOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    match outcome {
        RebuildOutcome::Rebuilt(stats) => println!(
            "Rebuilt '{}': {} documents, {} chunks, {} dims in {:.2}s",
            stats.collection, stats.documents, stats.chunks, stats.dimensions, stats.duration_secs
        ),
        RebuildOutcome::NoDocuments {
            collection,
            data_dir,
        } => println!(
            "No documents in {:?}; index for '{}' left unchanged",
            data_dir, collection
        ),
    }
    Ok(())
}
