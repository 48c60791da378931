//! Structured progress reporting for collection rebuilds.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Stage of a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuildPhase {
    Load,
    Chunk,
    Embed,
    Persist,
}

impl fmt::Display for RebuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RebuildPhase::Load => "load",
            RebuildPhase::Chunk => "chunk",
            RebuildPhase::Embed => "embed",
            RebuildPhase::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Progress event emitted during a rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub collection: String,
    pub phase: RebuildPhase,

    /// Items handled so far in this phase (documents, chunks, entries)
    pub current: u64,

    /// Total expected work, if known
    pub total: Option<u64>,

    pub message: String,

    /// Seconds since the reporter was created
    pub elapsed_secs: f64,
}

impl ProgressEvent {
    /// Percentage complete, when the total is known.
    pub fn percentage(&self) -> Option<f64> {
        self.total.map(|t| {
            if t > 0 {
                (self.current as f64 / t as f64) * 100.0
            } else {
                100.0
            }
        })
    }

    /// Format as a simple user-facing line.
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };
        let pct = self
            .percentage()
            .map(|p| format!(" ({:.0}%)", p))
            .unwrap_or_default();

        format!(
            "[{}:{}] {}{} - {}",
            self.collection, self.phase, progress, pct, self.message
        )
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Emits progress events through an optional callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Instant,
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("enabled", &self.callback.is_some())
            .finish()
    }
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Instant::now(),
        }
    }

    /// A reporter that drops every event.
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Instant::now(),
        }
    }

    pub fn emit(
        &self,
        collection: &str,
        phase: RebuildPhase,
        current: u64,
        total: Option<u64>,
        message: impl Into<String>,
    ) {
        let Some(callback) = &self.callback else {
            return;
        };

        let event = ProgressEvent {
            collection: collection.to_string(),
            phase,
            current,
            total,
            message: message.into(),
            elapsed_secs: self.start_time.elapsed().as_secs_f64(),
        };

        tracing::debug!(
            collection = %event.collection,
            phase = %event.phase,
            current = event.current,
            total = ?event.total,
            message = %event.message,
            elapsed_secs = event.elapsed_secs,
            "Progress event"
        );

        callback(event);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}
