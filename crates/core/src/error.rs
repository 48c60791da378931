//! Error types for AskDoc.
//!
//! A single error enum covers the categories callers need to tell apart:
//! configuration mistakes, missing collection indexes, provider/storage
//! failures, and serialization problems.

use thiserror::Error;

/// Unified error type for AskDoc.
///
/// `NotFound` is kept distinct from every other variant so that an outer
/// layer (CLI, HTTP) can answer "ingest documents first" instead of reporting
/// an internal failure.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid parameters, names or credentials. Not retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A collection index or load target does not exist yet.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Embedding provider or storage failure during build, rebuild or query.
    #[error("Provider error: {0}")]
    Provider(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error means "nothing persisted yet".
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Whether this error is a configuration mistake.
    pub fn is_config(&self) -> bool {
        matches!(self, AppError::Config(_))
    }

    /// Prefix the message with the collection it concerns, keeping the kind.
    ///
    /// Raw I/O errors become `Provider` errors since storage failures are
    /// reported as provider failures once they reach the manager.
    pub fn in_collection(self, name: &str) -> Self {
        let prefix = |msg: String| format!("collection '{}': {}", name, msg);
        match self {
            AppError::Config(msg) => AppError::Config(prefix(msg)),
            AppError::NotFound(msg) => AppError::NotFound(prefix(msg)),
            AppError::Provider(msg) => AppError::Provider(prefix(msg)),
            AppError::Io(err) => AppError::Provider(prefix(err.to_string())),
            AppError::Serialization(msg) => AppError::Serialization(prefix(msg)),
            AppError::Other(msg) => AppError::Other(prefix(msg)),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
