//! Concrete embedding providers.

pub mod gemini;
pub mod hash;
pub mod ollama;

use askdoc_core::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Maximum attempts for a remote embedding request
pub(crate) const MAX_RETRIES: u32 = 3;

/// Initial backoff duration in milliseconds
pub(crate) const INITIAL_BACKOFF_MS: u64 = 100;

/// Request timeout in seconds
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Run `op` up to `MAX_RETRIES` times with exponential backoff.
///
/// Only `Provider` errors are retried; configuration mistakes fail at once.
pub(crate) async fn with_retries<T, F, Fut>(label: &str, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(AppError::Provider(msg)) if attempt + 1 < MAX_RETRIES => {
                attempt += 1;
                let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {}ms",
                    label, attempt, MAX_RETRIES, msg, backoff_ms
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Build the shared HTTP client for remote providers.
pub(crate) fn http_client() -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| AppError::Provider(format!("Failed to create HTTP client: {}", e)))
}
