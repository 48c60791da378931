//! Retrieval over collection indexes.
//!
//! Embeds a question, searches the collection's published index and returns
//! the passages with normalized source metadata. Answer generation is left to
//! callers; `RetrievalResult::context` gives them the joined passages.

pub mod retrieve;
pub mod types;

pub use retrieve::retrieve;
pub use types::{Passage, PassageMetadata, RetrievalRequest, RetrievalResult};
