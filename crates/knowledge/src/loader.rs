//! Source document loading.
//!
//! Walks a collection's data directory and extracts text from supported files:
//! plain text and Markdown as whole-file documents, PDFs as one document per
//! page.

use crate::types::{DocumentMetadata, SourceDocument};
use askdoc_core::{AppError, AppResult};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// File extensions (lowercase, with dot) accepted for ingestion.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = [".pdf", ".txt", ".md"];

/// Produces source documents from a directory.
pub trait DocumentLoader: Send + Sync {
    /// Load every eligible document under `dir`.
    ///
    /// `NotFound` if `dir` does not exist. Unreadable individual files are
    /// skipped with a warning rather than failing the batch.
    fn load(&self, dir: &Path) -> AppResult<Vec<SourceDocument>>;
}

/// Lowercased extension of `path` including the dot, if supported.
pub fn supported_extension(path: &Path) -> Option<String> {
    let ext = format!(".{}", path.extension()?.to_str()?.to_lowercase());
    SUPPORTED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Recursive loader over the local filesystem.
#[derive(Debug, Default, Clone)]
pub struct DirectoryLoader;

impl DirectoryLoader {
    pub fn new() -> Self {
        Self
    }

    fn load_file(&self, path: &Path, file_type: &str) -> AppResult<Vec<SourceDocument>> {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let bytes = fs::read(path)
            .map_err(|e| AppError::Provider(format!("Failed to read {:?}: {}", path, e)))?;

        if file_type == ".pdf" {
            let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| {
                AppError::Provider(format!("Failed to extract PDF text from {:?}: {}", path, e))
            })?;

            Ok(pages
                .into_iter()
                .enumerate()
                .map(|(page, text)| {
                    SourceDocument::new(
                        text,
                        DocumentMetadata::new(source.clone(), file_type).with_page(page as u32),
                    )
                })
                .collect())
        } else {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            Ok(vec![SourceDocument::new(
                text,
                DocumentMetadata::new(source, file_type),
            )])
        }
    }
}

impl DocumentLoader for DirectoryLoader {
    fn load(&self, dir: &Path) -> AppResult<Vec<SourceDocument>> {
        if !dir.is_dir() {
            return Err(AppError::NotFound(format!(
                "document directory {:?} does not exist",
                dir
            )));
        }

        let mut documents = Vec::new();
        let mut files = 0usize;

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {:?}: {}", dir, e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(file_type) = supported_extension(path) else {
                tracing::debug!("Skipping unsupported file {:?}", path);
                continue;
            };

            match self.load_file(path, &file_type) {
                Ok(docs) => {
                    files += 1;
                    let before = documents.len();
                    documents.extend(docs.into_iter().filter(|d| !d.text.trim().is_empty()));
                    tracing::debug!(
                        "Loaded {} documents from {:?}",
                        documents.len() - before,
                        path
                    );
                }
                Err(e) => tracing::warn!("Skipping {:?}: {}", path, e),
            }
        }

        tracing::info!(
            "Loaded {} documents from {} files in {:?}",
            documents.len(),
            files,
            dir
        );

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_loads_text_and_markdown_sorted() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.md"), "# Heading\n\nBody").unwrap();
        fs::write(temp.path().join("a.TXT"), "plain text").unwrap();
        fs::write(temp.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let docs = DirectoryLoader::new().load(temp.path()).unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.source, "a.TXT");
        assert_eq!(docs[0].metadata.file_type, ".txt");
        assert_eq!(docs[0].metadata.page, None);
        assert_eq!(docs[1].text, "# Heading\n\nBody");
    }

    #[test]
    fn test_recurses_into_subdirectories() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("nested/deeper")).unwrap();
        fs::write(temp.path().join("nested/deeper/notes.txt"), "deep").unwrap();

        let docs = DirectoryLoader::new().load(temp.path()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.source, "notes.txt");
    }

    #[test]
    fn test_whitespace_only_documents_dropped() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("blank.txt"), "  \n\t ").unwrap();

        assert!(DirectoryLoader::new().load(temp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_utf8_read_lossily() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("latin1.txt"), [b'c', b'a', 0xE9, b'!']).unwrap();

        let docs = DirectoryLoader::new().load(temp.path()).unwrap();
        assert_eq!(docs[0].text, "ca\u{FFFD}!");
    }

    #[test]
    fn test_broken_pdf_skipped() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("broken.pdf"), b"not really a pdf").unwrap();
        fs::write(temp.path().join("ok.txt"), "fine").unwrap();

        let docs = DirectoryLoader::new().load(temp.path()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.source, "ok.txt");
    }

    #[test]
    fn test_missing_directory_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = DirectoryLoader::new()
            .load(&temp.path().join("missing"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_supported_extension() {
        assert_eq!(supported_extension(Path::new("x.PDF")).as_deref(), Some(".pdf"));
        assert_eq!(supported_extension(Path::new("x.md")).as_deref(), Some(".md"));
        assert_eq!(supported_extension(Path::new("x.docx")), None);
        assert_eq!(supported_extension(Path::new("README")), None);
    }
}
