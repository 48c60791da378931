//! Where each collection keeps its raw files and its index.
//!
//! ```text
//! <data_root>/<collection>/      uploaded source files
//! <index_root>/<collection>/     index.sqlite
//! ```

use askdoc_core::{AppConfig, AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CollectionLayout {
    data_root: PathBuf,
    index_root: PathBuf,
}

impl CollectionLayout {
    pub fn new(data_root: impl Into<PathBuf>, index_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            index_root: index_root.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.data_root, &config.index_root)
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn index_root(&self) -> &Path {
        &self.index_root
    }

    /// Raw file directory for `name`, created if missing.
    pub fn data_dir(&self, name: &str) -> AppResult<PathBuf> {
        let dir = self.data_root.join(validate_name(name)?);
        ensure_dir(&dir)?;
        Ok(dir)
    }

    /// Index directory for `name`, created if missing.
    pub fn index_dir(&self, name: &str) -> AppResult<PathBuf> {
        let dir = self.index_root.join(validate_name(name)?);
        ensure_dir(&dir)?;
        Ok(dir)
    }

    /// Ensure both directories of `name` exist. Returns the trimmed name.
    pub fn create_collection(&self, name: &str) -> AppResult<String> {
        let data_dir = self.data_dir(name)?;
        self.index_dir(name)?;

        tracing::info!("Collection '{}' ready at {:?}", name.trim(), data_dir);
        Ok(name.trim().to_string())
    }

    /// Index directory for `name` without touching the filesystem.
    pub fn index_path(&self, name: &str) -> AppResult<PathBuf> {
        Ok(self.index_root.join(validate_name(name)?))
    }

    /// Sorted names of the subdirectories under the data root.
    ///
    /// A missing data root means no collections, not an error.
    pub fn list_collections(&self) -> AppResult<Vec<String>> {
        let entries = match fs::read_dir(&self.data_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(AppError::Provider(format!(
                    "Failed to list collections in {:?}: {}",
                    self.data_root, e
                )))
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        Ok(names)
    }
}

/// Trim a collection name and reject anything that is not a single path component.
pub fn validate_name(name: &str) -> AppResult<&str> {
    let name = name.trim();

    if name.is_empty() {
        return Err(AppError::Config(
            "collection name must not be empty".to_string(),
        ));
    }

    if name == "." || name == ".." || name.contains(|c: char| matches!(c, '/' | '\\' | '\0')) {
        return Err(AppError::Config(format!(
            "invalid collection name '{}': must be a single directory name",
            name
        )));
    }

    Ok(name)
}

fn ensure_dir(dir: &Path) -> AppResult<()> {
    fs::create_dir_all(dir)
        .map_err(|e| AppError::Provider(format!("Failed to create directory {:?}: {}", dir, e)))
}
