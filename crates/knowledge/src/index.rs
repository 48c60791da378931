//! SQLite artifact for a persisted collection index.
//!
//! One file per collection, `index.sqlite`, holding a `meta` key/value table
//! (the manifest) and an `entries` table (text, little-endian f32 embedding
//! blob, JSON metadata). Saves write a uniquely named temporary file in the
//! same directory and rename it over the previous artifact, so a concurrent
//! reader opens either the old file or the new one.

use crate::vector_index::{IndexEntry, IndexManifest, VectorIndex};
use askdoc_core::{AppError, AppResult};
use rusqlite::{params, Connection, OpenFlags};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// File name of the artifact inside an index directory.
pub const INDEX_FILE: &str = "index.sqlite";

/// Bumped when the table layout changes.
const SCHEMA_VERSION: &str = "1";

/// Path of the artifact inside `dir`.
pub fn artifact_path(dir: &Path) -> PathBuf {
    dir.join(INDEX_FILE)
}

/// Whether `dir` holds a persisted artifact.
pub fn artifact_exists(dir: &Path) -> bool {
    artifact_path(dir).is_file()
}

fn db_err(context: &'static str) -> impl Fn(rusqlite::Error) -> AppError {
    move |e| AppError::Provider(format!("{}: {}", context, e))
}

/// Write `index` to `dir`, replacing any previous artifact atomically.
pub fn save_index(index: &VectorIndex, dir: &Path) -> AppResult<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::Provider(format!("Failed to create index directory {:?}: {}", dir, e)))?;

    let tmp_path = dir.join(format!(".{}.tmp-{}", INDEX_FILE, uuid::Uuid::new_v4()));

    if let Err(e) = write_artifact(index, &tmp_path) {
        remove_quietly(&tmp_path);
        return Err(e);
    }

    if let Err(e) = std::fs::rename(&tmp_path, artifact_path(dir)) {
        remove_quietly(&tmp_path);
        return Err(AppError::Provider(format!(
            "Failed to publish index artifact in {:?}: {}",
            dir, e
        )));
    }

    tracing::debug!(
        "Saved index with {} entries to {:?}",
        index.len(),
        artifact_path(dir)
    );
    Ok(())
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove temporary index file {:?}: {}", path, e);
        }
    }
}

fn write_artifact(index: &VectorIndex, path: &Path) -> AppResult<()> {
    let mut conn = Connection::open(path).map_err(db_err("Failed to create SQLite index"))?;

    conn.execute_batch(
        r#"
        CREATE TABLE meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE entries (
            position INTEGER PRIMARY KEY,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            metadata TEXT NOT NULL
        );
        "#,
    )
    .map_err(db_err("Failed to create tables"))?;

    let tx = conn
        .transaction()
        .map_err(db_err("Failed to start transaction"))?;

    {
        let manifest = index.manifest();
        let mut stmt = tx
            .prepare("INSERT INTO meta (key, value) VALUES (?1, ?2)")
            .map_err(db_err("Failed to prepare manifest insert"))?;
        let rows = [
            ("schema_version", SCHEMA_VERSION.to_string()),
            ("provider", manifest.provider.clone()),
            ("model", manifest.model.clone()),
            ("dimensions", manifest.dimensions.to_string()),
            ("count", manifest.count.to_string()),
            ("corpus_fingerprint", manifest.corpus_fingerprint.clone()),
            ("built_at", manifest.built_at.to_rfc3339()),
        ];
        for (key, value) in rows {
            stmt.execute(params![key, value])
                .map_err(db_err("Failed to write manifest"))?;
        }

        let mut stmt = tx
            .prepare("INSERT INTO entries (position, text, embedding, metadata) VALUES (?1, ?2, ?3, ?4)")
            .map_err(db_err("Failed to prepare entry insert"))?;
        for (position, entry) in index.entries().iter().enumerate() {
            let metadata = serde_json::to_string(&entry.metadata)?;
            stmt.execute(params![
                position as i64,
                entry.text,
                embedding_to_bytes(&entry.embedding),
                metadata,
            ])
            .map_err(db_err("Failed to write entry"))?;
        }
    }

    tx.commit().map_err(db_err("Failed to commit index"))?;
    conn.close()
        .map_err(|(_, e)| db_err("Failed to close index")(e))?;

    Ok(())
}

/// Read the artifact in `dir`.
///
/// `NotFound` when the directory or the artifact does not exist.
pub fn load_index(dir: &Path) -> AppResult<VectorIndex> {
    let path = artifact_path(dir);
    if !path.is_file() {
        return Err(AppError::NotFound(format!(
            "no persisted index at {:?}",
            path
        )));
    }

    let conn = Connection::open_with_flags(
        &path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(db_err("Failed to open SQLite index"))?;

    let meta: HashMap<String, String> = {
        let mut stmt = conn
            .prepare("SELECT key, value FROM meta")
            .map_err(db_err("Failed to read manifest"))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(db_err("Failed to read manifest"))?;
        rows.collect::<Result<HashMap<_, _>, _>>()
            .map_err(db_err("Failed to read manifest"))?
    };

    let manifest = manifest_from_meta(&meta)?;

    let mut stmt = conn
        .prepare("SELECT text, embedding, metadata FROM entries ORDER BY position")
        .map_err(db_err("Failed to read entries"))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .map_err(db_err("Failed to read entries"))?;

    let mut entries = Vec::with_capacity(manifest.count);
    for row in rows {
        let (text, blob, metadata) = row.map_err(db_err("Failed to read entry"))?;
        entries.push(IndexEntry {
            embedding: bytes_to_embedding(&blob)?,
            text,
            metadata: serde_json::from_str(&metadata)?,
        });
    }

    tracing::debug!("Loaded index with {} entries from {:?}", entries.len(), path);

    VectorIndex::from_parts(manifest, entries)
}

fn manifest_from_meta(meta: &HashMap<String, String>) -> AppResult<IndexManifest> {
    let get = |key: &str| {
        meta.get(key)
            .cloned()
            .ok_or_else(|| AppError::Provider(format!("index manifest is missing '{}'", key)))
    };
    let parse_usize = |key: &str| -> AppResult<usize> {
        get(key)?
            .parse()
            .map_err(|e| AppError::Provider(format!("invalid '{}' in index manifest: {}", key, e)))
    };

    let version = get("schema_version")?;
    if version != SCHEMA_VERSION {
        return Err(AppError::Config(format!(
            "index schema version {} is not supported (expected {}); rebuild the collection",
            version, SCHEMA_VERSION
        )));
    }

    let built_at = chrono::DateTime::parse_from_rfc3339(&get("built_at")?)
        .map_err(|e| AppError::Provider(format!("invalid 'built_at' in index manifest: {}", e)))?
        .with_timezone(&chrono::Utc);

    Ok(IndexManifest {
        provider: get("provider")?,
        model: get("model")?,
        dimensions: parse_usize("dimensions")?,
        count: parse_usize("count")?,
        corpus_fingerprint: get("corpus_fingerprint")?,
        built_at,
    })
}

/// Convert embedding vector to little-endian bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Convert stored bytes back to an embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Provider(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkMetadata, DocumentMetadata};
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample_index(texts: &[&str]) -> VectorIndex {
        let entries: Vec<IndexEntry> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| IndexEntry {
                embedding: vec![i as f32, 1.0, -0.5],
                text: text.to_string(),
                metadata: ChunkMetadata {
                    document: DocumentMetadata::new("manual.pdf", ".pdf").with_page(i as u32),
                    chunk_index: i as u64,
                    start: 0,
                    end: text.chars().count(),
                },
            })
            .collect();

        let manifest = IndexManifest {
            provider: "hash".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 3,
            count: entries.len(),
            corpus_fingerprint: "abc".to_string(),
            built_at: Utc::now(),
        };
        VectorIndex::from_parts(manifest, entries).unwrap()
    }

    fn leftover_temp_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .count()
    }

    #[test]
    fn test_save_then_load_preserves_entries() {
        let temp = TempDir::new().unwrap();
        let index = sample_index(&["first", "second"]);

        save_index(&index, temp.path()).unwrap();
        let loaded = load_index(temp.path()).unwrap();

        assert_eq!(loaded.manifest().model, "trigram-v1");
        assert_eq!(loaded.manifest().built_at, index.manifest().built_at);
        assert_eq!(loaded.entries(), index.entries());
        assert_eq!(leftover_temp_files(temp.path()), 0);
    }

    #[test]
    fn test_save_replaces_previous_artifact() {
        let temp = TempDir::new().unwrap();

        save_index(&sample_index(&["old"]), temp.path()).unwrap();
        save_index(&sample_index(&["new", "newer"]), temp.path()).unwrap();

        let loaded = load_index(temp.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.entries()[0].text, "new");
    }

    #[test]
    fn test_failed_save_removes_temporary_file() {
        let temp = TempDir::new().unwrap();
        // a non-empty directory in the artifact's place makes the final rename fail
        std::fs::create_dir_all(artifact_path(temp.path()).join("blocker")).unwrap();

        let err = save_index(&sample_index(&["doomed"]), temp.path()).unwrap_err();

        assert!(matches!(err, AppError::Provider(_)));
        assert_eq!(leftover_temp_files(temp.path()), 0);
        assert!(artifact_path(temp.path()).is_dir());
    }

    #[test]
    fn test_missing_artifact_is_not_found() {
        let temp = TempDir::new().unwrap();

        assert!(load_index(temp.path()).unwrap_err().is_not_found());
        assert!(load_index(&temp.path().join("absent"))
            .unwrap_err()
            .is_not_found());
        assert!(!artifact_exists(temp.path()));
    }

    #[test]
    fn test_embedding_bytes_round_trip() {
        let values = vec![0.25f32, -1.5, 3.0e-7];
        let bytes = embedding_to_bytes(&values);
        assert_eq!(bytes.len(), 12);
        assert_eq!(bytes_to_embedding(&bytes).unwrap(), values);
        assert!(bytes_to_embedding(&bytes[..5]).is_err());
    }
}
