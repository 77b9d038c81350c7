//! Per-namespace cache index persistence
//!
//! Each namespace directory holds one JSON index mapping version strings
//! to the stored binary path. The index is written pretty-printed with
//! sorted keys so it stays human-diffable.

use crate::error::{SamulatorError, SamulatorResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Index file name inside every namespace directory
pub const INDEX_FILENAME: &str = ".cache_index";

/// Version -> stored binary path for a single namespace
pub type VersionIndex = BTreeMap<String, PathBuf>;

/// Path of the index file for a namespace directory
pub fn index_path(namespace_dir: &Path) -> PathBuf {
    namespace_dir.join(INDEX_FILENAME)
}

/// Staging file the index is written to before the rename
pub(crate) fn tmp_index_path(namespace_dir: &Path) -> PathBuf {
    namespace_dir.join(format!("{}.tmp", INDEX_FILENAME))
}

/// Load the index of a namespace directory
///
/// A missing or malformed index is an error: the namespace directory
/// exists, so something claims to be cached there.
pub async fn load_index(namespace_dir: &Path) -> SamulatorResult<VersionIndex> {
    let path = index_path(namespace_dir);
    let content = fs::read(&path)
        .await
        .map_err(|e| SamulatorError::CacheIndexRead {
            path: path.clone(),
            source: e,
        })?;

    let index: VersionIndex = serde_json::from_slice(&content)
        .map_err(|e| SamulatorError::CacheIndexParse { path, source: e })?;

    debug!(
        "Loaded {} cached version(s) from {}",
        index.len(),
        namespace_dir.display()
    );
    Ok(index)
}

/// Persist the index of a namespace directory
///
/// Written to a sibling temp file first and renamed into place, so a
/// failed write never leaves a truncated index behind.
pub async fn write_index(namespace_dir: &Path, index: &VersionIndex) -> SamulatorResult<()> {
    let path = index_path(namespace_dir);
    let tmp = tmp_index_path(namespace_dir);

    let content = serde_json::to_string_pretty(index)?;
    fs::write(&tmp, content)
        .await
        .map_err(|e| SamulatorError::CacheIndexWrite {
            path: tmp.clone(),
            reason: e.to_string(),
        })?;

    fs::rename(&tmp, &path)
        .await
        .map_err(|e| SamulatorError::CacheIndexWrite {
            path: path.clone(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_then_load() {
        let dir = TempDir::new().unwrap();
        let mut index = VersionIndex::new();
        index.insert("v2".to_string(), dir.path().join("openbazaard_v2"));
        index.insert("v1".to_string(), dir.path().join("openbazaard_v1"));

        write_index(dir.path(), &index).await.unwrap();
        let loaded = load_index(dir.path()).await.unwrap();

        assert_eq!(loaded, index);
        assert!(!dir.path().join(".cache_index.tmp").exists());
    }

    #[tokio::test]
    async fn index_is_indented_and_sorted() {
        let dir = TempDir::new().unwrap();
        let mut index = VersionIndex::new();
        index.insert("b".to_string(), PathBuf::from("/cache/ns/b"));
        index.insert("a".to_string(), PathBuf::from("/cache/ns/a"));

        write_index(dir.path(), &index).await.unwrap();
        let raw = std::fs::read_to_string(index_path(dir.path())).unwrap();

        assert_eq!(
            raw,
            "{\n  \"a\": \"/cache/ns/a\",\n  \"b\": \"/cache/ns/b\"\n}"
        );
    }

    #[tokio::test]
    async fn missing_index_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = load_index(dir.path()).await.unwrap_err();
        assert!(matches!(err, SamulatorError::CacheIndexRead { .. }));
    }

    #[tokio::test]
    async fn garbage_index_is_parse_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(index_path(dir.path()), "{not json").unwrap();

        let err = load_index(dir.path()).await.unwrap_err();
        assert!(matches!(err, SamulatorError::CacheIndexParse { .. }));
    }
}
