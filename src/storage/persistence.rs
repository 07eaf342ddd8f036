//! JSON snapshot persistence for the chunk store
//!
//! The whole table is written to a single file. Writes go to a temporary
//! sibling first and are renamed into place, so a crash never leaves a
//! half-written snapshot behind.

use crate::storage::{Chunk, StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Version of the snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk image of a [`ChunkStore`](crate::storage::ChunkStore)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub dimension: usize,
    pub next_id: i64,
    pub chunks: Vec<Chunk>,
}

/// Manages reading and writing the snapshot file
#[derive(Debug, Clone)]
pub struct StorePersistence {
    path: PathBuf,
}

impl StorePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the snapshot, or `None` when no file exists yet
    pub fn load(&self) -> StorageResult<Option<Snapshot>> {
        if !self.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path).map_err(|e| StorageError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        let snapshot: Snapshot = serde_json::from_str(&json)?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StorageError::InvalidSnapshot {
                path: self.path.clone(),
                reason: format!(
                    "expected version {SNAPSHOT_VERSION}, got {}",
                    snapshot.version
                ),
            });
        }

        Ok(Some(snapshot))
    }

    /// Write the snapshot atomically
    #[must_use = "Save errors should be handled to ensure data is persisted"]
    pub fn save(&self, snapshot: &Snapshot) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let json = serde_json::to_vec(snapshot)?;
        let temp_path = self.path.with_extension("json.tmp");

        fs::write(&temp_path, json).map_err(|e| StorageError::Io {
            path: temp_path.clone(),
            source: e,
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| StorageError::Io {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_none() {
        let temp_dir = TempDir::new().unwrap();
        let persistence = StorePersistence::new(temp_dir.path().join("chunks.json"));

        assert!(!persistence.exists());
        assert!(persistence.load().unwrap().is_none());
    }

    #[test]
    fn test_save_creates_parent_and_reloads() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("chunks.json");
        let persistence = StorePersistence::new(&path);

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            dimension: 3,
            next_id: 8,
            chunks: Vec::new(),
        };
        persistence.save(&snapshot).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = persistence.load().unwrap().unwrap();
        assert_eq!(loaded.dimension, 3);
        assert_eq!(loaded.next_id, 8);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chunks.json");
        fs::write(
            &path,
            r#"{"version": 99, "dimension": 3, "next_id": 1, "chunks": []}"#,
        )
        .unwrap();

        let err = StorePersistence::new(&path).load().unwrap_err();
        assert!(matches!(err, StorageError::InvalidSnapshot { .. }));
    }
}
