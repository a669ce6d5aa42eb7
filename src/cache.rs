//! Rolling snapshot persistence
//!
//! The cache holds a single `snapshot.json`. Writes go through a temp file
//! that is synced and renamed into place, so a crash leaves either the old
//! or the new snapshot and never a torn one.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use crate::Result;
use crate::snapshot::Snapshot;

const SNAPSHOT_FILE: &str = "snapshot.json";

/// Write `contents` to `path` atomically (temp file, fsync, rename)
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;

    {
        let mut writer = BufWriter::new(&mut file);
        writer.write_all(contents)?;
        writer.flush()?;
    }
    file.sync_all()?;

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read a snapshot file; `Ok(None)` when it does not exist
pub fn load_snapshot(path: &Path) -> Result<Option<Snapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    Snapshot::from_json(&json).map(Some)
}

pub fn store_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    atomic_write(path, snapshot.to_json()?.as_bytes())
}

/// File name of the per-revision copy of a snapshot
pub fn revision_file_name(snapshot: &Snapshot) -> String {
    format!("snapshot_{}.json", snapshot.revision())
}

/// The rolling snapshot in a cache directory
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    dir: PathBuf,
}

impl SnapshotCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    /// Load the rolling snapshot; `Ok(None)` before the first revision
    pub fn load(&self) -> Result<Option<Snapshot>> {
        let snapshot = load_snapshot(&self.path())?;
        if let Some(snapshot) = &snapshot {
            tracing::debug!(
                revision = %snapshot.revision(),
                functions = snapshot.len(),
                "loaded rolling snapshot"
            );
        }
        Ok(snapshot)
    }

    pub fn store(&self, snapshot: &Snapshot) -> Result<()> {
        store_snapshot(&self.path(), snapshot)?;
        tracing::debug!(revision = %snapshot.revision(), "stored rolling snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;
    use crate::snapshot::Revision;
    use crate::storage::{DefinitionRow, RawTables};
    use tempfile::TempDir;

    fn snapshot(revision: &str) -> Snapshot {
        let tables = RawTables {
            definitions: vec![DefinitionRow::new(1, "a.cpp", "f()", 1, 4)],
            ..Default::default()
        };
        assemble(&tables, Revision::new(revision)).unwrap()
    }

    #[test]
    fn test_empty_cache_loads_none() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path().join("cache"));
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_store_then_load() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());

        cache.store(&snapshot("r1")).unwrap();
        cache.store(&snapshot("r2")).unwrap();

        let loaded = cache.load().unwrap().unwrap();
        assert_eq!(loaded, snapshot("r2"));
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("snapshot.json");

        atomic_write(&path, b"{}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert!(!path.with_extension("tmp").exists());
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_revision_file_name() {
        assert_eq!(revision_file_name(&snapshot("abc123")), "snapshot_abc123.json");
    }
}
