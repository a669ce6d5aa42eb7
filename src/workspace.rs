//! Workspace guard: scratch directory plus the cache lock
//!
//! Holding a [`Workspace`] means this process owns the cache directory.
//! Dropping it releases the lock and removes a temporary scratch directory,
//! on every exit path.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use fs2::FileExt;
use tempfile::TempDir;
use crate::config::{ensure_dir, RevgraphConfig};
use crate::snapshot::Revision;
use crate::{Error, Result};

const LOCK_FILE: &str = "revgraph.lock";

/// Exclusive advisory lock, released on drop
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Take the lock without blocking; `Ok(None)` when another process has it.
    pub fn try_acquire(lock_path: &Path) -> io::Result<Option<Self>> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file })),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

enum Scratch {
    Temp(TempDir),
    Fixed(PathBuf),
}

pub struct Workspace {
    scratch: Scratch,
    cache_dir: PathBuf,
    _lock: FileLock,
}

impl Workspace {
    /// Lock the cache directory and set up scratch space.
    ///
    /// Fails with [`Error::Locked`] if another process holds the cache.
    pub fn open(config: &RevgraphConfig) -> Result<Self> {
        let cache_dir = config.cache_dir();
        ensure_dir(&cache_dir)?;

        let lock_path = cache_dir.join(LOCK_FILE);
        let lock = FileLock::try_acquire(&lock_path)?
            .ok_or_else(|| Error::Locked(lock_path.display().to_string()))?;

        let scratch = match &config.work_dir {
            Some(dir) => {
                ensure_dir(dir)?;
                Scratch::Fixed(dir.clone())
            }
            None => Scratch::Temp(tempfile::Builder::new().prefix("revgraph-").tempdir()?),
        };

        tracing::debug!(cache = %cache_dir.display(), "workspace locked");
        Ok(Self {
            scratch,
            cache_dir,
            _lock: lock,
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        match &self.scratch {
            Scratch::Temp(dir) => dir.path(),
            Scratch::Fixed(dir) => dir,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Scratch location for the diff of a revision being applied
    pub fn patch_path(&self, revision: &Revision) -> PathBuf {
        self.scratch_dir().join(format!("patch_{}.diff", revision))
    }

    /// Scratch location for a freshly assembled snapshot
    pub fn staged_snapshot_path(&self, revision: &Revision) -> PathBuf {
        self.scratch_dir().join(format!("after_{}.json", revision))
    }
}
