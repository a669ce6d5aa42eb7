//! Orchestration of the per-revision cycle
//!
//! `prepare` seeds the rolling snapshot from a full build; `update` folds a
//! file-scoped rebuild into it along the revision's diff and publishes the
//! resulting change set. Both run under a [`Workspace`] lock.

use std::path::Path;
use crate::{Error, Result};
use crate::assembler::assemble_from_database;
use crate::cache::{atomic_write, load_snapshot, revision_file_name, store_snapshot, SnapshotCache};
use crate::config::RevgraphConfig;
use crate::diff::Changeset;
use crate::merge::{advance, FilePartition};
use crate::sink::{ChangeReport, ChangeSink, JsonlChangeLog};
use crate::snapshot::{Revision, Snapshot};
use crate::workspace::Workspace;

/// Revision metadata carried into change reports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionInfo {
    pub revision: Revision,
    pub author: String,
    pub description: String,
}

impl RevisionInfo {
    pub fn new(revision: Revision) -> Self {
        Self {
            revision,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateSummary {
    pub revision: Revision,
    /// No rolling snapshot existed; nothing was merged or published
    pub bootstrapped: bool,
    pub partition: FilePartition,
    pub changeset: Changeset,
    pub files: usize,
    pub functions: usize,
    pub dangling_edges: usize,
}

pub struct Pipeline {
    config: RevgraphConfig,
    sinks: Vec<Box<dyn ChangeSink>>,
}

impl Pipeline {
    /// A pipeline without sinks
    pub fn new(config: RevgraphConfig) -> Self {
        Self {
            config,
            sinks: Vec::new(),
        }
    }

    /// A pipeline publishing to the configured JSON-lines change log
    pub fn from_config(config: RevgraphConfig) -> Self {
        let log = JsonlChangeLog::new(config.changes_log());
        Self::new(config).with_sink(Box::new(log))
    }

    pub fn with_sink(mut self, sink: Box<dyn ChangeSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn config(&self) -> &RevgraphConfig {
        &self.config
    }

    fn cache(&self, workspace: &Workspace) -> SnapshotCache {
        SnapshotCache::new(workspace.cache_dir())
    }

    fn keep_copy(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(dir) = &self.config.snapshot_dir {
            store_snapshot(&dir.join(revision_file_name(snapshot)), snapshot)?;
        }
        Ok(())
    }

    /// Write the diff and the freshly assembled snapshot to scratch and read
    /// them back, so the merge runs on exactly what a `work_dir` keeps.
    fn stage(
        &self,
        workspace: &Workspace,
        raw_database: &Path,
        revision: &Revision,
        diff: &str,
    ) -> Result<(Snapshot, String)> {
        let patch_path = workspace.patch_path(revision);
        atomic_write(&patch_path, diff.as_bytes())?;

        let staged_path = workspace.staged_snapshot_path(revision);
        let assembled = assemble_from_database(raw_database, revision.clone())?.snapshot;
        store_snapshot(&staged_path, &assembled)?;

        let after = load_snapshot(&staged_path)?.ok_or_else(|| {
            Error::InvalidSnapshot(format!("staged snapshot {} vanished", staged_path.display()))
        })?;
        let diff = std::fs::read_to_string(&patch_path)?;
        tracing::debug!(patch = %patch_path.display(), snapshot = %staged_path.display(), "staged revision");
        Ok((after, diff))
    }

    /// Assemble a full build and make it the rolling snapshot
    pub fn prepare(&mut self, raw_database: &Path, revision: Revision) -> Result<Snapshot> {
        let workspace = Workspace::open(&self.config)?;
        let assembly = assemble_from_database(raw_database, revision)?;

        self.cache(&workspace).store(&assembly.snapshot)?;
        self.keep_copy(&assembly.snapshot)?;

        tracing::info!(
            revision = %assembly.snapshot.revision(),
            files = assembly.stats.files,
            functions = assembly.stats.functions,
            "prepared rolling snapshot"
        );
        Ok(assembly.snapshot)
    }

    /// Fold a file-scoped rebuild into the rolling snapshot.
    ///
    /// The rolling snapshot is only replaced once the merge succeeded; a
    /// malformed diff leaves it untouched.
    pub fn update(&mut self, raw_database: &Path, info: RevisionInfo, diff: &str) -> Result<UpdateSummary> {
        let workspace = Workspace::open(&self.config)?;
        let (after, diff) = self.stage(&workspace, raw_database, &info.revision, diff)?;

        let cache = self.cache(&workspace);
        let before = cache.load()?;
        let bootstrapped = before.is_none();
        let outcome = advance(before, after, &diff)?;

        cache.store(&outcome.snapshot)?;
        self.keep_copy(&outcome.snapshot)?;

        if !bootstrapped {
            let report = ChangeReport {
                revision: info.revision.clone(),
                author: info.author,
                description: info.description,
                changes: outcome.changeset.clone(),
            };
            for sink in &mut self.sinks {
                sink.publish(&report)?;
                tracing::debug!(sink = sink.name(), "change report delivered");
            }
        }

        let snapshot = &outcome.snapshot;
        Ok(UpdateSummary {
            revision: info.revision,
            bootstrapped,
            files: snapshot.files().len(),
            functions: snapshot.len(),
            dangling_edges: snapshot.dangling_edges().len(),
            partition: outcome.partition,
            changeset: outcome.changeset,
        })
    }

    /// The current rolling snapshot, if any
    pub fn rolling_snapshot(&self) -> Result<Option<Snapshot>> {
        SnapshotCache::new(self.config.cache_dir()).load()
    }
}
