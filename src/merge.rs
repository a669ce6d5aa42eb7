//! Incremental merge of a file-scoped rebuild into the rolling snapshot
//!
//! The "after" snapshot only covers the files that were recompiled. Files
//! the diff touches are replaced wholesale; every other file keeps its
//! records exactly as they were.

use std::collections::{BTreeSet, HashMap};
use crate::Result;
use crate::diff::{Changeset, Patch, PatchDiffAnalyzer};
use crate::snapshot::Snapshot;

/// How the diff's paths relate to the two snapshots.
///
/// The four sets are disjoint and together hold every path of the diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct FilePartition {
    /// Known before, gone after
    pub deleted: BTreeSet<String>,
    /// New in after
    pub inserted: BTreeSet<String>,
    /// In both
    pub modified: BTreeSet<String>,
    /// In neither (headers, build files, anything not compiled)
    pub untracked: BTreeSet<String>,
}

impl FilePartition {
    pub fn compute(paths: &BTreeSet<String>, before: &Snapshot, after: &Snapshot) -> Self {
        let mut partition = Self::default();
        for path in paths {
            let set = match (before.contains_file(path), after.contains_file(path)) {
                (true, false) => &mut partition.deleted,
                (false, true) => &mut partition.inserted,
                (true, true) => &mut partition.modified,
                (false, false) => &mut partition.untracked,
            };
            set.insert(path.clone());
        }
        partition
    }

    /// Files whose records come from the "after" snapshot
    pub fn changed(&self) -> BTreeSet<&str> {
        self.inserted
            .iter()
            .chain(&self.modified)
            .map(String::as_str)
            .collect()
    }

    /// Files whose "before" records are discarded
    pub fn touched(&self) -> BTreeSet<&str> {
        let mut touched = self.changed();
        touched.extend(self.deleted.iter().map(String::as_str));
        touched
    }

    /// Every path, whichever set holds it
    pub fn paths(&self) -> BTreeSet<&str> {
        let mut paths = self.touched();
        paths.extend(self.untracked.iter().map(String::as_str));
        paths
    }
}

/// Result of one merge step
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub snapshot: Snapshot,
    pub changeset: Changeset,
    pub partition: FilePartition,
}

/// Merge `after` into `before` along a diff.
///
/// A malformed diff is an error and nothing is produced.
pub fn merge(before: Snapshot, after: Snapshot, diff: &str) -> Result<MergeOutcome> {
    let patch = Patch::parse(diff)?;
    merge_patch(before, after, &patch)
}

/// Advance the rolling snapshot by one revision.
///
/// Without a prior snapshot `after` becomes the rolling state as-is and the
/// change set is empty; the diff is not looked at.
pub fn advance(before: Option<Snapshot>, after: Snapshot, diff: &str) -> Result<MergeOutcome> {
    match before {
        Some(before) => merge(before, after, diff),
        None => {
            tracing::info!(revision = %after.revision(), "bootstrapping rolling snapshot");
            Ok(MergeOutcome {
                snapshot: after,
                changeset: Changeset::new(),
                partition: FilePartition::default(),
            })
        }
    }
}

pub fn merge_patch(before: Snapshot, after: Snapshot, patch: &Patch) -> Result<MergeOutcome> {
    let partition = FilePartition::compute(&patch.paths(), &before, &after);
    let changeset = PatchDiffAnalyzer::new(&before, &after).analyze(patch);

    let touched = partition.touched();
    let changed = partition.changed();

    let (before_files, before_defs, _) = before.into_parts();
    let (after_files, after_defs, revision) = after.into_parts();

    let mut files: Vec<String> = Vec::new();
    let mut file_ids: HashMap<String, usize> = HashMap::new();
    let mut remap = |path: &str, files: &mut Vec<String>| -> usize {
        *file_ids.entry(path.to_string()).or_insert_with(|| {
            files.push(path.to_string());
            files.len() - 1
        })
    };

    for path in &before_files {
        if !touched.contains(path.as_str()) {
            remap(path.as_str(), &mut files);
        }
    }

    let mut defs = Vec::with_capacity(before_defs.len());
    let mut dropped = 0usize;
    for mut record in before_defs {
        let path = &before_files[record.file_id];
        if touched.contains(path.as_str()) {
            dropped += 1;
            continue;
        }
        record.file_id = remap(path.as_str(), &mut files);
        defs.push(record);
    }

    let mut added = 0usize;
    for mut record in after_defs {
        let path = &after_files[record.file_id];
        if !changed.contains(path.as_str()) {
            continue;
        }
        record.file_id = remap(path.as_str(), &mut files);
        defs.push(record);
        added += 1;
    }

    let snapshot = Snapshot::from_parts(files, defs, revision)?;

    tracing::info!(
        revision = %snapshot.revision(),
        deleted = partition.deleted.len(),
        inserted = partition.inserted.len(),
        modified = partition.modified.len(),
        untracked = partition.untracked.len(),
        dropped,
        added,
        "merged snapshot"
    );

    let dangling = snapshot.dangling_edges().len();
    if dangling > 0 {
        tracing::warn!(dangling, "call edges point at functions removed by this merge");
    }

    Ok(MergeOutcome {
        snapshot,
        changeset,
        partition,
    })
}
