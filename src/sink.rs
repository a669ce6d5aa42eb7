//! Change sinks - where a revision's change set goes once it is computed

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::{Error, Result};
use crate::diff::Changeset;
use crate::snapshot::Revision;

/// A change set plus the revision metadata it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub revision: Revision,
    pub author: String,
    pub description: String,
    pub changes: Changeset,
}

/// Consumer of per-revision change reports.
pub trait ChangeSink: Send {
    /// Short name for logs
    fn name(&self) -> &str;

    fn publish(&mut self, report: &ChangeReport) -> Result<()>;
}

/// Appends one JSON object per revision to a file
#[derive(Debug, Clone)]
pub struct JsonlChangeLog {
    path: PathBuf,
}

impl JsonlChangeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every report back, oldest first
    pub fn read_all(&self) -> Result<Vec<ChangeReport>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Error::from))
            .collect()
    }
}

impl ChangeSink for JsonlChangeLog {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn publish(&mut self, report: &ChangeReport) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut line = serde_json::to_string(report)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;

        tracing::debug!(
            revision = %report.revision,
            files = report.changes.len(),
            log = %self.path.display(),
            "published change report"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{FileChanges, FunctionChange};
    use crate::signature::Signature;
    use tempfile::TempDir;

    fn report(revision: &str) -> ChangeReport {
        let mut changes = Changeset::new();
        changes.insert(
            "a.cpp",
            FileChanges {
                modified: vec![FunctionChange::new(Signature::new("f(int*)"), 1, 5)],
                ..Default::default()
            },
        );
        ChangeReport {
            revision: Revision::new(revision),
            author: "dev <dev@example.com>".to_string(),
            description: "Fix f".to_string(),
            changes,
        }
    }

    #[test]
    fn test_appends_one_line_per_report() {
        let dir = TempDir::new().unwrap();
        let mut log = JsonlChangeLog::new(dir.path().join("logs").join("changes.jsonl"));

        log.publish(&report("r1")).unwrap();
        log.publish(&report("r2")).unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);

        let reports = log.read_all().unwrap();
        assert_eq!(reports, vec![report("r1"), report("r2")]);
    }

    #[test]
    fn test_report_shape() {
        let value = serde_json::to_value(report("r1")).unwrap();
        assert_eq!(value["revision"], "r1");
        assert_eq!(value["changes"]["a.cpp"]["modified"][0][0], "f(int*)");
    }
}
