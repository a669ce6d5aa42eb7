//! Diff parsing and function-level change reports
//!
//! [`Patch::parse`] reads unified, git and hg-export diffs into per-file line
//! changes. [`analyzer::PatchDiffAnalyzer`] maps those onto two snapshots and
//! yields a [`Changeset`].

pub mod analyzer;

pub use analyzer::PatchDiffAnalyzer;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::signature::Signature;
use crate::{Error, Result};

static HUNK_HEADER: OnceLock<Regex> = OnceLock::new();

fn hunk_header() -> &'static Regex {
    HUNK_HEADER.get_or_init(|| {
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("hunk header pattern")
    })
}

/// One content line of a hunk.
///
/// Insertions carry only `new`, deletions only `old`, context lines both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineChange {
    pub old: Option<u32>,
    pub new: Option<u32>,
}

impl LineChange {
    pub fn is_insertion(&self) -> bool {
        self.old.is_none() && self.new.is_some()
    }

    pub fn is_deletion(&self) -> bool {
        self.old.is_some() && self.new.is_none()
    }
}

/// Changes to one file.
///
/// A missing path means `/dev/null`: no old path for a new file, no new path
/// for a deleted one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePatch {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub changes: Vec<LineChange>,
}

impl FilePatch {
    /// Path a change report is filed under: the old path, else the new one
    pub fn report_path(&self) -> Option<&str> {
        self.old_path.as_deref().or(self.new_path.as_deref())
    }

    fn has_paths(&self) -> bool {
        self.old_path.is_some() || self.new_path.is_some()
    }
}

/// A parsed multi-file diff
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    pub files: Vec<FilePatch>,
}

impl Patch {
    pub fn parse(text: &str) -> Result<Self> {
        let patch = PatchParser::new(text).run()?;
        tracing::debug!(files = patch.files.len(), "parsed diff");
        Ok(patch)
    }

    /// Every path the diff mentions, old and new, without `/dev/null`
    pub fn paths(&self) -> BTreeSet<String> {
        self.files
            .iter()
            .flat_map(|file| [file.old_path.as_ref(), file.new_path.as_ref()])
            .flatten()
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn header_path(raw: &str) -> Option<String> {
    // drop a trailing timestamp
    let raw = raw.split('\t').next().unwrap_or(raw).trim_end();
    if raw == "/dev/null" {
        return None;
    }
    let path = raw
        .strip_prefix("a/")
        .or_else(|| raw.strip_prefix("b/"))
        .unwrap_or(raw);
    Some(path.to_string())
}

fn git_header_paths(rest: &str) -> Option<(String, String)> {
    if let Some(rest) = rest.strip_prefix("a/") {
        let (old, new) = rest.split_once(" b/")?;
        return Some((old.to_string(), new.to_string()));
    }
    let (old, new) = rest.split_once(' ')?;
    Some((old.to_string(), new.to_string()))
}

/// A `+`, `-` or context line outside any hunk. The `-- ` signature
/// separator of `git format-patch` is not one.
fn is_stray_body_line(line: &str) -> bool {
    if line == "--" || line == "-- " {
        return false;
    }
    matches!(line.as_bytes().first(), Some(b'+' | b'-' | b' '))
}

struct PatchParser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
    files: Vec<FilePatch>,
    current: Option<FilePatch>,
    /// `---`/`+++` seen for `current`
    headers_seen: bool,
    /// At least one hunk of `current` has been consumed
    after_hunk: bool,
}

impl<'a> PatchParser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            pos: 0,
            files: Vec::new(),
            current: None,
            headers_seen: false,
            after_hunk: false,
        }
    }

    /// 1-based number of the line at `pos`
    fn line_no(&self) -> usize {
        self.pos + 1
    }

    fn run(mut self) -> Result<Patch> {
        while self.pos < self.lines.len() {
            let line = self.lines[self.pos];

            if let Some(rest) = line.strip_prefix("diff --git ") {
                let (old, new) = git_header_paths(rest)
                    .ok_or_else(|| Error::malformed_diff(self.line_no(), "unparsable diff --git header"))?;
                self.start(FilePatch {
                    old_path: Some(old),
                    new_path: Some(new),
                    changes: Vec::new(),
                });
            } else if line.starts_with("diff ") {
                // hg `diff -r` and plain `diff -u` headers: paths follow in ---/+++
                self.start(FilePatch::default());
            } else if let Some(rest) = line.strip_prefix("--- ") {
                self.file_headers(rest)?;
                continue;
            } else if line.starts_with("@@") {
                self.hunk()?;
                self.after_hunk = true;
                continue;
            } else if self.after_hunk && is_stray_body_line(line) {
                return Err(Error::malformed_diff(self.line_no(), "hunk body longer than its header"));
            } else if let Some(path) = line.strip_prefix("rename from ") {
                if let Some(current) = self.current.as_mut() {
                    current.old_path = Some(path.to_string());
                }
            } else if let Some(path) = line.strip_prefix("rename to ") {
                if let Some(current) = self.current.as_mut() {
                    current.new_path = Some(path.to_string());
                }
            } else if line.starts_with("new file mode") {
                if let Some(current) = self.current.as_mut() {
                    current.old_path = None;
                }
            } else if line.starts_with("deleted file mode") {
                if let Some(current) = self.current.as_mut() {
                    current.new_path = None;
                }
            } else if !line.is_empty() && !line.starts_with('\\') {
                // the next patch of a series starts its own preamble
                self.after_hunk = false;
            }
            // anything else is preamble: commit messages, index lines, hg headers
            self.pos += 1;
        }

        self.finish();
        Ok(Patch { files: self.files })
    }

    fn start(&mut self, patch: FilePatch) {
        self.finish();
        self.current = Some(patch);
        self.headers_seen = false;
        self.after_hunk = false;
    }

    fn finish(&mut self) {
        if let Some(patch) = self.current.take() {
            if patch.has_paths() {
                self.files.push(patch);
            }
        }
    }

    /// `--- old` followed by `+++ new`
    fn file_headers(&mut self, old_raw: &str) -> Result<()> {
        let Some(new_raw) = self
            .lines
            .get(self.pos + 1)
            .and_then(|line| line.strip_prefix("+++ "))
        else {
            return Err(Error::malformed_diff(self.line_no(), "--- header without +++"));
        };

        let old_path = header_path(old_raw);
        let new_path = header_path(new_raw);

        // a git header without hunks yet takes its paths from ---/+++
        let reuse = !self.headers_seen
            && self
                .current
                .as_ref()
                .is_some_and(|current| current.changes.is_empty());
        if reuse {
            if let Some(current) = self.current.as_mut() {
                current.old_path = old_path;
                current.new_path = new_path;
            }
        } else {
            self.start(FilePatch {
                old_path,
                new_path,
                changes: Vec::new(),
            });
        }
        self.headers_seen = true;
        self.after_hunk = false;
        self.pos += 2;
        Ok(())
    }

    fn hunk(&mut self) -> Result<()> {
        let header_line = self.line_no();
        let header = self.lines[self.pos];
        let caps = hunk_header()
            .captures(header)
            .ok_or_else(|| Error::malformed_diff(header_line, "bad hunk header"))?;

        let number = |index: usize, default: u32| -> Result<u32> {
            match caps.get(index) {
                Some(m) => m
                    .as_str()
                    .parse()
                    .map_err(|_| Error::malformed_diff(header_line, "hunk range out of bounds")),
                None => Ok(default),
            }
        };
        let mut old_line = number(1, 0)?;
        let mut old_left = number(2, 1)?;
        let mut new_line = number(3, 0)?;
        let mut new_left = number(4, 1)?;
        if old_line.checked_add(old_left).is_none() || new_line.checked_add(new_left).is_none() {
            return Err(Error::malformed_diff(header_line, "hunk range out of bounds"));
        }

        let Some(current) = self.current.as_mut().filter(|current| current.has_paths()) else {
            return Err(Error::malformed_diff(header_line, "hunk before file header"));
        };
        self.pos += 1;

        while old_left > 0 || new_left > 0 {
            let Some(line) = self.lines.get(self.pos) else {
                return Err(Error::malformed_diff(self.pos, "truncated hunk"));
            };
            let line_no = self.pos + 1;
            let underflow = || Error::malformed_diff(line_no, "hunk body longer than its header");

            match line.as_bytes().first() {
                None | Some(b' ') => {
                    if old_left == 0 || new_left == 0 {
                        return Err(underflow());
                    }
                    current.changes.push(LineChange {
                        old: Some(old_line),
                        new: Some(new_line),
                    });
                    old_line += 1;
                    new_line += 1;
                    old_left -= 1;
                    new_left -= 1;
                }
                Some(b'-') => {
                    if old_left == 0 {
                        return Err(underflow());
                    }
                    current.changes.push(LineChange {
                        old: Some(old_line),
                        new: None,
                    });
                    old_line += 1;
                    old_left -= 1;
                }
                Some(b'+') => {
                    if new_left == 0 {
                        return Err(underflow());
                    }
                    current.changes.push(LineChange {
                        old: None,
                        new: Some(new_line),
                    });
                    new_line += 1;
                    new_left -= 1;
                }
                // "\ No newline at end of file"
                Some(b'\\') => {}
                Some(_) => {
                    return Err(Error::malformed_diff(line_no, "unexpected line inside hunk"));
                }
            }
            self.pos += 1;
        }
        Ok(())
    }
}

/// A function as reported in a change set: `[signature, begin, end]`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(Signature, u32, u32)", into = "(Signature, u32, u32)")]
pub struct FunctionChange {
    pub signature: Signature,
    pub begin_line: u32,
    pub end_line: u32,
}

impl FunctionChange {
    pub fn new(signature: Signature, begin_line: u32, end_line: u32) -> Self {
        Self {
            signature,
            begin_line,
            end_line,
        }
    }
}

impl From<(Signature, u32, u32)> for FunctionChange {
    fn from((signature, begin_line, end_line): (Signature, u32, u32)) -> Self {
        Self::new(signature, begin_line, end_line)
    }
}

impl From<FunctionChange> for (Signature, u32, u32) {
    fn from(change: FunctionChange) -> Self {
        (change.signature, change.begin_line, change.end_line)
    }
}

/// Function-level changes to one file, each list sorted by signature
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChanges {
    pub added: Vec<FunctionChange>,
    pub removed: Vec<FunctionChange>,
    pub modified: Vec<FunctionChange>,
}

impl FileChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    fn absorb(&mut self, other: FileChanges) {
        for (list, extra) in [
            (&mut self.added, other.added),
            (&mut self.removed, other.removed),
            (&mut self.modified, other.modified),
        ] {
            list.extend(extra);
            list.sort();
            list.dedup();
        }
    }
}

/// Path -> function-level changes; files with nothing to report are absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Changeset(BTreeMap<String, FileChanges>);

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record changes for a path, accumulating with earlier entries
    pub fn insert(&mut self, path: impl Into<String>, changes: FileChanges) {
        if changes.is_empty() {
            return;
        }
        self.0.entry(path.into()).or_default().absorb(changes);
    }

    pub fn get(&self, path: &str) -> Option<&FileChanges> {
        self.0.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileChanges)> {
        self.0.iter()
    }

    /// Number of files with changes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of function entries over all files
    pub fn function_count(&self) -> usize {
        self.0.values().map(FileChanges::len).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIT_DIFF: &str = "\
diff --git a/a.cpp b/a.cpp
index 1111111..2222222 100644
--- a/a.cpp
+++ b/a.cpp
@@ -1,3 +1,4 @@
 int f(int *p) {
+  log();
   return *p;
 }
diff --git a/b.cpp b/b.cpp
deleted file mode 100644
--- a/b.cpp
+++ /dev/null
@@ -1,2 +0,0 @@
-void g() {
-}
";

    #[test]
    fn test_parse_git_diff() {
        let patch = Patch::parse(GIT_DIFF).unwrap();
        assert_eq!(patch.files.len(), 2);

        let a = &patch.files[0];
        assert_eq!(a.old_path.as_deref(), Some("a.cpp"));
        assert_eq!(a.new_path.as_deref(), Some("a.cpp"));
        assert_eq!(
            a.changes,
            vec![
                LineChange { old: Some(1), new: Some(1) },
                LineChange { old: None, new: Some(2) },
                LineChange { old: Some(2), new: Some(3) },
                LineChange { old: Some(3), new: Some(4) },
            ]
        );

        let b = &patch.files[1];
        assert_eq!(b.old_path.as_deref(), Some("b.cpp"));
        assert_eq!(b.new_path, None);
        assert!(b.changes.iter().all(LineChange::is_deletion));

        let paths: Vec<String> = patch.paths().into_iter().collect();
        assert_eq!(paths, vec!["a.cpp".to_string(), "b.cpp".to_string()]);
    }

    #[test]
    fn test_parse_hg_export() {
        let text = "\
# HG changeset patch
# User someone
# Node ID 0123456789abcdef
Fix the thing

diff -r 000000000000 -r 111111111111 src/new.cpp
--- /dev/null\tThu Jan 01 00:00:00 1970 +0000
+++ b/src/new.cpp\tMon Mar 02 10:00:00 2020 +0000
@@ -0,0 +1,2 @@
+void h() {
+}
";
        let patch = Patch::parse(text).unwrap();
        assert_eq!(patch.files.len(), 1);
        assert_eq!(patch.files[0].old_path, None);
        assert_eq!(patch.files[0].new_path.as_deref(), Some("src/new.cpp"));
        assert_eq!(patch.files[0].report_path(), Some("src/new.cpp"));
        assert_eq!(patch.files[0].changes.len(), 2);
    }

    #[test]
    fn test_rename_without_hunks() {
        let text = "\
diff --git a/old.cpp b/new.cpp
similarity index 100%
rename from old.cpp
rename to new.cpp
";
        let patch = Patch::parse(text).unwrap();
        assert_eq!(patch.files.len(), 1);
        assert_eq!(patch.files[0].old_path.as_deref(), Some("old.cpp"));
        assert_eq!(patch.files[0].new_path.as_deref(), Some("new.cpp"));
        assert!(patch.files[0].changes.is_empty());
    }

    #[test]
    fn test_no_newline_marker_is_skipped() {
        let text = "\
--- a/x.cpp
+++ b/x.cpp
@@ -1 +1 @@
-old
\\ No newline at end of file
+new
\\ No newline at end of file
";
        let patch = Patch::parse(text).unwrap();
        assert_eq!(patch.files[0].changes.len(), 2);
    }

    #[test]
    fn test_format_patch_trailer_is_preamble() {
        let text = "\
From 1a2b3c Mon Sep 17 00:00:00 2001
Subject: [PATCH] touch x

---
 x.cpp | 2 +-
 1 file changed, 1 insertion(+), 1 deletion(-)

diff --git a/x.cpp b/x.cpp
index 1111111..2222222 100644
--- a/x.cpp
+++ b/x.cpp
@@ -1 +1 @@
-a
+b
-- 
2.39.0
";
        let patch = Patch::parse(text).unwrap();
        assert_eq!(patch.files.len(), 1);
        assert_eq!(patch.files[0].changes.len(), 2);
    }

    #[test]
    fn test_export_series_with_stat_lines() {
        let text = "\
# HG changeset patch
# Node ID 1a2b3c
first

--- a/x.cpp
+++ b/x.cpp
@@ -1 +1 @@
-a
+b
# HG changeset patch
# Node ID 4d5e6f
second
---
 y.cpp | 1 +
--- a/y.cpp
+++ b/y.cpp
@@ -1,0 +2 @@
+c
";
        let patch = Patch::parse(text).unwrap();
        assert_eq!(patch.paths().into_iter().collect::<Vec<_>>(), vec!["x.cpp", "y.cpp"]);
    }

    #[test]
    fn test_prefixes_stripped_from_both_sides() {
        let text = "--- b/x.cpp\n+++ a/y.cpp\n@@ -1 +1 @@\n-a\n+b\n";
        let patch = Patch::parse(text).unwrap();
        assert_eq!(patch.files[0].old_path.as_deref(), Some("x.cpp"));
        assert_eq!(patch.files[0].new_path.as_deref(), Some("y.cpp"));
    }

    #[test]
    fn test_malformed_diffs_are_rejected() {
        let cases = [
            ("--- a/x.cpp\n@@ -1 +1 @@\n", "--- without +++"),
            ("@@ -1 +1 @@\n-a\n+b\n", "hunk before file header"),
            ("--- a/x.cpp\n+++ b/x.cpp\n@@ -1,3 +1,3 @@\n a\n", "truncated hunk"),
            ("--- a/x.cpp\n+++ b/x.cpp\n@@ -1,2 +1,2 @@\n a\n?b\n", "unexpected line"),
            ("--- a/x.cpp\n+++ b/x.cpp\n@@ -1 +1 @@\n-a\n-b\n", "count underflow"),
            ("--- a/x.cpp\n+++ b/x.cpp\n@@ -x +1 @@\n", "bad hunk header"),
            ("diff --git nonsense\n", "bad git header"),
            ("--- a/x.cpp\n+++ b/x.cpp\n@@ -4294967295,2 +1,2 @@\n a\n b\n", "line number overflow"),
            ("--- a/x.cpp\n+++ b/x.cpp\n@@ -1 +1 @@\n-a\n+b\n+c\n+d\n", "body beyond header counts"),
            ("--- a/x.cpp\n+++ b/x.cpp\n@@ -1 +1 @@\n-a\n+b\n c\n", "context beyond header counts"),
        ];
        for (text, what) in cases {
            assert!(
                matches!(Patch::parse(text), Err(Error::MalformedDiff { .. })),
                "accepted diff with {}",
                what
            );
        }
    }

    #[test]
    fn test_changeset_accumulates_per_path() {
        let f = FunctionChange::new(Signature::new("f()"), 1, 5);
        let g = FunctionChange::new(Signature::new("g()"), 7, 9);

        let mut changeset = Changeset::new();
        changeset.insert("a.cpp", FileChanges { modified: vec![g.clone()], ..Default::default() });
        changeset.insert("a.cpp", FileChanges { modified: vec![f.clone()], ..Default::default() });
        changeset.insert("b.cpp", FileChanges::default());

        assert_eq!(changeset.len(), 1);
        assert_eq!(changeset.get("a.cpp").unwrap().modified, vec![f, g]);
        assert_eq!(
            changeset.to_json().unwrap(),
            r#"{"a.cpp":{"added":[],"removed":[],"modified":[["f()",1,5],["g()",7,9]]}}"#
        );
    }
}
