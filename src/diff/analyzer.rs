use std::collections::{BTreeMap, BTreeSet};
use crate::diff::{Changeset, FileChanges, FilePatch, FunctionChange, Patch};
use crate::signature::Signature;
use crate::snapshot::Snapshot;

/// Signature -> `(begin, end)` for one file.
///
/// Functions sharing a signature inside a file collapse to the last one.
type Intervals = BTreeMap<Signature, (u32, u32)>;

fn intervals(snapshot: &Snapshot, path: Option<&str>) -> Intervals {
    let Some(path) = path else {
        return Intervals::new();
    };
    snapshot
        .functions_in(path)
        .map(|record| (record.signature.clone(), (record.begin_line, record.end_line)))
        .collect()
}

fn containing(intervals: &Intervals, line: u32) -> impl Iterator<Item = &Signature> {
    intervals
        .iter()
        .filter(move |(_, (begin, end))| *begin <= line && line <= *end)
        .map(|(signature, _)| signature)
}

/// Maps a diff's line changes onto the functions of two snapshots.
pub struct PatchDiffAnalyzer<'a> {
    before: &'a Snapshot,
    after: &'a Snapshot,
}

impl<'a> PatchDiffAnalyzer<'a> {
    pub fn new(before: &'a Snapshot, after: &'a Snapshot) -> Self {
        Self { before, after }
    }

    pub fn analyze(&self, patch: &Patch) -> Changeset {
        let mut changeset = Changeset::new();
        for file in &patch.files {
            let Some(path) = file.report_path() else {
                continue;
            };
            changeset.insert(path, self.file_changes(file));
        }
        tracing::debug!(
            files = changeset.len(),
            functions = changeset.function_count(),
            "computed changeset"
        );
        changeset
    }

    fn file_changes(&self, file: &FilePatch) -> FileChanges {
        let before = intervals(self.before, file.old_path.as_deref());
        let after = intervals(self.after, file.new_path.as_deref());

        let mut touched: BTreeSet<&Signature> = BTreeSet::new();
        for change in &file.changes {
            match (change.old, change.new) {
                (None, Some(line)) => touched.extend(containing(&after, line)),
                (Some(line), None) => touched.extend(containing(&before, line)),
                _ => {}
            }
        }

        let mut changes = FileChanges::default();
        for signature in touched {
            let entry = |(begin, end): (u32, u32)| FunctionChange::new(signature.clone(), begin, end);
            match (before.get(signature), after.get(signature)) {
                (Some(&old), Some(_)) => changes.modified.push(entry(old)),
                (Some(&old), None) => changes.removed.push(entry(old)),
                (None, Some(&new)) => changes.added.push(entry(new)),
                (None, None) => {}
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;
    use crate::snapshot::Revision;
    use crate::storage::{DefinitionRow, RawTables};

    fn snapshot(revision: &str, definitions: &[(&str, &str, u32, u32)]) -> Snapshot {
        let tables = RawTables {
            definitions: definitions
                .iter()
                .enumerate()
                .map(|(i, (path, sig, begin, end))| {
                    DefinitionRow::new(i as i64 + 1, *path, *sig, *begin, *end)
                })
                .collect(),
            ..Default::default()
        };
        assemble(&tables, Revision::new(revision)).unwrap()
    }

    #[test]
    fn test_inserted_line_modifies_enclosing_function() {
        let before = snapshot("r1", &[("a.cpp", "f(int *)", 1, 5)]);
        let after = snapshot("r2", &[("a.cpp", "f(int *)", 1, 6)]);
        let patch = Patch::parse(
            "--- a/a.cpp\n+++ b/a.cpp\n@@ -2,2 +2,3 @@\n x\n+y\n z\n",
        )
        .unwrap();

        let changeset = PatchDiffAnalyzer::new(&before, &after).analyze(&patch);
        assert_eq!(
            changeset.to_json().unwrap(),
            r#"{"a.cpp":{"added":[],"removed":[],"modified":[["f(int*)",1,5]]}}"#
        );
    }

    #[test]
    fn test_added_and_removed_functions() {
        let before = snapshot("r1", &[("a.cpp", "old()", 1, 3), ("a.cpp", "keep()", 5, 9)]);
        let after = snapshot("r2", &[("a.cpp", "new()", 1, 4), ("a.cpp", "keep()", 6, 10)]);
        let patch = Patch::parse(
            "--- a/a.cpp\n+++ b/a.cpp\n@@ -1,3 +1,4 @@\n-a\n-b\n-c\n+d\n+e\n+f\n+g\n",
        )
        .unwrap();

        let changeset = PatchDiffAnalyzer::new(&before, &after).analyze(&patch);
        let changes = changeset.get("a.cpp").unwrap();
        assert_eq!(changes.added, vec![FunctionChange::new(Signature::new("new()"), 1, 4)]);
        assert_eq!(changes.removed, vec![FunctionChange::new(Signature::new("old()"), 1, 3)]);
        assert!(changes.modified.is_empty());
    }

    #[test]
    fn test_changes_outside_functions_are_omitted() {
        let before = snapshot("r1", &[("a.cpp", "f()", 10, 20)]);
        let after = snapshot("r2", &[("a.cpp", "f()", 11, 21)]);
        let patch = Patch::parse("--- a/a.cpp\n+++ b/a.cpp\n@@ -1,0 +1,1 @@\n+// header\n").unwrap();

        let changeset = PatchDiffAnalyzer::new(&before, &after).analyze(&patch);
        assert!(changeset.is_empty());
    }

    #[test]
    fn test_new_file_is_keyed_by_new_path() {
        let before = snapshot("r1", &[]);
        let after = snapshot("r2", &[("n.cpp", "h()", 1, 2)]);
        let patch = Patch::parse("--- /dev/null\n+++ b/n.cpp\n@@ -0,0 +1,2 @@\n+a\n+b\n").unwrap();

        let changeset = PatchDiffAnalyzer::new(&before, &after).analyze(&patch);
        let changes = changeset.get("n.cpp").unwrap();
        assert_eq!(changes.added.len(), 1);
    }

    #[test]
    fn test_membership_is_consistent() {
        let before = snapshot("r1", &[("a.cpp", "f()", 1, 5), ("a.cpp", "g()", 7, 9)]);
        let after = snapshot("r2", &[("a.cpp", "f()", 1, 6), ("a.cpp", "h()", 8, 12)]);
        let patch = Patch::parse(
            "--- a/a.cpp\n+++ b/a.cpp\n@@ -3,7 +3,10 @@\n x\n+y\n x\n x\n x\n-g1\n-g2\n-g3\n+h1\n+h2\n+h3\n+h4\n+h5\n",
        )
        .unwrap();

        let changeset = PatchDiffAnalyzer::new(&before, &after).analyze(&patch);
        let changes = changeset.get("a.cpp").unwrap();
        let before_sigs = intervals(&before, Some("a.cpp"));
        let after_sigs = intervals(&after, Some("a.cpp"));

        for change in &changes.added {
            assert!(after_sigs.contains_key(&change.signature));
            assert!(!before_sigs.contains_key(&change.signature));
        }
        for change in &changes.removed {
            assert!(before_sigs.contains_key(&change.signature));
            assert!(!after_sigs.contains_key(&change.signature));
        }
        for change in &changes.modified {
            assert!(before_sigs.contains_key(&change.signature));
            assert!(after_sigs.contains_key(&change.signature));
        }
        assert_eq!(changes.len(), 3);
    }
}
