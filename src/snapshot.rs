//! Snapshot - the per-revision code database
//!
//! A snapshot owns a dense file list and an arena of [`FunctionRecord`]s.
//! Records are addressed by [`FunctionKey`]; `file_id`s are positions in the
//! file list and are only meaningful inside the snapshot that holds them.
//!
//! Wire format:
//!
//! ```json
//! {"files": ["a.cpp"], "defs": [0, [0, "f(int*)", 1, 5, []]], "revision": "r1"}
//! ```
//!
//! `defs[0]` is a `0` placeholder kept for readers that index records from
//! one. Keys are not stored; they are recomputed on load.

use std::collections::HashMap;
use std::fmt;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use crate::edge::CallEdge;
use crate::function::{FunctionRecord, WireRecord};
use crate::key::{assign_keys, FunctionKey, KeySource};
use crate::{Error, Result};

/// Source-control revision identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Revision {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "WireSnapshot")]
pub struct Snapshot {
    files: Vec<String>,
    defs: Vec<FunctionRecord>,
    revision: Revision,
    index: HashMap<FunctionKey, usize>,
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.files == other.files && self.defs == other.defs && self.revision == other.revision
    }
}

impl Eq for Snapshot {}

impl Snapshot {
    /// A snapshot with no files
    pub fn empty(revision: Revision) -> Self {
        Self {
            files: Vec::new(),
            defs: Vec::new(),
            revision,
            index: HashMap::new(),
        }
    }

    /// Build a snapshot from an arena.
    ///
    /// Every `file_id` must index `files`. Keys are recomputed from content,
    /// so whatever keys `defs` carry are overwritten.
    pub(crate) fn from_parts(
        files: Vec<String>,
        mut defs: Vec<FunctionRecord>,
        revision: Revision,
    ) -> Result<Self> {
        if let Some(bad) = defs.iter().find(|record| record.file_id >= files.len()) {
            return Err(Error::InvalidSnapshot(format!(
                "file id {} out of range for {} files ({})",
                bad.file_id,
                files.len(),
                bad.signature
            )));
        }

        let keys = assign_keys(defs.iter().map(|record| KeySource {
            path: &files[record.file_id],
            signature: &record.signature,
            begin: record.begin_line,
            end: record.end_line,
        }));

        let mut index = HashMap::with_capacity(defs.len());
        for (position, (record, key)) in defs.iter_mut().zip(keys).enumerate() {
            record.key = key;
            if index.insert(key, position).is_some() {
                return Err(Error::InvalidSnapshot(format!("duplicate function key {}", key)));
            }
        }

        Ok(Self {
            files,
            defs,
            revision,
            index,
        })
    }

    /// Split into `(files, defs, revision)`
    pub fn into_parts(self) -> (Vec<String>, Vec<FunctionRecord>, Revision) {
        (self.files, self.defs, self.revision)
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn records(&self) -> &[FunctionRecord] {
        &self.defs
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    /// Replace the revision, keeping everything else
    pub fn with_revision(mut self, revision: Revision) -> Self {
        self.revision = revision;
        self
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn get(&self, key: FunctionKey) -> Option<&FunctionRecord> {
        self.index.get(&key).map(|&position| &self.defs[position])
    }

    pub fn contains_key(&self, key: FunctionKey) -> bool {
        self.index.contains_key(&key)
    }

    /// Path of the file a record belongs to
    pub fn path_of(&self, record: &FunctionRecord) -> &str {
        &self.files[record.file_id]
    }

    pub fn file_id(&self, path: &str) -> Option<usize> {
        self.files.iter().position(|file| file == path)
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.file_id(path).is_some()
    }

    /// Records of one file, in arena order
    pub fn functions_in<'a>(&'a self, path: &str) -> impl Iterator<Item = &'a FunctionRecord> + use<'a> {
        let file_id = self.file_id(path);
        self.defs
            .iter()
            .filter(move |record| Some(record.file_id) == file_id)
    }

    /// Total number of call edges
    pub fn edge_count(&self) -> usize {
        self.defs.iter().map(|record| record.callees.len()).sum()
    }

    /// Call edges widened over an override class
    pub fn ambiguous_edge_count(&self) -> usize {
        self.defs
            .iter()
            .flat_map(|record| &record.callees)
            .filter(|edge| edge.callee.is_ambiguous())
            .count()
    }

    /// Edges naming at least one key that no record in this snapshot has.
    ///
    /// Only merges produce these: a caller in an untouched file keeps its
    /// edge after the callee's file was rebuilt without it.
    pub fn dangling_edges(&self) -> Vec<(FunctionKey, &CallEdge)> {
        self.defs
            .iter()
            .flat_map(|record| record.callees.iter().map(move |edge| (record.key, edge)))
            .filter(|(_, edge)| edge.callee.keys().iter().any(|key| !self.contains_key(*key)))
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the wire format; structural problems surface as
    /// [`Error::InvalidSnapshot`] rather than a JSON error.
    pub fn from_json(json: &str) -> Result<Self> {
        let wire: WireSnapshot = serde_json::from_str(json)?;
        Snapshot::try_from(wire)
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            files: &'a [String],
            defs: WireDefs<'a>,
            revision: &'a Revision,
        }

        Wire {
            files: &self.files,
            defs: WireDefs(&self.defs),
            revision: &self.revision,
        }
        .serialize(serializer)
    }
}

struct WireDefs<'a>(&'a [FunctionRecord]);

impl Serialize for WireDefs<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len() + 1))?;
        seq.serialize_element(&0u8)?;
        for record in self.0 {
            seq.serialize_element(&WireRecord::from(record))?;
        }
        seq.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireDef {
    Placeholder(u8),
    Record(WireRecord),
}

#[derive(Deserialize)]
struct WireSnapshot {
    files: Vec<String>,
    defs: Vec<WireDef>,
    revision: Revision,
}

impl TryFrom<WireSnapshot> for Snapshot {
    type Error = Error;

    fn try_from(wire: WireSnapshot) -> Result<Self> {
        let mut defs = wire.defs.into_iter();
        match defs.next() {
            Some(WireDef::Placeholder(0)) => {}
            _ => {
                return Err(Error::InvalidSnapshot(
                    "defs must start with the 0 placeholder".to_string(),
                ))
            }
        }

        let mut records = Vec::with_capacity(defs.len());
        for (position, def) in defs.enumerate() {
            let WireDef::Record(WireRecord(file_id, signature, begin_line, end_line, callees)) = def
            else {
                return Err(Error::InvalidSnapshot(format!(
                    "defs[{}] is not a function record",
                    position + 1
                )));
            };
            records.push(FunctionRecord {
                // overwritten by from_parts
                key: FunctionKey::derive("", &signature, position),
                file_id,
                signature,
                begin_line,
                end_line,
                callees,
            });
        }

        Snapshot::from_parts(wire.files, records, wire.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Signature;

    fn record(file_id: usize, signature: &str, begin: u32, end: u32) -> FunctionRecord {
        let signature = Signature::new(signature);
        FunctionRecord {
            key: FunctionKey::derive("", &signature, 0),
            file_id,
            signature,
            begin_line: begin,
            end_line: end,
            callees: Vec::new(),
        }
    }

    fn sample() -> Snapshot {
        let files = vec!["a.cpp".to_string(), "b.cpp".to_string()];
        let mut defs = vec![record(0, "f(int*)", 1, 5), record(1, "g()", 1, 3)];
        let g = FunctionKey::derive("b.cpp", &Signature::new("g()"), 0);
        defs[0].callees.push(CallEdge::to(g, 2, 4));
        Snapshot::from_parts(files, defs, Revision::new("r1")).unwrap()
    }

    #[test]
    fn test_wire_format() {
        let snapshot = sample();
        let value: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();

        assert_eq!(value["files"], serde_json::json!(["a.cpp", "b.cpp"]));
        assert_eq!(value["defs"][0], serde_json::json!(0));
        assert_eq!(value["defs"][1][1], serde_json::json!("f(int*)"));
        assert_eq!(value["defs"][2][0], serde_json::json!(1));
        assert_eq!(value["revision"], serde_json::json!("r1"));
    }

    #[test]
    fn test_load_keeps_keys() {
        let snapshot = sample();
        let loaded = Snapshot::from_json(&snapshot.to_json().unwrap()).unwrap();

        assert_eq!(loaded, snapshot);
        for (a, b) in loaded.records().iter().zip(snapshot.records()) {
            assert_eq!(a.key, b.key);
        }
        assert!(loaded.dangling_edges().is_empty());
    }

    #[test]
    fn test_rejects_missing_placeholder() {
        let json = r#"{"files": ["a.cpp"], "defs": [[0, "f()", 1, 2, []]], "revision": "r"}"#;
        assert!(matches!(Snapshot::from_json(json), Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn test_rejects_out_of_range_file_id() {
        let json = r#"{"files": ["a.cpp"], "defs": [0, [3, "f()", 1, 2, []]], "revision": "r"}"#;
        assert!(matches!(Snapshot::from_json(json), Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn test_lookup_by_key_and_path() {
        let snapshot = sample();
        let g = FunctionKey::derive("b.cpp", &Signature::new("g()"), 0);

        assert_eq!(snapshot.get(g).unwrap().signature.as_str(), "g()");
        assert_eq!(snapshot.functions_in("a.cpp").count(), 1);
        assert_eq!(snapshot.functions_in("zzz.cpp").count(), 0);
        assert_eq!(snapshot.edge_count(), 1);
    }

    #[test]
    fn test_dangling_edges_are_reported() {
        let (files, mut defs, revision) = sample().into_parts();
        let gone = FunctionKey::derive("c.cpp", &Signature::new("h()"), 0);
        defs[1].callees.push(CallEdge::to(gone, 2, 1));
        let snapshot = Snapshot::from_parts(files, defs, revision).unwrap();

        let dangling = snapshot.dangling_edges();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].1.line, 2);
    }
}
