//! Function records - one entry of a snapshot's arena

use crate::edge::CallEdge;
use crate::key::FunctionKey;
use crate::signature::Signature;
use serde::{Deserialize, Serialize};

/// A function definition with its outgoing calls.
///
/// Identity is [`FunctionRecord::key`]; `file_id` indexes the owning
/// snapshot's file list and is rewritten whenever that list is rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    pub key: FunctionKey,
    pub file_id: usize,
    pub signature: Signature,
    pub begin_line: u32,
    pub end_line: u32,
    pub callees: Vec<CallEdge>,
}

impl FunctionRecord {
    /// Check whether a line falls inside the body (bounds inclusive)
    pub fn contains_line(&self, line: u32) -> bool {
        self.begin_line <= line && line <= self.end_line
    }

    /// Number of lines spanned by the body
    pub fn span(&self) -> u32 {
        self.end_line.saturating_sub(self.begin_line) + 1
    }
}

/// Wire form of a record: `[file_id, signature, begin, end, callees]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireRecord(
    pub usize,
    pub Signature,
    pub u32,
    pub u32,
    pub Vec<CallEdge>,
);

impl From<&FunctionRecord> for WireRecord {
    fn from(record: &FunctionRecord) -> Self {
        WireRecord(
            record.file_id,
            record.signature.clone(),
            record.begin_line,
            record.end_line,
            record.callees.clone(),
        )
    }
}
