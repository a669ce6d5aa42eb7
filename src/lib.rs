//! # revgraph - cross-revision code database
//!
//! Builds a per-revision function database (definitions, declarations and a
//! resolved call graph) from the raw tables emitted by a compiler plugin, and
//! keeps it current across revisions by merging file-scoped rebuilds along a
//! source-control diff.
//!
//! revgraph provides:
//! - Table extraction and signature canonicalization
//! - Declaration and virtual-override resolution
//! - Call graph construction with override expansion
//! - Snapshot assembly with stable function keys
//! - Unified diff analysis (function-level added/removed/modified)
//! - Incremental snapshot merging

pub mod signature;
pub mod storage;
pub mod inventory;
pub mod linker;
pub mod key;
pub mod function;
pub mod edge;
pub mod graph;
pub mod snapshot;
pub mod assembler;
pub mod diff;
pub mod merge;
pub mod config;
pub mod workspace;
pub mod cache;
pub mod sink;
pub mod pipeline;
pub mod output;
pub mod ui;

// Re-exports for convenient access
pub use assembler::assemble;
pub use diff::{Changeset, FileChanges, FunctionChange, Patch};
pub use edge::{CallEdge, Callee};
pub use function::FunctionRecord;
pub use key::FunctionKey;
pub use merge::{advance, merge, FilePartition, MergeOutcome};
pub use signature::Signature;
pub use snapshot::{Revision, Snapshot};
pub use storage::{RawDatabase, RawTables};

/// Row identifier in the raw extraction database (SQLite ROWID)
pub type RowId = i64;

/// Result type alias for revgraph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for revgraph operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Config serialization error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("config already exists at {} (use --force to overwrite)", .0.display())]
    ConfigExists(std::path::PathBuf),

    #[error("Malformed diff at line {line}: {reason}")]
    MalformedDiff { line: usize, reason: String },

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Invalid function key: {0}")]
    InvalidKey(String),

    #[error("Lock held by another process: {0}")]
    Locked(String),
}

impl Error {
    pub(crate) fn malformed_diff(line: usize, reason: impl Into<String>) -> Self {
        Error::MalformedDiff {
            line,
            reason: reason.into(),
        }
    }
}
