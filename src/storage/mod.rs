//! Storage Layer - raw extraction tables
//!
//! The compiler plugin records what it sees in six SQLite tables:
//! - definitions(rowid, filename, funname, begin, end)
//! - declarations(rowid, filename, funname, begin, end, def)
//! - callgraph_resolved(caller, callee, line, col, virtual)
//! - callgraph_unresolved(caller, callee_decl, line, col, virtual)
//! - overrides_resolved(def, vdef)
//! - overrides_unresolved(def, vdec)
//!
//! [`RawTables`] is the in-memory copy the rest of the pipeline consumes.

pub mod schema;
pub mod sqlite;

pub use sqlite::RawDatabase;

use crate::RowId;

/// One row of the `definitions` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionRow {
    pub row_id: RowId,
    pub file_path: String,
    pub signature: String,
    pub begin: u32,
    pub end: u32,
}

impl DefinitionRow {
    pub fn new(
        row_id: RowId,
        file_path: impl Into<String>,
        signature: impl Into<String>,
        begin: u32,
        end: u32,
    ) -> Self {
        Self {
            row_id,
            file_path: file_path.into(),
            signature: signature.into(),
            begin,
            end,
        }
    }
}

/// One row of the `declarations` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationRow {
    pub row_id: RowId,
    pub file_path: String,
    pub signature: String,
    pub begin: u32,
    pub end: u32,
    /// Definition row id, when the plugin saw the body
    pub definition: Option<RowId>,
}

impl DeclarationRow {
    pub fn new(row_id: RowId, signature: impl Into<String>, definition: Option<RowId>) -> Self {
        Self {
            row_id,
            file_path: String::new(),
            signature: signature.into(),
            begin: 0,
            end: 0,
            definition,
        }
    }

    /// Set the declaring location
    pub fn at(mut self, file_path: impl Into<String>, begin: u32, end: u32) -> Self {
        self.file_path = file_path.into();
        self.begin = begin;
        self.end = end;
        self
    }
}

/// One row of `callgraph_resolved` or `callgraph_unresolved`.
///
/// In the resolved table `callee` is a definition row id, in the unresolved
/// table it is a declaration row id. Either side may be NULL when the
/// plugin's sub-select found nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRow {
    pub caller: Option<RowId>,
    pub callee: Option<RowId>,
    pub line: u32,
    pub col: u32,
    pub is_virtual: bool,
}

impl CallRow {
    pub fn new(caller: RowId, callee: RowId, line: u32, col: u32, is_virtual: bool) -> Self {
        Self {
            caller: Some(caller),
            callee: Some(callee),
            line,
            col,
            is_virtual,
        }
    }
}

/// One row of `overrides_resolved` (`def`, `vdef`) or
/// `overrides_unresolved` (`def`, `vdec`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideRow {
    pub base: Option<RowId>,
    pub other: Option<RowId>,
}

impl OverrideRow {
    pub fn new(base: RowId, other: RowId) -> Self {
        Self {
            base: Some(base),
            other: Some(other),
        }
    }
}

/// The six raw tables of one revision
#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub definitions: Vec<DefinitionRow>,
    pub declarations: Vec<DeclarationRow>,
    pub calls_resolved: Vec<CallRow>,
    pub calls_unresolved: Vec<CallRow>,
    pub overrides_resolved: Vec<OverrideRow>,
    pub overrides_unresolved: Vec<OverrideRow>,
}

impl RawTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of rows across all tables
    pub fn row_count(&self) -> usize {
        self.definitions.len()
            + self.declarations.len()
            + self.calls_resolved.len()
            + self.calls_unresolved.len()
            + self.overrides_resolved.len()
            + self.overrides_unresolved.len()
    }
}
