//! Snapshot assembly
//!
//! Runs extraction, declaration binding, override resolution and call graph
//! construction over one revision's raw tables and packages the result.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use crate::RowId;
use crate::Result;
use crate::function::FunctionRecord;
use crate::graph::{CallGraphBuilder, CallGraphStats};
use crate::inventory::FunctionInventory;
use crate::key::{assign_keys, FunctionKey, KeySource};
use crate::linker::{DeclarationResolution, DeclarationStats, OverrideGraph};
use crate::snapshot::{Revision, Snapshot};
use crate::storage::{RawDatabase, RawTables};

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AssemblyStats {
    pub files: usize,
    pub functions: usize,
    pub override_classes: usize,
    pub declarations: DeclarationStats,
    pub calls: CallGraphStats,
}

impl fmt::Display for AssemblyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Assembly Stats:")?;
        writeln!(f, "  Files: {}", self.files)?;
        writeln!(f, "  Functions: {}", self.functions)?;
        writeln!(f, "  Override classes: {}", self.override_classes)?;
        write!(f, "{}", self.declarations)?;
        write!(f, "{}", self.calls)
    }
}

/// A freshly assembled snapshot with the numbers behind it
#[derive(Debug, Clone)]
pub struct Assembly {
    pub snapshot: Snapshot,
    pub stats: AssemblyStats,
}

/// Assemble a snapshot from raw tables.
///
/// Deterministic: the same tables always give a byte-identical serialized
/// snapshot.
pub fn assemble(tables: &RawTables, revision: Revision) -> Result<Snapshot> {
    assemble_with_stats(tables, revision).map(|assembly| assembly.snapshot)
}

/// Read a raw extraction database and assemble it
pub fn assemble_from_database(path: &Path, revision: Revision) -> Result<Assembly> {
    let tables = RawDatabase::open(path)?.load_tables()?;
    assemble_with_stats(&tables, revision)
}

pub fn assemble_with_stats(tables: &RawTables, revision: Revision) -> Result<Assembly> {
    let inventory = FunctionInventory::extract(&tables.definitions);

    // Arena follows row-id order
    let row_ids: Vec<RowId> = inventory.definitions.keys().copied().collect();
    let keys = assign_keys(inventory.definitions.values().map(|definition| KeySource {
        path: inventory.path_of(definition),
        signature: &definition.signature,
        begin: definition.begin,
        end: definition.end,
    }));
    let key_of: HashMap<RowId, FunctionKey> = row_ids.iter().copied().zip(keys.iter().copied()).collect();

    let declarations = DeclarationResolution::resolve_all(&tables.declarations, &inventory);
    let overrides = OverrideGraph::build(
        &tables.overrides_resolved,
        &tables.overrides_unresolved,
        &declarations,
    );
    let mut graph = CallGraphBuilder::new(&key_of, &declarations, &overrides)
        .build(&tables.calls_resolved, &tables.calls_unresolved);

    let mut defs = Vec::with_capacity(row_ids.len());
    for (row_id, key) in row_ids.iter().zip(keys) {
        let Some(definition) = inventory.get(*row_id) else {
            continue;
        };
        defs.push(FunctionRecord {
            key,
            file_id: definition.file_id,
            signature: definition.signature.clone(),
            begin_line: definition.begin,
            end_line: definition.end,
            callees: graph.take(*row_id),
        });
    }

    let stats = AssemblyStats {
        files: inventory.files.len(),
        functions: defs.len(),
        override_classes: overrides.len(),
        declarations: declarations.stats().clone(),
        calls: graph.stats.clone(),
    };

    tracing::info!(
        revision = %revision,
        files = stats.files,
        functions = stats.functions,
        edges = stats.calls.kept(),
        "assembled snapshot"
    );

    let snapshot = Snapshot::from_parts(inventory.files, defs, revision)?;
    Ok(Assembly { snapshot, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::{CallEdge, Callee};
    use crate::signature::Signature;

    fn scenario_database() -> RawDatabase {
        let db = RawDatabase::open_in_memory().unwrap();
        let f = db.insert_definition("a.cpp", "f(int *)", 1, 5).unwrap();
        db.insert_definition("b.cpp", "g()", 1, 3).unwrap();
        let decl = db.insert_declaration("a.cpp", "g()", 0, 0, None).unwrap();
        db.insert_call_unresolved(f, decl, 3, 5, false).unwrap();
        db
    }

    #[test]
    fn test_unique_declaration_becomes_edge() {
        let tables = scenario_database().load_tables().unwrap();
        let snapshot = assemble(&tables, Revision::new("r1")).unwrap();

        assert_eq!(snapshot.files(), &["a.cpp".to_string(), "b.cpp".to_string()]);
        let f = &snapshot.records()[0];
        assert_eq!(f.signature.as_str(), "f(int*)");
        assert_eq!(f.callees.len(), 1);

        let g_key = FunctionKey::derive("b.cpp", &Signature::new("g()"), 0);
        assert_eq!(f.callees[0], CallEdge::to(g_key, 3, 5));
        assert!(snapshot.dangling_edges().is_empty());
    }

    #[test]
    fn test_assembly_is_idempotent() {
        let tables = scenario_database().load_tables().unwrap();
        let first = assemble(&tables, Revision::new("r1")).unwrap().to_json().unwrap();
        let second = assemble(&tables, Revision::new("r1")).unwrap().to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_ambiguous_declarations_stay_unresolved() {
        let db = RawDatabase::open_in_memory().unwrap();
        let main = db.insert_definition("main.cpp", "main()", 1, 9).unwrap();
        db.insert_definition("x.cpp", "g(int,int)", 1, 2).unwrap();
        db.insert_definition("y.cpp", "g(int, int)", 1, 2).unwrap();
        let d1 = db.insert_declaration("main.cpp", "g(int, int)", 0, 0, None).unwrap();
        let d2 = db.insert_declaration("z.h", "g(int, int)", 0, 0, None).unwrap();
        db.insert_call_unresolved(main, d1, 2, 1, false).unwrap();
        db.insert_call_unresolved(main, d2, 3, 1, false).unwrap();

        let assembly = assemble_with_stats(&db.load_tables().unwrap(), Revision::new("r")).unwrap();
        assert_eq!(assembly.stats.declarations.ambiguous, 2);
        assert_eq!(assembly.stats.calls.dropped, 2);
        assert_eq!(assembly.snapshot.edge_count(), 0);
    }

    #[test]
    fn test_virtual_call_through_override_table() {
        let db = RawDatabase::open_in_memory().unwrap();
        let caller = db.insert_definition("main.cpp", "main()", 1, 9).unwrap();
        let base = db.insert_definition("base.cpp", "Base::run()", 1, 2).unwrap();
        let derived = db.insert_definition("derived.cpp", "Derived::run()", 1, 2).unwrap();
        db.insert_override_resolved(derived, base).unwrap();
        db.insert_override_resolved(base, base).unwrap();
        db.insert_call_resolved(caller, base, 4, 2, true).unwrap();

        let snapshot = assemble(&db.load_tables().unwrap(), Revision::new("r")).unwrap();
        let edge = &snapshot.records()[0].callees[0];
        assert!(matches!(&edge.callee, Callee::Candidates(keys) if keys.len() == 2));
        assert_eq!(snapshot.ambiguous_edge_count(), 1);
    }

    #[test]
    fn test_empty_tables() {
        let snapshot = assemble(&RawTables::new(), Revision::new("r0")).unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.to_json().unwrap(), r#"{"files":[],"defs":[0],"revision":"r0"}"#);
    }
}
