//! Call graph construction
//!
//! Turns the raw `callgraph_*` rows into per-caller edge lists addressed by
//! [`FunctionKey`]. Virtual calls are widened to the callee's override class.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use crate::RowId;
use crate::edge::{CallEdge, Callee};
use crate::key::FunctionKey;
use crate::linker::{DeclarationResolution, OverrideGraph};
use crate::storage::CallRow;

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CallGraphStats {
    /// Edges taken from `callgraph_resolved`
    pub resolved: usize,
    /// Edges recovered from `callgraph_unresolved` through a declaration
    pub via_declaration: usize,
    /// Virtual edges widened to more than one candidate
    pub expanded: usize,
    /// Edges dropped because either end is not a known definition
    pub dropped: usize,
}

impl CallGraphStats {
    pub fn kept(&self) -> usize {
        self.resolved + self.via_declaration
    }
}

impl fmt::Display for CallGraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Call Graph Stats:")?;
        writeln!(f, "  ✅ Resolved: {}", self.resolved)?;
        writeln!(f, "  🔗 Via declaration: {}", self.via_declaration)?;
        writeln!(f, "  🔀 Virtual expansions: {}", self.expanded)?;
        writeln!(f, "  🗑  Dropped: {}", self.dropped)
    }
}

/// Outgoing edges per caller row id, in table order
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    pub edges: BTreeMap<RowId, Vec<CallEdge>>,
    pub stats: CallGraphStats,
}

impl CallGraph {
    /// Take the edge list of a caller, leaving it empty
    pub fn take(&mut self, caller: RowId) -> Vec<CallEdge> {
        self.edges.remove(&caller).unwrap_or_default()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }
}

pub struct CallGraphBuilder<'a> {
    keys: &'a HashMap<RowId, FunctionKey>,
    declarations: &'a DeclarationResolution,
    overrides: &'a OverrideGraph,
}

impl<'a> CallGraphBuilder<'a> {
    /// `keys` must hold exactly the known definitions of the revision.
    pub fn new(
        keys: &'a HashMap<RowId, FunctionKey>,
        declarations: &'a DeclarationResolution,
        overrides: &'a OverrideGraph,
    ) -> Self {
        Self {
            keys,
            declarations,
            overrides,
        }
    }

    /// Build the graph: resolved rows first, then unresolved rows, each in
    /// table order.
    pub fn build(&self, resolved: &[CallRow], unresolved: &[CallRow]) -> CallGraph {
        let mut graph = CallGraph::default();

        for row in resolved {
            if self.link(&mut graph, row, row.callee) {
                graph.stats.resolved += 1;
            }
        }

        for row in unresolved {
            let callee = row.callee.and_then(|decl| self.declarations.resolve(decl));
            if self.link(&mut graph, row, callee) {
                graph.stats.via_declaration += 1;
            }
        }

        tracing::debug!(
            kept = graph.stats.kept(),
            expanded = graph.stats.expanded,
            dropped = graph.stats.dropped,
            "built call graph"
        );
        graph
    }

    fn link(&self, graph: &mut CallGraph, row: &CallRow, callee: Option<RowId>) -> bool {
        let caller = row.caller.filter(|id| self.keys.contains_key(id));
        let target = callee.and_then(|id| self.keys.get(&id).map(|key| (id, *key)));

        let (Some(caller), Some((callee_id, callee_key))) = (caller, target) else {
            tracing::debug!(
                caller = ?row.caller,
                callee = ?callee,
                line = row.line,
                "dropped call edge with unknown endpoint"
            );
            graph.stats.dropped += 1;
            return false;
        };

        let callee = if row.is_virtual {
            self.expand(callee_id).unwrap_or(Callee::Single(callee_key))
        } else {
            Callee::Single(callee_key)
        };
        if callee.is_ambiguous() {
            graph.stats.expanded += 1;
        }

        graph
            .edges
            .entry(caller)
            .or_default()
            .push(CallEdge::new(callee, row.line, row.col));
        true
    }

    /// Override class of a callee as keys; `None` when it has no class or no
    /// member is a known definition.
    fn expand(&self, callee: RowId) -> Option<Callee> {
        let class = self.overrides.overrides_of(callee)?;
        let keys: Vec<FunctionKey> = class
            .iter()
            .filter_map(|id| self.keys.get(id).copied())
            .collect();
        Callee::from_class(keys)
    }
}
