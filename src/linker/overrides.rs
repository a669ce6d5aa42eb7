use std::collections::{BTreeMap, BTreeSet};
use crate::RowId;
use crate::linker::DeclarationResolution;
use crate::storage::OverrideRow;

/// Symmetric virtual-override relation between definitions.
///
/// `b` is in `a`'s class iff `a` is in `b`'s. A node only lists itself when
/// a self pair was recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideGraph {
    classes: BTreeMap<RowId, Vec<RowId>>,
}

impl OverrideGraph {
    /// Build the relation from both override tables.
    ///
    /// Unresolved pairs carry a declaration on their second side; it is
    /// bound through `declarations` first and the pair is dropped when that
    /// fails.
    pub fn build(
        resolved: &[OverrideRow],
        unresolved: &[OverrideRow],
        declarations: &DeclarationResolution,
    ) -> Self {
        let mut adjacency: BTreeMap<RowId, BTreeSet<RowId>> = BTreeMap::new();
        let mut link = |a: RowId, b: RowId| {
            adjacency.entry(a).or_default().insert(b);
            adjacency.entry(b).or_default().insert(a);
        };

        for pair in resolved {
            if let (Some(a), Some(b)) = (pair.base, pair.other) {
                link(a, b);
            }
        }

        let mut dropped = 0usize;
        for pair in unresolved {
            let bound = pair.other.and_then(|decl| declarations.resolve(decl));
            match (pair.base, bound) {
                (Some(a), Some(b)) => link(a, b),
                _ => dropped += 1,
            }
        }

        let classes: BTreeMap<RowId, Vec<RowId>> = adjacency
            .into_iter()
            .map(|(id, set)| (id, set.into_iter().collect()))
            .collect();

        tracing::debug!(classes = classes.len(), dropped, "built override graph");
        Self { classes }
    }

    /// Sorted override class of a definition
    pub fn overrides_of(&self, id: RowId) -> Option<&[RowId]> {
        self.classes.get(&id).map(|ids| ids.as_slice())
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RowId, &[RowId])> {
        self.classes.iter().map(|(id, ids)| (*id, ids.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::FunctionInventory;
    use crate::storage::{DeclarationRow, DefinitionRow};

    fn declarations() -> DeclarationResolution {
        let inventory = FunctionInventory::extract(&[
            DefinitionRow::new(1, "a.cpp", "A::f()", 1, 2),
            DefinitionRow::new(2, "b.cpp", "B::f()", 1, 2),
            DefinitionRow::new(3, "c.cpp", "C::f()", 1, 2),
        ]);
        DeclarationResolution::resolve_all(
            &[
                DeclarationRow::new(20, "C::f()", None),
                DeclarationRow::new(21, "D::f()", None),
            ],
            &inventory,
        )
    }

    #[test]
    fn test_resolved_pairs_are_symmetric() {
        let graph = OverrideGraph::build(&[OverrideRow::new(2, 1)], &[], &declarations());

        assert_eq!(graph.overrides_of(1), Some(&[2][..]));
        assert_eq!(graph.overrides_of(2), Some(&[1][..]));
        assert_eq!(graph.overrides_of(3), None);
    }

    #[test]
    fn test_unresolved_pairs_go_through_declarations() {
        let graph = OverrideGraph::build(
            &[OverrideRow::new(2, 1)],
            &[OverrideRow::new(1, 20), OverrideRow::new(1, 21)],
            &declarations(),
        );

        assert_eq!(graph.overrides_of(1), Some(&[2, 3][..]));
        assert_eq!(graph.overrides_of(3), Some(&[1][..]));
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_null_sides_are_dropped() {
        let graph = OverrideGraph::build(
            &[OverrideRow { base: None, other: Some(1) }],
            &[OverrideRow { base: Some(1), other: None }],
            &declarations(),
        );
        assert!(graph.is_empty());
    }

    #[test]
    fn test_symmetry_holds_for_every_pair() {
        let graph = OverrideGraph::build(
            &[OverrideRow::new(2, 1), OverrideRow::new(3, 2), OverrideRow::new(4, 4)],
            &[OverrideRow::new(5, 20)],
            &declarations(),
        );

        for (a, class) in graph.iter() {
            for &b in class {
                let back = graph.overrides_of(b).unwrap();
                assert!(back.contains(&a), "{} lists {} but not the reverse", a, b);
            }
        }
        assert_eq!(graph.overrides_of(4), Some(&[4][..]));
        assert!(!graph.overrides_of(1).unwrap().contains(&1));
    }
}
