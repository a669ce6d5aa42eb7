//! Function inventory - normalized view of the `definitions` table
//!
//! Canonicalizes every signature, assigns dense file ids in order of first
//! appearance and indexes definitions by signature so later stages can tell
//! a unique match from an ambiguous one.

use std::collections::{BTreeMap, HashMap};
use crate::RowId;
use crate::signature::Signature;
use crate::storage::DefinitionRow;

/// A function body as recorded in one revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// Index into [`FunctionInventory::files`]
    pub file_id: usize,
    pub signature: Signature,
    pub begin: u32,
    pub end: u32,
}

/// All definitions of one revision, keyed by raw row id
#[derive(Debug, Clone, Default)]
pub struct FunctionInventory {
    /// Dense file list, in order of first appearance
    pub files: Vec<String>,
    /// Definitions by row id
    pub definitions: BTreeMap<RowId, Definition>,
    /// Canonical signature -> every definition row id sharing it
    pub by_signature: HashMap<Signature, Vec<RowId>>,
}

impl FunctionInventory {
    /// Build the inventory from `definitions` rows.
    ///
    /// Rows are visited in row-id order so the file list does not depend on
    /// how the caller happened to collect them.
    pub fn extract(rows: &[DefinitionRow]) -> Self {
        let mut ordered: Vec<&DefinitionRow> = rows.iter().collect();
        ordered.sort_by_key(|row| row.row_id);

        let mut inventory = Self::default();
        let mut file_ids: HashMap<&str, usize> = HashMap::new();

        for row in ordered {
            let file_id = *file_ids.entry(row.file_path.as_str()).or_insert_with(|| {
                inventory.files.push(row.file_path.clone());
                inventory.files.len() - 1
            });

            let signature = Signature::new(&row.signature);
            inventory
                .by_signature
                .entry(signature.clone())
                .or_default()
                .push(row.row_id);
            inventory.definitions.insert(
                row.row_id,
                Definition {
                    file_id,
                    signature,
                    begin: row.begin,
                    end: row.end,
                },
            );
        }

        tracing::debug!(
            definitions = inventory.definitions.len(),
            files = inventory.files.len(),
            "extracted function inventory"
        );
        inventory
    }

    /// Look up a definition by row id
    pub fn get(&self, row_id: RowId) -> Option<&Definition> {
        self.definitions.get(&row_id)
    }

    /// Check whether a row id names a known definition
    pub fn contains(&self, row_id: RowId) -> bool {
        self.definitions.contains_key(&row_id)
    }

    /// All definitions sharing a canonical signature
    pub fn candidates(&self, signature: &Signature) -> &[RowId] {
        self.by_signature
            .get(signature)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// Path of the file a definition lives in
    pub fn path_of(&self, definition: &Definition) -> &str {
        &self.files[definition.file_id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<DefinitionRow> {
        vec![
            DefinitionRow::new(2, "b.cpp", "g(int, int)", 3, 9),
            DefinitionRow::new(1, "a.cpp", "f(int *)", 1, 5),
            DefinitionRow::new(3, "a.cpp", "g(int,int)", 11, 14),
        ]
    }

    #[test]
    fn test_files_in_row_order() {
        let inventory = FunctionInventory::extract(&rows());
        assert_eq!(inventory.files, vec!["a.cpp".to_string(), "b.cpp".to_string()]);
        assert_eq!(inventory.get(1).unwrap().file_id, 0);
        assert_eq!(inventory.get(2).unwrap().file_id, 1);
        assert_eq!(inventory.get(3).unwrap().file_id, 0);
    }

    #[test]
    fn test_signatures_are_canonical() {
        let inventory = FunctionInventory::extract(&rows());
        assert_eq!(inventory.get(1).unwrap().signature.as_str(), "f(int*)");
        assert_eq!(inventory.candidates(&Signature::new("g(int, int)")), &[2, 3]);
        assert!(inventory.candidates(&Signature::new("h()")).is_empty());
    }

    #[test]
    fn test_every_file_id_is_valid() {
        let inventory = FunctionInventory::extract(&rows());
        for definition in inventory.definitions.values() {
            assert!(definition.file_id < inventory.files.len());
            assert!(!inventory.path_of(definition).is_empty());
        }
    }
}
