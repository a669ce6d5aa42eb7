use std::collections::HashMap;
use std::fmt;
use crate::RowId;
use crate::inventory::FunctionInventory;
use crate::signature::Signature;
use crate::storage::DeclarationRow;

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DeclarationStats {
    /// Bound by the extractor itself
    pub explicit: usize,
    /// Bound through a unique signature match
    pub by_signature: usize,
    /// Several definitions share the signature
    pub ambiguous: usize,
    /// No definition has the signature
    pub unknown: usize,
}

impl DeclarationStats {
    pub fn total(&self) -> usize {
        self.explicit + self.by_signature + self.ambiguous + self.unknown
    }
}

impl fmt::Display for DeclarationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Declaration Linker Stats:")?;
        writeln!(f, "  Total Declarations: {}", self.total())?;
        writeln!(f, "  ✅ Explicit: {}", self.explicit)?;
        writeln!(f, "  🔗 By signature: {}", self.by_signature)?;
        writeln!(f, "  🤔 Ambiguous: {}", self.ambiguous)?;
        writeln!(f, "  🌍 Unknown: {}", self.unknown)
    }
}

/// Declaration row id -> definition row id, for one revision.
///
/// A missing entry and an unresolved declaration look the same to callers:
/// [`DeclarationResolution::resolve`] returns `None`.
#[derive(Debug, Clone, Default)]
pub struct DeclarationResolution {
    bindings: HashMap<RowId, Option<RowId>>,
    stats: DeclarationStats,
}

impl DeclarationResolution {
    /// Bind every declaration to a definition where that is unambiguous.
    ///
    /// Ambiguity is never an error: zero or several candidates leave the
    /// declaration unresolved, since a wrong link is worse than none.
    pub fn resolve_all(declarations: &[DeclarationRow], inventory: &FunctionInventory) -> Self {
        let mut resolution = Self::default();

        for decl in declarations {
            let bound = match decl.definition {
                Some(definition) => {
                    resolution.stats.explicit += 1;
                    Some(definition)
                }
                None => {
                    let signature = Signature::new(&decl.signature);
                    match inventory.candidates(&signature) {
                        [only] => {
                            resolution.stats.by_signature += 1;
                            Some(*only)
                        }
                        [] => {
                            resolution.stats.unknown += 1;
                            None
                        }
                        many => {
                            tracing::debug!(
                                declaration = decl.row_id,
                                %signature,
                                candidates = many.len(),
                                "ambiguous declaration left unresolved"
                            );
                            resolution.stats.ambiguous += 1;
                            None
                        }
                    }
                }
            };
            resolution.bindings.insert(decl.row_id, bound);
        }

        tracing::debug!(
            explicit = resolution.stats.explicit,
            by_signature = resolution.stats.by_signature,
            ambiguous = resolution.stats.ambiguous,
            unknown = resolution.stats.unknown,
            "resolved declarations"
        );
        resolution
    }

    /// Definition bound to a declaration, if any
    pub fn resolve(&self, declaration: RowId) -> Option<RowId> {
        self.bindings.get(&declaration).copied().flatten()
    }

    pub fn stats(&self) -> &DeclarationStats {
        &self.stats
    }

    /// Number of declarations seen
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
