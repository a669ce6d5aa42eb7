//! Call edges
//!
//! A call site inside a function body, pointing at one or more callee
//! functions:
//! - `Single`: the callee is known
//! - `Candidates`: virtual dispatch expanded over an override class
//!
//! On the wire an edge is `[callee, line, col]` where `callee` is a key
//! string or an array of key strings.

use crate::key::FunctionKey;
use serde::{Deserialize, Serialize};

/// Target of a call edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Callee {
    /// A single resolved function
    Single(FunctionKey),
    /// Every function of the override class (at least two)
    Candidates(Vec<FunctionKey>),
}

impl Callee {
    /// Build a callee from an override class, collapsing singletons.
    ///
    /// Returns `None` for an empty class.
    pub fn from_class(mut keys: Vec<FunctionKey>) -> Option<Self> {
        match keys.len() {
            0 => None,
            1 => keys.pop().map(Callee::Single),
            _ => Some(Callee::Candidates(keys)),
        }
    }

    /// All keys this callee may dispatch to
    pub fn keys(&self) -> &[FunctionKey] {
        match self {
            Callee::Single(key) => std::slice::from_ref(key),
            Callee::Candidates(keys) => keys,
        }
    }

    /// Check if this callee is an ambiguous virtual dispatch
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Callee::Candidates(_))
    }
}

/// An outgoing call from a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(Callee, u32, u32)", into = "(Callee, u32, u32)")]
pub struct CallEdge {
    pub callee: Callee,
    /// Line of the call site
    pub line: u32,
    /// Column of the call site
    pub col: u32,
}

impl CallEdge {
    pub fn new(callee: Callee, line: u32, col: u32) -> Self {
        Self { callee, line, col }
    }

    /// Edge to a single known function
    pub fn to(key: FunctionKey, line: u32, col: u32) -> Self {
        Self::new(Callee::Single(key), line, col)
    }
}

impl From<(Callee, u32, u32)> for CallEdge {
    fn from((callee, line, col): (Callee, u32, u32)) -> Self {
        Self { callee, line, col }
    }
}

impl From<CallEdge> for (Callee, u32, u32) {
    fn from(edge: CallEdge) -> Self {
        (edge.callee, edge.line, edge.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Signature;

    fn key(name: &str) -> FunctionKey {
        FunctionKey::derive("a.cpp", &Signature::new(name), 0)
    }

    #[test]
    fn test_singleton_class_collapses() {
        let callee = Callee::from_class(vec![key("f()")]).unwrap();
        assert_eq!(callee, Callee::Single(key("f()")));
        assert!(!callee.is_ambiguous());
        assert!(Callee::from_class(Vec::new()).is_none());
    }

    #[test]
    fn test_wire_shape() {
        let single = CallEdge::to(key("f()"), 3, 7);
        let json = serde_json::to_value(&single).unwrap();
        assert_eq!(json, serde_json::json!([key("f()").to_string(), 3, 7]));

        let multi = CallEdge::new(Callee::Candidates(vec![key("f()"), key("g()")]), 4, 1);
        let json = serde_json::to_string(&multi).unwrap();
        let back: CallEdge = serde_json::from_str(&json).unwrap();
        assert_eq!(back, multi);
        assert_eq!(back.callee.keys().len(), 2);
    }
}
