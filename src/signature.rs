//! Canonical function signatures
//!
//! The compiler's symbol printer is not stable about whitespace between
//! builds (`f(int *, char &)` vs `f(int*,char&)`). Every signature is
//! canonicalized before it is compared, hashed or stored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A canonicalized function signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Canonicalize a raw signature as printed by the compiler.
    pub fn new(raw: &str) -> Self {
        Self(normalize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Signature {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Drop the space before `*` and `&` and collapse `", "` into `","`.
///
/// Runs of spaces are removed one at a time until nothing changes, so the
/// result is a fixed point: `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(raw: &str) -> String {
    let mut out = raw.to_string();
    loop {
        let next = out
            .replace(", ", ",")
            .replace(" *", "*")
            .replace(" &", "&");
        if next == out {
            return out;
        }
        out = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_and_reference_spacing() {
        assert_eq!(normalize("f(int *)"), "f(int*)");
        assert_eq!(normalize("g(const Foo &, char **)"), "g(const Foo&,char**)");
        assert_eq!(normalize("h(int, int)"), "h(int,int)");
    }

    #[test]
    fn test_normalization_is_fixed_point() {
        let samples = [
            "f(int *)",
            "ns::Klass::method(const std::string &, int  *, long) const",
            "operator&&(bool, bool)",
            "x(int ,  int)",
            "",
        ];
        for raw in samples {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "not a fixed point for {:?}", raw);
        }
    }

    #[test]
    fn test_signature_equality_is_canonical() {
        assert_eq!(Signature::new("g(int, int)"), Signature::new("g(int,int)"));
        assert_ne!(Signature::new("g(int,int)"), Signature::new("g(int,long)"));
    }
}
