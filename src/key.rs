//! Function keys - stable identity for every function record
//!
//! A key is a 64-bit blake3 digest of `(path, signature, ordinal)` where the
//! ordinal ranks a record among the records of the same file that share its
//! signature, ordered by `(begin, end)` and then by arena position.
//!
//! Keys depend only on the records of one file, so they survive line shifts
//! inside the file and are untouched when other files are merged in or out.
//! They are not serialized with the records; every snapshot recomputes them
//! from content when it is built or loaded.
//!
//! Text form: 16 lowercase hex digits, e.g. `3f9a0c21d4e87b10`.

use crate::{Error, Result};
use crate::signature::Signature;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Stable identity of a function record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionKey(u64);

impl FunctionKey {
    /// Derive the key of the `ordinal`-th function named `signature` in `path`
    pub fn derive(path: &str, signature: &Signature, ordinal: usize) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(path.as_bytes());
        hasher.update(&[0]);
        hasher.update(signature.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(&(ordinal as u64).to_le_bytes());
        let digest = hasher.finalize();

        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        Self(u64::from_be_bytes(head))
    }

    /// Parse the 16-digit hex form
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != 16 {
            return Err(Error::InvalidKey(format!("expected 16 hex digits, got {:?}", s)));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| Error::InvalidKey(format!("not a hex key: {:?}", s)))
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for FunctionKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for FunctionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FunctionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FunctionKey::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Location data a key is derived from
#[derive(Debug, Clone, Copy)]
pub struct KeySource<'a> {
    pub path: &'a str,
    pub signature: &'a Signature,
    pub begin: u32,
    pub end: u32,
}

/// Assign keys to a sequence of records given in arena order.
///
/// Returns one key per input, in the same order.
pub fn assign_keys<'a, I>(sources: I) -> Vec<FunctionKey>
where
    I: IntoIterator<Item = KeySource<'a>>,
{
    let sources: Vec<KeySource<'a>> = sources.into_iter().collect();

    let mut groups: HashMap<(&str, &Signature), Vec<usize>> = HashMap::new();
    for (position, source) in sources.iter().enumerate() {
        groups
            .entry((source.path, source.signature))
            .or_default()
            .push(position);
    }

    let mut keys = vec![FunctionKey(0); sources.len()];
    for ((path, signature), mut positions) in groups {
        positions.sort_by_key(|&p| (sources[p].begin, sources[p].end, p));
        for (ordinal, position) in positions.into_iter().enumerate() {
            keys[position] = FunctionKey::derive(path, signature, ordinal);
        }
    }
    keys
}
