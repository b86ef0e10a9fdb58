//! Static score table.
//!
//! Exact, case-sensitive byte match from name to score. Immutable after
//! construction, so connections share it without locking.

use super::{Lookup, Resolution};
use crate::protocol::{MAX_NAME_LEN, TERMINATOR};
use std::collections::HashMap;
use thiserror::Error;

/// Entries served when no table is configured.
const BUILTIN: &[(&str, u32)] = &[
    ("Hermione Granger", 49365),
    // Longest name and longest reply the protocol allows.
    ("Jonathan Edward Peter Chapman", 2488897010),
    ("Victor Frankenstein", 19129),
    ("Frodo Baggins", 177),
    ("Ada Lovelace", 64265),
];

/// A table entry that can never be requested over the wire.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("empty name in score table")]
    EmptyName,
    #[error("name '{0}' is longer than {max} bytes", max = MAX_NAME_LEN)]
    NameTooLong(String),
    #[error("name '{0}' contains a newline")]
    NameHasTerminator(String),
}

#[derive(Debug, Clone, Default)]
pub struct ScoreTable {
    entries: HashMap<Vec<u8>, u32>,
}

impl ScoreTable {
    /// The built-in five-entry table.
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|&(name, points)| (name.as_bytes().to_vec(), points))
            .collect();
        Self { entries }
    }

    /// Build a table from configured entries, rejecting unreachable names.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut table = HashMap::new();
        for (name, points) in entries {
            let name = name.into();
            if name.is_empty() {
                return Err(TableError::EmptyName);
            }
            if name.len() > MAX_NAME_LEN {
                return Err(TableError::NameTooLong(name));
            }
            if name.as_bytes().contains(&TERMINATOR) {
                return Err(TableError::NameHasTerminator(name));
            }
            table.insert(name.into_bytes(), points);
        }
        Ok(Self { entries: table })
    }

    pub fn get(&self, name: &[u8]) -> Option<u32> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Lookup for ScoreTable {
    fn resolve(&self, name: &[u8]) -> Resolution {
        match self.get(name) {
            Some(points) => Resolution::Score(points),
            None => Resolution::Missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let table = ScoreTable::builtin();
        assert_eq!(table.len(), 5);
        assert_eq!(table.resolve(b"Ada Lovelace"), Resolution::Score(64265));
        assert_eq!(table.resolve(b"Frodo Baggins"), Resolution::Score(177));
        assert_eq!(table.resolve(b"Bilbo Baggins"), Resolution::Missing);
    }

    #[test]
    fn test_exact_match_only() {
        let table = ScoreTable::builtin();
        assert_eq!(table.resolve(b"ada lovelace"), Resolution::Missing);
        assert_eq!(table.resolve(b"Ada Lovelace "), Resolution::Missing);
        assert_eq!(table.resolve(b"Ada Lovelace\r"), Resolution::Missing);
        assert_eq!(table.resolve(b""), Resolution::Missing);
    }

    #[test]
    fn test_from_entries() {
        let table = ScoreTable::from_entries([("Alan Turing", 1912), ("Grace Hopper", 1906)])
            .unwrap();
        assert_eq!(table.get(b"Alan Turing"), Some(1912));
        assert_eq!(table.get(b"Ada Lovelace"), None);
    }

    #[test]
    fn test_from_entries_rejects_bad_names() {
        assert_eq!(
            ScoreTable::from_entries([("", 1)]).unwrap_err(),
            TableError::EmptyName
        );

        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert_eq!(
            ScoreTable::from_entries([(long.clone(), 1)]).unwrap_err(),
            TableError::NameTooLong(long)
        );

        assert_eq!(
            ScoreTable::from_entries([("two\nlines", 1)]).unwrap_err(),
            TableError::NameHasTerminator("two\nlines".to_string())
        );
    }

    #[test]
    fn test_longest_builtin_name_is_reachable() {
        let longest = BUILTIN.iter().map(|(name, _)| name.len()).max().unwrap();
        assert_eq!(longest, MAX_NAME_LEN);
    }
}
