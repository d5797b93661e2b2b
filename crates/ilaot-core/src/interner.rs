//! Name interning for descriptor names.
//!
//! Converts strings into cheap integer handles (`Name`). Two names compare
//! equal iff they were interned from equal strings.

use indexmap::IndexSet;

/// A lightweight handle to an interned string.
///
/// Names are ordered by insertion order, not lexicographically. Anything that
/// must be deterministic across runs compares the resolved strings instead.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct Name(u32);

impl Name {
    /// Raw index for serialization/debugging.
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Create a Name from a raw index. Use only for deserialization.
    #[inline]
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }
}

/// String interner. The set position of a string is its `Name`.
#[derive(Debug, Clone, Default)]
pub struct Interner {
    strings: IndexSet<Box<str>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning the existing Name if already present.
    pub fn intern(&mut self, s: &str) -> Name {
        if let Some(index) = self.strings.get_index_of(s) {
            return Name(index as u32);
        }
        let (index, _) = self.strings.insert_full(s.into());
        Name(index as u32)
    }

    /// Look up a string without interning it.
    pub fn get(&self, s: &str) -> Option<Name> {
        self.strings.get_index_of(s).map(|index| Name(index as u32))
    }

    /// Resolve a Name back to its string.
    ///
    /// # Panics
    /// Panics if the name was not created by this interner.
    #[inline]
    pub fn resolve(&self, name: Name) -> &str {
        &self.strings[name.0 as usize]
    }

    /// Try to resolve a Name, returning None if invalid.
    #[inline]
    pub fn try_resolve(&self, name: Name) -> Option<&str> {
        self.strings.get_index(name.0 as usize).map(|s| &**s)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Iterate over all interned strings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Name, &str)> {
        self.strings
            .iter()
            .enumerate()
            .map(|(i, s)| (Name(i as u32), &**s))
    }
}
