//! String interning for labels and identifiers.
//!
//! Field labels, hidden and definition identifiers, and let names are interned
//! once at IR-construction time and referenced by `StringId` everywhere else.
//! This keeps labels `Copy`, makes comparison an integer compare, and avoids
//! cloning strings through the evaluator. Lookups are needed only for error
//! messages and export walks.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Index into the interner's storage.
///
/// Uses `u32` to save space (4 bytes vs 8 bytes for `usize`). This limits us
/// to ~4 billion unique strings, which is more than sufficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StringId(u32);

impl StringId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Storage for interned strings, owned by the compilation unit.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Interns {
    strings: Vec<Box<str>>,
    #[serde(skip)]
    index: AHashMap<Box<str>, StringId>,
}

impl Interns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a string, returning the existing id when already present.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.index.get(s) {
            return id;
        }
        let id = StringId(u32::try_from(self.strings.len()).expect("interner overflow"));
        self.strings.push(s.into());
        self.index.insert(s.into(), id);
        id
    }

    /// Looks up the string for an id.
    ///
    /// # Panics
    /// Panics if the id did not come from this interner.
    #[must_use]
    pub fn get(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    /// Returns the id for a string previously interned, if any.
    #[must_use]
    pub fn lookup(&self, s: &str) -> Option<StringId> {
        self.index.get(s).copied()
    }

    /// Number of interned strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Rebuilds the reverse index after deserialization.
    pub fn rebuild_index(&mut self) {
        self.index = self
            .strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), StringId(u32::try_from(i).expect("interner overflow"))))
            .collect();
    }
}
