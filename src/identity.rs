//! First-seen ordinals for reference keys.

use std::collections::HashMap;

use crate::key::RefKey;

/// Assigns each distinct reference identity a rank in first-seen order.
///
/// Entries hold only the weak handle inside [`RefKey`], so the table never
/// keeps a referent's value alive. Entries are never removed: an ordinal,
/// once handed out, belongs to that identity for the table's lifetime. The
/// weak handle keeps the referent's allocation reserved for as long.
#[derive(Debug, Clone, Default)]
pub struct IdentityTable {
    ordinals: HashMap<RefKey, u64>,
    next: u64,
}

impl IdentityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordinal for `key`, allocating the next one on first sight.
    pub fn ordinal_of(&mut self, key: &RefKey) -> u64 {
        if let Some(&ord) = self.ordinals.get(key) {
            return ord;
        }
        let ord = self.next;
        self.next += 1;
        self.ordinals.insert(key.clone(), ord);
        ord
    }

    /// Ordinal for `key` if it has been seen, without allocating.
    pub fn lookup(&self, key: &RefKey) -> Option<u64> {
        self.ordinals.get(key).copied()
    }

    /// Number of identities ever numbered.
    pub fn len(&self) -> usize {
        self.ordinals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordinals.is_empty()
    }
}

/// Source of ordinals used by the normalizer.
///
/// Writers allocate ordinals; readers only look them up, since a reference
/// key that was never written cannot be part of any stored path.
pub(crate) trait Ordinals {
    fn ordinal(&mut self, key: &RefKey) -> Option<u64>;
}

impl Ordinals for &mut IdentityTable {
    fn ordinal(&mut self, key: &RefKey) -> Option<u64> {
        Some(self.ordinal_of(key))
    }
}

impl Ordinals for &IdentityTable {
    fn ordinal(&mut self, key: &RefKey) -> Option<u64> {
        self.lookup(key)
    }
}
