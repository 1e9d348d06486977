//! The composite-key map.

use std::fmt;

use tracing::debug;

use crate::config::{Config, KeyMode};
use crate::error::Result;
use crate::identity::IdentityTable;
use crate::key::{IntoKeySeq, Key, RefKey};
use crate::node::{NodeArena, NodeId};
use crate::normalize::{normalize, Path};
use crate::prune::{PruneAction, Pruner};

/// Map from key sequences to values, stored as a trie of atomic keys.
///
/// Each key sequence is normalized (see [`KeyMode`]) into a canonical path;
/// the value lives on the node at the end of that path. Empty branches are
/// reclaimed according to the map's [`CleanupPolicy`](crate::CleanupPolicy).
///
/// The map is single-threaded. Wrap it in a [`SharedMap`](crate::SharedMap)
/// to share it across threads or to drive periodic sweeps.
///
/// # Reference keys and memory
///
/// Reference keys hold a [`Weak`](std::sync::Weak) handle and never keep the
/// referent's value alive. Once a reference key has been written, though, the
/// map keeps its first-seen ordinal for the map's whole lifetime, and with it
/// one weak handle. The referent's allocation (its `Arc` header and the inline
/// size of `T`) is therefore only returned to the allocator when the map is
/// dropped, even after [`remove`](Self::remove) or [`clear`](Self::clear).
/// Key long-lived maps with small `Arc`s, or put large payloads behind a
/// further indirection.
#[derive(Clone)]
pub struct CompositeMap<V> {
    mode: KeyMode,
    nodes: NodeArena<V>,
    ids: IdentityTable,
    pruner: Pruner,
    len: usize,
}

impl<V> CompositeMap<V> {
    /// Position-mode map with the default cleanup policy.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn by_position() -> Self {
        Self::with_config(Config::by_position())
    }

    /// Value-mode map with the default cleanup policy.
    ///
    /// Reference keys written to it keep their allocation reserved until the
    /// map is dropped; see [Reference keys and memory](Self#reference-keys-and-memory).
    pub fn by_value() -> Self {
        Self::with_config(Config::by_value())
    }

    /// Create a map without validating `config`.
    ///
    /// `EveryDelete(0)` sweeps on every remove. A `Periodically` policy only
    /// matters to whoever calls [`cleanup`](Self::cleanup) on a timer.
    pub fn with_config(config: Config) -> Self {
        Self {
            mode: config.mode,
            nodes: NodeArena::new(),
            ids: IdentityTable::new(),
            pruner: Pruner::new(config.cleanup),
            len: 0,
        }
    }

    /// Create a map, rejecting zero intervals and zero delete counts.
    pub fn try_with_config(config: Config) -> Result<Self> {
        config.validate()?;
        debug!(mode = %config.mode, cleanup = %config.cleanup, "created composite map");
        Ok(Self::with_config(config))
    }

    pub fn config(&self) -> Config {
        Config {
            mode: self.mode,
            cleanup: self.pruner.policy(),
        }
    }

    /// Number of stored values.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of live trie nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.live()
    }

    /// Number of distinct first keys currently in the trie.
    pub fn root_child_count(&self) -> usize {
        self.nodes.root().children.len()
    }

    /// First-seen ordinal of a reference key, if the map has numbered it.
    pub fn ref_ordinal(&self, key: &RefKey) -> Option<u64> {
        self.ids.lookup(key)
    }

    /// Removes counted toward the next `EveryDelete` sweep.
    pub fn pending_removes(&self) -> u32 {
        self.pruner.pending()
    }

    #[cfg(test)]
    pub(crate) fn arena(&self) -> &NodeArena<V> {
        &self.nodes
    }

    // =========================================================================
    // Path helpers
    // =========================================================================

    /// Canonical path for a write, numbering unseen reference keys.
    fn write_path(&mut self, keys: impl IntoKeySeq) -> Result<Path> {
        match normalize(self.mode, keys.into_key_seq(), &mut self.ids)? {
            Some(path) => Ok(path),
            None => unreachable!("writers always allocate ordinals"),
        }
    }

    /// Node addressed by `keys`, if the whole path exists.
    fn find(&self, keys: impl IntoKeySeq) -> Result<Option<NodeId>> {
        let Some(path) = normalize(self.mode, keys.into_key_seq(), &self.ids)? else {
            return Ok(None);
        };
        let mut current = NodeId::ROOT;
        for key in &path {
            match self.nodes.child(current, key) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Node addressed by `path`, creating missing nodes.
    fn find_or_create(&mut self, path: &Path) -> NodeId {
        path.iter()
            .fold(NodeId::ROOT, |current, key| self.nodes.child_or_insert(current, key))
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Store `value` under `keys`, returning the value it replaced.
    pub fn insert(&mut self, keys: impl IntoKeySeq, value: V) -> Result<Option<V>> {
        let path = self.write_path(keys)?;
        let id = self.find_or_create(&path);
        let old = self.nodes[id].value.replace(value);
        if old.is_none() {
            self.len += 1;
        }
        Ok(old)
    }

    pub fn get(&self, keys: impl IntoKeySeq) -> Result<Option<&V>> {
        Ok(self
            .find(keys)?
            .and_then(|id| self.nodes[id].value.as_ref()))
    }

    pub fn get_mut(&mut self, keys: impl IntoKeySeq) -> Result<Option<&mut V>> {
        Ok(match self.find(keys)? {
            Some(id) => self.nodes[id].value.as_mut(),
            None => None,
        })
    }

    /// Whether a value is stored under `keys`. A stored `()` counts.
    pub fn contains_key(&self, keys: impl IntoKeySeq) -> Result<bool> {
        Ok(self.get(keys)?.is_some())
    }

    /// Clear the value under `keys` and prune per the cleanup policy.
    ///
    /// Missing keys are a no-op and do not count toward `EveryDelete`.
    pub fn remove(&mut self, keys: impl IntoKeySeq) -> Result<Option<V>> {
        let Some(id) = self.find(keys)? else {
            return Ok(None);
        };
        let Some(old) = self.nodes[id].value.take() else {
            return Ok(None);
        };
        self.len -= 1;

        match self.pruner.on_remove() {
            PruneAction::None => {}
            PruneAction::Upward => {
                self.nodes.prune_upward(id);
            }
            PruneAction::Sweep => {
                self.nodes.sweep();
            }
        }
        Ok(Some(old))
    }

    /// Value under `keys`, computing and storing it first if absent.
    pub fn get_or_insert_with<F>(&mut self, keys: impl IntoKeySeq, f: F) -> Result<&mut V>
    where
        F: FnOnce() -> V,
    {
        let path = self.write_path(keys)?;
        let id = self.find_or_create(&path);
        let node = &mut self.nodes[id];
        if node.value.is_none() {
            self.len += 1;
        }
        Ok(node.value.get_or_insert_with(f))
    }

    /// Sweep the whole trie and detach every empty branch.
    ///
    /// Returns the number of nodes detached. Safe to call under any policy.
    pub fn cleanup(&mut self) -> usize {
        self.nodes.sweep()
    }

    /// Drop every entry. Reference ordinals are kept.
    ///
    /// Since ordinals survive, so do their weak handles: allocations of
    /// reference keys ever written stay reserved until the map is dropped.
    pub fn clear(&mut self) {
        self.nodes.reset();
        self.len = 0;
    }

    // =========================================================================
    // Enumeration
    // =========================================================================

    /// All `(canonical key path, value)` pairs.
    ///
    /// Order is whatever the traversal happens to produce and carries no
    /// meaning; each stored value appears exactly once.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            nodes: &self.nodes,
            stack: vec![(Vec::new(), NodeId::ROOT)],
        }
    }

    /// Alias for [`iter`](Self::iter).
    pub fn entries(&self) -> Iter<'_, V> {
        self.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = Vec<Key>> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }
}

impl<V> Default for CompositeMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for CompositeMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, V> IntoIterator for &'a CompositeMap<V> {
    type Item = (Vec<Key>, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Depth-first walk over a [`CompositeMap`] using an explicit stack.
///
/// Each frame carries the key path that reaches its node, so trie depth never
/// turns into call-stack depth.
pub struct Iter<'a, V> {
    nodes: &'a NodeArena<V>,
    stack: Vec<(Vec<Key>, NodeId)>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (Vec<Key>, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((path, id)) = self.stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            for (key, &child) in &node.children {
                let mut child_path = Vec::with_capacity(path.len() + 1);
                child_path.extend_from_slice(&path);
                child_path.push(key.clone());
                self.stack.push((child_path, child));
            }
            if let Some(value) = node.value.as_ref() {
                return Some((path, value));
            }
        }
        None
    }
}
