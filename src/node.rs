//! Trie nodes and the arena that owns them.
//!
//! Every node lives in a slot of [`NodeArena`]. Parents own children through
//! their child maps; the `parent` link is a plain slot index used only to walk
//! upward while pruning, never to keep anything alive.

use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use crate::key::Key;

/// Slot index of a node in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(u32);

impl NodeId {
    pub(crate) const ROOT: NodeId = NodeId(0);

    /// Id for slot `idx`.
    ///
    /// # Panics
    ///
    /// If `idx` does not fit in 32 bits; a wrapped id would alias live slots.
    fn from_index(idx: usize) -> Self {
        match u32::try_from(idx) {
            Ok(i) => NodeId(i),
            Err(_) => panic!("node arena exceeded {} slots", u32::MAX),
        }
    }

    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone)]
pub(crate) struct Node<V> {
    pub(crate) value: Option<V>,
    pub(crate) children: HashMap<Key, NodeId>,
    /// Edge key and parent slot. `None` only for the root.
    pub(crate) parent: Option<(Key, NodeId)>,
}

impl<V> Node<V> {
    fn new(parent: Option<(Key, NodeId)>) -> Self {
        Self {
            value: None,
            children: HashMap::new(),
            parent,
        }
    }

    /// No value and no children: a pruning candidate.
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }
}

/// Slot storage for trie nodes with a free list.
///
/// Slot 0 always holds the root.
#[derive(Clone)]
pub(crate) struct NodeArena<V> {
    slots: Vec<Option<Node<V>>>,
    free: Vec<NodeId>,
    live: usize,
}

impl<V> NodeArena<V> {
    pub(crate) fn new() -> Self {
        Self {
            slots: vec![Some(Node::new(None))],
            free: Vec::new(),
            live: 1,
        }
    }

    /// Number of live nodes, root included.
    #[inline]
    pub(crate) fn live(&self) -> usize {
        self.live
    }

    #[inline]
    pub(crate) fn contains(&self, id: NodeId) -> bool {
        matches!(self.slots.get(id.idx()), Some(Some(_)))
    }

    #[inline]
    pub(crate) fn get(&self, id: NodeId) -> Option<&Node<V>> {
        self.slots.get(id.idx()).and_then(Option::as_ref)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<V>> {
        self.slots.get_mut(id.idx()).and_then(Option::as_mut)
    }

    /// The root slot is never freed.
    #[inline]
    pub(crate) fn root(&self) -> &Node<V> {
        match self.slots.first() {
            Some(Some(root)) => root,
            _ => unreachable!("root slot is never freed"),
        }
    }

    /// Child of `parent` along `key`, if present.
    #[inline]
    pub(crate) fn child(&self, parent: NodeId, key: &Key) -> Option<NodeId> {
        self.get(parent)?.children.get(key).copied()
    }

    /// Child of `parent` along `key`, creating it if missing.
    pub(crate) fn child_or_insert(&mut self, parent: NodeId, key: &Key) -> NodeId {
        if let Some(id) = self.child(parent, key) {
            return id;
        }
        let id = self.alloc(Node::new(Some((key.clone(), parent))));
        if let Some(p) = self.get_mut(parent) {
            p.children.insert(key.clone(), id);
        }
        id
    }

    fn alloc(&mut self, node: Node<V>) -> NodeId {
        self.live += 1;
        if let Some(id) = self.free.pop() {
            self.slots[id.idx()] = Some(node);
            return id;
        }
        let id = NodeId::from_index(self.slots.len());
        self.slots.push(Some(node));
        id
    }

    /// Unlink `id` from its parent and free its slot.
    ///
    /// Returns the parent, or `None` when `id` is the root or already freed.
    /// Callers only detach empty nodes, so no subtree is orphaned.
    pub(crate) fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        if id == NodeId::ROOT {
            return None;
        }
        let node = self.slots.get_mut(id.idx())?.take()?;
        debug_assert!(node.is_empty(), "only empty nodes are detached");
        self.live -= 1;
        self.free.push(id);

        let (key, parent) = node.parent?;
        if let Some(p) = self.get_mut(parent) {
            p.children.remove(&key);
        }
        Some(parent)
    }

    /// Drop every node except a fresh root.
    pub(crate) fn reset(&mut self) {
        self.slots.clear();
        self.slots.push(Some(Node::new(None)));
        self.free.clear();
        self.live = 1;
    }

    /// Slot ids of every live node, found with an explicit stack from the root.
    pub(crate) fn descendants(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.live);
        let mut stack = vec![NodeId::ROOT];
        while let Some(id) = stack.pop() {
            let Some(node) = self.get(id) else {
                continue;
            };
            out.push(id);
            stack.extend(node.children.values().copied());
        }
        out
    }
}

impl<V> Index<NodeId> for NodeArena<V> {
    type Output = Node<V>;

    fn index(&self, id: NodeId) -> &Node<V> {
        match self.get(id) {
            Some(node) => node,
            None => panic!("node slot {id:?} is free"),
        }
    }
}

impl<V> IndexMut<NodeId> for NodeArena<V> {
    fn index_mut(&mut self, id: NodeId) -> &mut Node<V> {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("node slot {id:?} is free"),
        }
    }
}
