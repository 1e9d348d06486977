//! Reclaiming empty trie nodes.
//!
//! Only the chain directly above a just-cleared node can become newly empty,
//! so the upward walk stops at the first ancestor that still holds a value or
//! another child. A sweep runs that same walk from every empty node.

use tracing::{debug, trace};

use crate::config::CleanupPolicy;
use crate::node::{NodeArena, NodeId};

impl<V> NodeArena<V> {
    /// Detach `start` and its ancestors while they are empty.
    ///
    /// Returns the number of nodes detached. The root is never detached.
    pub(crate) fn prune_upward(&mut self, start: NodeId) -> usize {
        let mut removed = 0;
        let mut current = start;
        loop {
            let Some(node) = self.get(current) else {
                break;
            };
            if !node.is_empty() {
                break;
            }
            match self.detach(current) {
                Some(parent) => {
                    trace!(?current, ?parent, "detached empty node");
                    removed += 1;
                    current = parent;
                }
                None => break,
            }
        }
        removed
    }

    /// Collect every empty node, then prune upward from each.
    ///
    /// Nodes already detached by an earlier walk in the same sweep are skipped.
    pub(crate) fn sweep(&mut self) -> usize {
        let empty: Vec<NodeId> = self
            .descendants()
            .into_iter()
            .filter(|&id| id != NodeId::ROOT)
            .filter(|&id| self.get(id).is_some_and(|n| n.is_empty()))
            .collect();

        let mut removed = 0;
        for id in empty {
            if !self.contains(id) {
                continue;
            }
            removed += self.prune_upward(id);
        }
        debug!(removed, live = self.live(), "swept trie");
        removed
    }
}

/// What a successful remove should do to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PruneAction {
    None,
    Upward,
    Sweep,
}

/// Per-map pruning state: the policy and the remove counter it needs.
#[derive(Debug, Clone)]
pub(crate) struct Pruner {
    policy: CleanupPolicy,
    removes: u32,
}

impl Pruner {
    pub(crate) fn new(policy: CleanupPolicy) -> Self {
        Self { policy, removes: 0 }
    }

    #[inline]
    pub(crate) fn policy(&self) -> CleanupPolicy {
        self.policy
    }

    /// Record a remove that actually cleared a value.
    pub(crate) fn on_remove(&mut self) -> PruneAction {
        match self.policy {
            CleanupPolicy::Never | CleanupPolicy::Periodically(_) => PruneAction::None,
            CleanupPolicy::OnDelete => PruneAction::Upward,
            CleanupPolicy::EveryDelete(n) => {
                self.removes += 1;
                if self.removes >= n {
                    self.removes = 0;
                    PruneAction::Sweep
                } else {
                    PruneAction::None
                }
            }
        }
    }

    /// Removes counted toward the next sweep.
    pub(crate) fn pending(&self) -> u32 {
        self.removes
    }
}
