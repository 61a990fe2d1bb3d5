//! Finger table of a Chord node.
//!
//! Entry `i` references the successor of `start(i) = (id + 2^i) mod 2^m`.
//! Entry 0 is the immediate successor. The table is empty while the node is
//! detached and holds exactly `m` entries once it has joined.

use serde::{Deserialize, Serialize};

use crate::node::NodeId;
use crate::space::{IdSpace, Identifier};

/// Per-node table of `m` routing shortcuts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerTable {
    starts: Vec<Identifier>,
    nodes: Vec<NodeId>,
}

/// One row of a rendered finger table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerEntry {
    pub index: u32,
    pub start: Identifier,
    pub node: NodeId,
}

impl FingerTable {
    pub fn new(space: IdSpace, owner: NodeId) -> Self {
        let starts = (0..space.bits())
            .map(|i| space.finger_start(owner.get(), i))
            .collect();
        Self {
            starts,
            nodes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of populated entries (0 or m).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn start(&self, index: usize) -> Identifier {
        self.starts[index]
    }

    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.nodes.get(index).copied()
    }

    pub fn successor(&self) -> Option<NodeId> {
        self.get(0)
    }

    pub(crate) fn set(&mut self, index: usize, node: NodeId) {
        tracing::trace!(index, node = %node, "set finger");
        self.nodes[index] = node;
    }

    /// Point every entry at `node`.
    pub(crate) fn fill(&mut self, node: NodeId) {
        self.nodes = vec![node; self.starts.len()];
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Rewrite every entry equal to `old`. Returns how many changed.
    pub(crate) fn replace(&mut self, old: NodeId, new: NodeId) -> usize {
        let mut changed = 0;
        for node in self.nodes.iter_mut().filter(|n| **n == old) {
            *node = new;
            changed += 1;
        }
        changed
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Highest finger strictly inside `(owner, id)`, scanning from the top.
    pub fn closest_preceding(
        &self,
        space: &IdSpace,
        owner: NodeId,
        id: Identifier,
    ) -> Option<NodeId> {
        self.nodes
            .iter()
            .rev()
            .copied()
            .find(|finger| space.between(finger.get(), owner.get(), id))
    }

    pub fn entries(&self) -> impl Iterator<Item = FingerEntry> + '_ {
        self.starts
            .iter()
            .zip(self.nodes.iter())
            .enumerate()
            .map(|(i, (&start, &node))| FingerEntry {
                index: i as u32,
                start,
                node,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(owner: u64, nodes: &[u64]) -> FingerTable {
        let mut table = FingerTable::new(IdSpace::default(), NodeId(owner));
        table.fill(NodeId(owner));
        for (i, n) in nodes.iter().enumerate() {
            table.set(i, NodeId(*n));
        }
        table
    }

    #[test]
    fn test_starts() {
        let t = FingerTable::new(IdSpace::default(), NodeId(27));
        let starts: Vec<_> = (0..5).map(|i| t.start(i)).collect();
        assert_eq!(starts, vec![28, 29, 31, 3, 11]);
        assert!(t.is_empty());
    }

    #[test]
    fn test_closest_preceding_picks_largest_jump() {
        // Node 1 in ring {1, 14, 27}
        let t = table(1, &[14, 14, 14, 14, 27]);
        let space = IdSpace::default();
        assert_eq!(t.closest_preceding(&space, NodeId(1), 30), Some(NodeId(27)));
        assert_eq!(t.closest_preceding(&space, NodeId(1), 20), Some(NodeId(14)));
        assert_eq!(t.closest_preceding(&space, NodeId(1), 10), None);
    }

    #[test]
    fn test_replace() {
        let mut t = table(1, &[14, 14, 14, 14, 27]);
        assert_eq!(t.replace(NodeId(14), NodeId(27)), 4);
        assert!(!t.contains(NodeId(14)));
        assert_eq!(t.successor(), Some(NodeId(27)));
    }
}
