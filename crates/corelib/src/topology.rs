//! Ring topology views.
//!
//! A `Topology` is a point-in-time copy of the ring used for ownership
//! calculation, range listing and invariant checks. It reads the snapshot
//! directly instead of routing, so it is an independent oracle for what the
//! protocol should have produced.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::finger::FingerEntry;
use crate::node::{Node, NodeId};
use crate::ring::ChordRing;
use crate::space::{IdSpace, Identifier};

/// Snapshot of the attached nodes of a ring.
#[derive(Clone, Debug)]
pub struct Topology {
    space: IdSpace,
    nodes: BTreeMap<NodeId, Node>,
}

/// Slice of the identifier space owned by one node: `(after, through]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedRange {
    pub node: NodeId,
    pub after: Identifier,
    pub through: Identifier,
}

/// Finger entry that differs from the exact successor of its start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaleFinger {
    pub node: NodeId,
    pub entry: FingerEntry,
    pub expected: NodeId,
}

impl Topology {
    pub fn capture(ring: &ChordRing) -> Self {
        Self::from_nodes(ring.space(), ring.snapshot())
    }

    pub fn from_nodes(space: IdSpace, nodes: impl IntoIterator<Item = Node>) -> Self {
        let nodes = nodes
            .into_iter()
            .filter(Node::is_attached)
            .map(|n| (n.id(), n))
            .collect();
        Self { space, nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// First node at or after `id`, wrapping past the top of the space.
    pub fn owner_of(&self, id: Identifier) -> Option<NodeId> {
        self.nodes
            .range(NodeId(id)..)
            .next()
            .or_else(|| self.nodes.iter().next())
            .map(|(id, _)| *id)
    }

    fn expected_successor(&self, id: NodeId) -> Option<NodeId> {
        self.owner_of(self.space.reduce(id.get() + 1))
    }

    fn expected_predecessor(&self, id: NodeId) -> Option<NodeId> {
        self.nodes
            .range(..id)
            .next_back()
            .or_else(|| self.nodes.iter().next_back())
            .map(|(id, _)| *id)
    }

    /// Ownership ranges in ring order.
    pub fn ranges(&self) -> Vec<OwnedRange> {
        self.nodes
            .keys()
            .filter_map(|&id| {
                self.expected_predecessor(id).map(|p| OwnedRange {
                    node: id,
                    after: p.get(),
                    through: id.get(),
                })
            })
            .collect()
    }

    /// Follow successor links from `start` until the walk returns to it.
    pub fn walk(&self, start: NodeId) -> Result<Vec<NodeId>> {
        let mut order = vec![start];
        let mut current = start;
        loop {
            let node = self.nodes.get(&current).ok_or_else(|| {
                Error::InvariantViolation(format!("walk reached unknown node {}", current))
            })?;
            let next = node
                .successor()
                .ok_or_else(|| Error::InvariantViolation(format!("node {} has no successor", current)))?;
            if next == start {
                return Ok(order);
            }
            if order.len() >= self.nodes.len() {
                return Err(Error::InvariantViolation(format!(
                    "successor walk from {} does not close after {} hops",
                    start,
                    order.len()
                )));
            }
            order.push(next);
            current = next;
        }
    }

    /// Check every ring invariant.
    pub fn verify(&self) -> Result<()> {
        let Some(&first) = self.nodes.keys().next() else {
            return Ok(());
        };

        let order = self.walk(first)?;
        if order.len() != self.nodes.len() {
            return Err(Error::InvariantViolation(format!(
                "ring visits {} of {} nodes",
                order.len(),
                self.nodes.len()
            )));
        }

        for (&id, node) in &self.nodes {
            let successor = node.successor();
            let predecessor = node.predecessor();
            if successor != self.expected_successor(id) {
                return Err(Error::InvariantViolation(format!(
                    "node {} has successor {:?}, expected {:?}",
                    id,
                    successor,
                    self.expected_successor(id)
                )));
            }
            if predecessor != self.expected_predecessor(id) {
                return Err(Error::InvariantViolation(format!(
                    "node {} has predecessor {:?}, expected {:?}",
                    id,
                    predecessor,
                    self.expected_predecessor(id)
                )));
            }
            if node.fingers().len() != self.space.bits() as usize {
                return Err(Error::InvariantViolation(format!(
                    "node {} has {} fingers",
                    id,
                    node.fingers().len()
                )));
            }
            if let Some(dangling) = node
                .fingers()
                .entries()
                .find(|e| !self.nodes.contains_key(&e.node))
            {
                return Err(Error::InvariantViolation(format!(
                    "node {} finger {} references departed node {}",
                    id, dangling.index, dangling.node
                )));
            }
            if let Some(hash) = node
                .store()
                .keys()
                .find(|hash| self.owner_of(**hash) != Some(id))
            {
                return Err(Error::InvariantViolation(format!(
                    "node {} stores hash {} owned by {:?}",
                    id,
                    hash,
                    self.owner_of(*hash)
                )));
            }
        }
        Ok(())
    }

    /// Finger entries that lag behind the exact successor of their start.
    pub fn stale_fingers(&self) -> Vec<StaleFinger> {
        let mut stale = Vec::new();
        for (&id, node) in &self.nodes {
            for entry in node.fingers().entries() {
                if let Some(expected) = self.owner_of(entry.start) {
                    if expected != entry.node {
                        stale.push(StaleFinger {
                            node: id,
                            entry,
                            expected,
                        });
                    }
                }
            }
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::RingBuilder;

    #[test]
    fn test_owner_wraps() {
        let ring = RingBuilder::new().add_nodes([1u64, 14, 27]).build().unwrap();
        let topology = Topology::capture(&ring);
        assert_eq!(topology.owner_of(0), Some(NodeId(1)));
        assert_eq!(topology.owner_of(14), Some(NodeId(14)));
        assert_eq!(topology.owner_of(15), Some(NodeId(27)));
        assert_eq!(topology.owner_of(28), Some(NodeId(1)));
    }

    #[test]
    fn test_ranges_cover_ring() {
        let ring = RingBuilder::new().add_nodes([1u64, 14, 27]).build().unwrap();
        let ranges = Topology::capture(&ring).ranges();
        assert_eq!(
            ranges,
            vec![
                OwnedRange { node: NodeId(1), after: 27, through: 1 },
                OwnedRange { node: NodeId(14), after: 1, through: 14 },
                OwnedRange { node: NodeId(27), after: 14, through: 27 },
            ]
        );
    }

    #[test]
    fn test_verify_detects_broken_link() {
        let ring = RingBuilder::new().add_nodes([1u64, 14, 27]).build().unwrap();
        let mut nodes = ring.snapshot();
        for node in nodes.iter_mut().filter(|n| n.id() == NodeId(14)) {
            node.predecessor = Some(NodeId(27));
        }
        let topology = Topology::from_nodes(ring.space(), nodes);
        assert!(matches!(topology.verify(), Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_detached_nodes_are_ignored() {
        let ring = RingBuilder::new().add_nodes([3u64, 9]).build().unwrap();
        ring.create_node(NodeId(20)).unwrap();
        let topology = Topology::capture(&ring);
        assert_eq!(topology.ids(), vec![NodeId(3), NodeId(9)]);
        assert!(topology.verify().is_ok());
    }
}
