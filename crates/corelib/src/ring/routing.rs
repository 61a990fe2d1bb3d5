//! Lookup routing over finger tables.
//!
//! `find_predecessor` hops greedily through `closest_preceding_finger`: each
//! hop lands strictly inside `(current, id)`, so the walk only moves
//! clockwise towards `id` and never overshoots it. With `m = O(log N)` the
//! expected hop count is `O(log N)`.

use tracing::debug;

use crate::error::{Error, Result};
use crate::node::NodeId;
use crate::ring::arena::Arena;
use crate::space::Identifier;

impl Arena {
    /// Node responsible for `id`, asked of node `from`.
    pub(crate) fn find_successor(&self, from: NodeId, id: Identifier) -> Result<NodeId> {
        let predecessor = self.predecessor(from)?;
        if self
            .space
            .between_include_end(id, predecessor.get(), from.get())
        {
            return Ok(from);
        }
        let p = self.find_predecessor(from, id)?;
        self.successor(p)
    }

    /// Node `c` such that `id` lies in `(c, c.successor]`.
    pub(crate) fn find_predecessor(&self, from: NodeId, id: Identifier) -> Result<NodeId> {
        if id == from.get() {
            return self.predecessor(from);
        }

        let mut current = from;
        let mut hops = 0usize;
        loop {
            let successor = self.successor(current)?;
            if self
                .space
                .between_include_end(id, current.get(), successor.get())
            {
                break;
            }

            let next = self.closest_preceding_finger(current, id)?;
            if next == current {
                return Err(Error::InvariantViolation(format!(
                    "routing for {} stalled at node {} (successor {})",
                    id, current, successor
                )));
            }
            debug!(from = %current, to = %next, target = id, "routing hop");
            current = next;

            hops += 1;
            if hops > self.hop_limit() {
                return Err(Error::InvariantViolation(format!(
                    "routing for {} exceeded {} hops",
                    id,
                    self.hop_limit()
                )));
            }
        }

        metrics::histogram!("chord_lookup_hops").record(hops as f64);
        Ok(current)
    }

    /// Highest finger of `from` strictly inside `(from, id)`, or `from`.
    pub(crate) fn closest_preceding_finger(&self, from: NodeId, id: Identifier) -> Result<NodeId> {
        let node = self.attached(from)?;
        Ok(node
            .fingers
            .closest_preceding(&self.space, from, id)
            .unwrap_or(from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::space::IdSpace;

    /// Ring {1, 14, 27} in a 5-bit space with exact fingers.
    fn arena() -> Arena {
        let space = IdSpace::default();
        let mut arena = Arena::new(space);
        let wiring: [(u64, u64, [u64; 5]); 3] = [
            (1, 27, [14, 14, 14, 14, 27]),
            (14, 1, [27, 27, 27, 27, 1]),
            (27, 14, [1, 1, 1, 14, 14]),
        ];
        for (id, pred, fingers) in wiring {
            let mut node = Node::new(space, NodeId(id));
            node.fingers.fill(NodeId(id));
            for (i, f) in fingers.iter().enumerate() {
                node.fingers.set(i, NodeId(*f));
            }
            node.predecessor = Some(NodeId(pred));
            arena.nodes.insert(NodeId(id), node);
        }
        arena
    }

    #[test]
    fn test_find_successor_local_and_remote() {
        let arena = arena();
        assert_eq!(arena.find_successor(NodeId(1), 0).unwrap(), NodeId(1));
        assert_eq!(arena.find_successor(NodeId(1), 1).unwrap(), NodeId(1));
        assert_eq!(arena.find_successor(NodeId(1), 2).unwrap(), NodeId(14));
        assert_eq!(arena.find_successor(NodeId(1), 20).unwrap(), NodeId(27));
        assert_eq!(arena.find_successor(NodeId(14), 30).unwrap(), NodeId(1));
        assert_eq!(arena.find_successor(NodeId(27), 14).unwrap(), NodeId(14));
    }

    #[test]
    fn test_find_predecessor_of_own_id() {
        let arena = arena();
        assert_eq!(arena.find_predecessor(NodeId(14), 14).unwrap(), NodeId(1));
    }

    #[test]
    fn test_closest_preceding_finger_falls_back_to_self() {
        let arena = arena();
        assert_eq!(arena.closest_preceding_finger(NodeId(1), 5).unwrap(), NodeId(1));
        assert_eq!(arena.closest_preceding_finger(NodeId(1), 31).unwrap(), NodeId(27));
    }

    #[test]
    fn test_routing_from_detached_node_fails() {
        let mut arena = arena();
        arena
            .nodes
            .insert(NodeId(5), Node::new(IdSpace::default(), NodeId(5)));
        assert_eq!(
            arena.find_successor(NodeId(5), 3),
            Err(Error::Detached(NodeId(5)))
        );
    }
}
