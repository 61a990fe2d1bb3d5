//! Join and leave.
//!
//! Both operations are synchronous: when they return, successor and
//! predecessor links form one sorted cycle and every stored key sits on the
//! node owning the interval `(predecessor, node]`.
//!
//! Cross-node recursion (`update_finger_table` walking back through
//! predecessors) is run as a loop bounded by the ring size.

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::node::{Node, NodeId};
use crate::ring::arena::Arena;
use crate::space::Identifier;

impl Arena {
    /// Attach `node` to the ring through `bootstrap`. A node joining through
    /// itself founds the ring, which is only allowed while no other node is
    /// attached.
    pub(crate) fn join(&mut self, node: NodeId, bootstrap: NodeId) -> Result<()> {
        if self.node(node)?.is_attached() {
            return Err(Error::DuplicateIdentifier(node));
        }

        if node == bootstrap {
            let live = self
                .bootstrap
                .or_else(|| self.nodes.values().find(|n| n.is_attached()).map(Node::id));
            if let Some(live) = live {
                return Err(Error::RingExists(live));
            }
            let n = self.node_mut(node)?;
            n.fingers.fill(node);
            n.predecessor = Some(node);
            self.bootstrap.get_or_insert(node);
            metrics::counter!("chord_joins_total").increment(1);
            info!(node = %node, "node founded a ring");
            return Ok(());
        }

        self.attached(bootstrap)?;
        self.init_finger_table(node, bootstrap)?;
        self.update_others(node)?;
        let moved = self.move_keys(node)?;

        metrics::counter!("chord_joins_total").increment(1);
        metrics::counter!("chord_keys_migrated_total").increment(moved as u64);
        info!(node = %node, bootstrap = %bootstrap, moved, "node joined");
        Ok(())
    }

    fn init_finger_table(&mut self, node: NodeId, bootstrap: NodeId) -> Result<()> {
        let space = self.space;
        let bits = space.bits() as usize;

        let start = self.node(node)?.fingers.start(0);
        let successor = self.find_successor(bootstrap, start)?;
        let predecessor = self.predecessor(successor)?;

        // Until the loop below resolves them, higher fingers fall back to
        // the successor so lookups passing through this node stay valid.
        {
            let n = self.node_mut(node)?;
            n.fingers.fill(successor);
            n.predecessor = Some(predecessor);
        }
        self.node_mut(successor)?.predecessor = Some(node);
        self.node_mut(predecessor)?.fingers.set(0, node);

        for i in 0..bits.saturating_sub(1) {
            let (next_start, current) = {
                let n = self.node(node)?;
                (n.fingers.start(i + 1), self.finger(node, i)?)
            };
            let next = if space.between_include_start(next_start, node.get(), current.get()) {
                current
            } else {
                self.find_successor(bootstrap, next_start)?
            };
            self.node_mut(node)?.fingers.set(i + 1, next);
        }
        Ok(())
    }

    /// Point every node whose finger `i` should now be `node` at it.
    fn update_others(&mut self, node: NodeId) -> Result<()> {
        for i in 0..self.space.bits() {
            let target = self.space.offset_back(node.get(), 1u64 << i);
            let p = self.node_at_or_before(node, target)?;
            self.update_finger_table(p, node, i as usize)?;
        }
        Ok(())
    }

    /// Last node whose id is at or before `target`, routed from `from`.
    fn node_at_or_before(&self, from: NodeId, target: Identifier) -> Result<NodeId> {
        let p = self.find_predecessor(from, target)?;
        let successor = self.successor(p)?;
        Ok(if successor.get() == target { successor } else { p })
    }

    /// Starting at `start`, replace finger `i` with `s` while `s` falls in
    /// `[current, finger[i])`, then continue with the predecessor.
    fn update_finger_table(&mut self, start: NodeId, s: NodeId, i: usize) -> Result<()> {
        let mut current = start;
        for _ in 0..=self.hop_limit() {
            let finger = self.finger(current, i)?;
            if current == s
                || !self
                    .space
                    .between_include_start(s.get(), current.get(), finger.get())
            {
                return Ok(());
            }
            debug!(node = %current, index = i, old = %finger, new = %s, "finger updated");
            self.node_mut(current)?.fingers.set(i, s);
            current = self.predecessor(current)?;
        }
        Err(Error::InvariantViolation(format!(
            "finger {} propagation for node {} did not settle",
            i, s
        )))
    }

    /// Pull the keys in `(predecessor, node]` over from the successor.
    fn move_keys(&mut self, node: NodeId) -> Result<usize> {
        let space = self.space;
        let successor = self.successor(node)?;
        let predecessor = self.predecessor(node)?;
        if successor == node {
            return Ok(0);
        }

        let moved: Vec<_> = {
            let store = &mut self.node_mut(successor)?.store;
            let owned: Vec<Identifier> = store
                .keys()
                .copied()
                .filter(|hash| space.between_include_end(*hash, predecessor.get(), node.get()))
                .collect();
            owned
                .into_iter()
                .filter_map(|hash| store.remove(&hash).map(|entry| (hash, entry)))
                .collect()
        };

        let count = moved.len();
        self.node_mut(node)?.store.extend(moved);
        debug!(node = %node, from = %successor, count, "keys migrated");
        Ok(count)
    }

    /// Detach `node` from the ring, handing its keys to the successor.
    /// Returns the node, stripped of all links and keys.
    pub(crate) fn leave(&mut self, node: NodeId) -> Result<Node> {
        self.attached(node)?;
        let successor = self.successor(node)?;
        let predecessor = self.predecessor(node)?;

        if successor == node {
            let mut last = self.nodes.remove(&node).ok_or(Error::NodeNotFound(node))?;
            if !last.store.is_empty() {
                warn!(node = %node, keys = last.store.len(), "last node left, keys dropped");
            }
            last.detach();
            self.bootstrap = None;
            metrics::counter!("chord_leaves_total").increment(1);
            info!(node = %node, "last node left the ring");
            return Ok(last);
        }

        // Fingers are repaired while the node is still linked, so routing
        // during the repair sees a consistent ring.
        self.update_others_leave(node, successor)?;

        let store = std::mem::take(&mut self.node_mut(node)?.store);
        let handed = store.len();
        self.node_mut(successor)?.store.extend(store);

        self.node_mut(successor)?.predecessor = Some(predecessor);
        self.node_mut(predecessor)?.fingers.set(0, successor);

        let stale = self.scrub_references(node, successor);
        if stale > 0 {
            warn!(node = %node, stale, "rewrote finger entries missed by leave repair");
        }

        let mut departed = self.nodes.remove(&node).ok_or(Error::NodeNotFound(node))?;
        departed.detach();

        if self.bootstrap == Some(node) {
            self.bootstrap = self
                .nodes
                .values()
                .find(|n| n.is_attached())
                .map(Node::id);
        }

        metrics::counter!("chord_leaves_total").increment(1);
        info!(node = %node, successor = %successor, handed, "node left");
        Ok(departed)
    }

    /// For each finger index, walk back from the node that sits at
    /// `node - 2^i` and redirect entries pointing at `node` to `successor`.
    fn update_others_leave(&mut self, node: NodeId, successor: NodeId) -> Result<()> {
        for i in 0..self.space.bits() {
            let target = self.space.offset_back(node.get(), 1u64 << i);
            let p = self.node_at_or_before(node, target)?;
            self.retarget_finger(p, i as usize, node, successor)?;
        }
        Ok(())
    }

    fn retarget_finger(&mut self, start: NodeId, i: usize, old: NodeId, new: NodeId) -> Result<()> {
        let mut current = start;
        for _ in 0..=self.hop_limit() {
            if current != old {
                if self.finger(current, i)? != old {
                    return Ok(());
                }
                debug!(node = %current, index = i, old = %old, new = %new, "finger retargeted");
                self.node_mut(current)?.fingers.set(i, new);
            }
            current = self.predecessor(current)?;
            if current == start {
                return Ok(());
            }
        }
        Err(Error::InvariantViolation(format!(
            "finger {} repair for departing node {} did not settle",
            i, old
        )))
    }

    /// Redirect any remaining reference to `old`. Returns the number of
    /// entries rewritten.
    fn scrub_references(&mut self, old: NodeId, new: NodeId) -> usize {
        self.nodes
            .values_mut()
            .filter(|n| n.id() != old)
            .map(|n| n.fingers.replace(old, new))
            .sum()
    }
}
