//! Node arena shared by the routing, membership and election algorithms.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::node::{Node, NodeId};
use crate::space::IdSpace;

/// Every registered node, addressed by id. Links between nodes are ids, so
/// a cross-node call in the protocol is a lookup here.
#[derive(Debug)]
pub(crate) struct Arena {
    pub(crate) space: IdSpace,
    pub(crate) nodes: BTreeMap<NodeId, Node>,
    /// Entry point handed to joining nodes.
    pub(crate) bootstrap: Option<NodeId>,
}

impl Arena {
    pub(crate) fn new(space: IdSpace) -> Self {
        Self {
            space,
            nodes: BTreeMap::new(),
            bootstrap: None,
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(Error::NodeNotFound(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))
    }

    /// Like `node`, but the node must be part of a ring.
    pub(crate) fn attached(&self, id: NodeId) -> Result<&Node> {
        let node = self.node(id)?;
        if node.is_attached() {
            Ok(node)
        } else {
            Err(Error::Detached(id))
        }
    }

    pub(crate) fn successor(&self, id: NodeId) -> Result<NodeId> {
        self.node(id)?.successor().ok_or(Error::Detached(id))
    }

    pub(crate) fn predecessor(&self, id: NodeId) -> Result<NodeId> {
        self.node(id)?.predecessor().ok_or(Error::Detached(id))
    }

    pub(crate) fn finger(&self, id: NodeId, index: usize) -> Result<NodeId> {
        self.node(id)?.fingers.get(index).ok_or(Error::Detached(id))
    }

    pub(crate) fn attached_count(&self) -> usize {
        self.nodes.values().filter(|n| n.is_attached()).count()
    }

    /// Upper bound on nodes visited by any single walk around the ring.
    pub(crate) fn hop_limit(&self) -> usize {
        self.nodes.len() + 1
    }
}
