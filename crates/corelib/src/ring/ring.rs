//! The ring context: registry of live nodes plus the protocol entry points.
//!
//! `ChordRing` owns every node in an arena behind a single reader-writer
//! lock. Lookups (`get`, `find_successor`, listings) share the read side and
//! run concurrently; anything that touches a finger table, predecessor, key
//! store or leader takes the write side for the whole operation, so a
//! membership change publishes all of its steps before the next one starts.

use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::finger::FingerEntry;
use crate::node::{Entry, Node, NodeId};
use crate::partitioner::{Partitioner, Sha1Partitioner};
use crate::ring::arena::Arena;
use crate::space::{IdSpace, Identifier};
use crate::topology::Topology;

/// Chord ring and node registry.
pub struct ChordRing {
    space: IdSpace,
    partitioner: Arc<dyn Partitioner>,
    arena: RwLock<Arena>,
}

/// Listing row for one node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: NodeId,
    pub successor: Option<NodeId>,
    pub predecessor: Option<NodeId>,
    pub key_count: usize,
}

/// Stored entry together with its hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub hash: Identifier,
    pub key: String,
    pub value: String,
}

/// Detailed view of one node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub successor: Option<NodeId>,
    pub predecessor: Option<NodeId>,
    pub leader: Option<NodeId>,
    pub entries: Vec<StoredEntry>,
}

/// Where a key lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyLocation {
    pub key: String,
    pub hash: Identifier,
    pub node: NodeId,
}

impl ChordRing {
    /// Empty ring over the default 5-bit space.
    pub fn new() -> Self {
        Self::with_space(IdSpace::default())
    }

    pub fn with_space(space: IdSpace) -> Self {
        Self::with_partitioner(space, Arc::new(Sha1Partitioner::new(space)))
    }

    pub fn with_partitioner(space: IdSpace, partitioner: Arc<dyn Partitioner>) -> Self {
        Self {
            space,
            partitioner,
            arena: RwLock::new(Arena::new(space)),
        }
    }

    pub fn space(&self) -> IdSpace {
        self.space
    }

    pub fn partitioner_name(&self) -> &'static str {
        self.partitioner.name()
    }

    pub fn hash_key(&self, key: &str) -> Identifier {
        self.partitioner.partition(key.as_bytes())
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Register a detached node with the given id.
    pub fn create_node(&self, id: NodeId) -> Result<NodeHandle<'_>> {
        let mut arena = self.arena.write();
        self.admit(&mut arena, id)?;
        Ok(NodeHandle { ring: self, id })
    }

    fn admit(&self, arena: &mut Arena, id: NodeId) -> Result<()> {
        if !self.space.contains(id.get()) {
            return Err(Error::IdentifierOutOfRange {
                id: id.get(),
                max: self.space.max(),
            });
        }
        if arena.nodes.len() as u64 >= self.space.max() {
            return Err(Error::CapacityExceeded {
                max: self.space.max(),
            });
        }
        if arena.nodes.contains_key(&id) {
            return Err(Error::DuplicateIdentifier(id));
        }
        arena.nodes.insert(id, Node::new(self.space, id));
        Ok(())
    }

    /// Handle to a registered node.
    pub fn node(&self, id: NodeId) -> Result<NodeHandle<'_>> {
        self.arena.read().node(id)?;
        Ok(NodeHandle { ring: self, id })
    }

    /// Admit a node with a random free id and attach it: it founds the ring
    /// when no bootstrap node exists, otherwise joins through the bootstrap.
    #[instrument(skip(self))]
    pub fn spawn_node(&self) -> Result<NodeId> {
        let mut arena = self.arena.write();
        if arena.nodes.len() as u64 >= self.space.max() {
            return Err(Error::CapacityExceeded {
                max: self.space.max(),
            });
        }

        let mut rng = rand::rng();
        let id = loop {
            let candidate = NodeId(rng.random_range(0..self.space.max()));
            if !arena.nodes.contains_key(&candidate) {
                break candidate;
            }
        };

        self.admit(&mut arena, id)?;
        let bootstrap = arena.bootstrap.unwrap_or(id);
        if let Err(e) = arena.join(id, bootstrap) {
            arena.nodes.remove(&id);
            return Err(e);
        }
        Ok(id)
    }

    /// Drop a registered node that never joined. Returns false, and keeps
    /// the node, if it is part of the ring; attached nodes must `leave`.
    pub fn discard(&self, id: NodeId) -> Result<bool> {
        let mut arena = self.arena.write();
        if arena.node(id)?.is_attached() {
            return Ok(false);
        }
        arena.nodes.remove(&id);
        Ok(true)
    }

    /// Node handed to joiners as their entry point.
    pub fn bootstrap(&self) -> Option<NodeId> {
        self.arena.read().bootstrap
    }

    /// Registered nodes, attached or not.
    pub fn node_count(&self) -> usize {
        self.arena.read().nodes.len()
    }

    /// Nodes currently part of the ring.
    pub fn len(&self) -> usize {
        self.arena.read().attached_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.read().nodes.contains_key(&id)
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Attach `node` through `bootstrap`; `node == bootstrap` founds the ring
    /// and fails with `RingExists` once a ring is live.
    #[instrument(skip(self))]
    pub fn join(&self, node: NodeId, bootstrap: NodeId) -> Result<()> {
        self.arena.write().join(node, bootstrap)
    }

    /// Detach `node`, hand its keys to its successor and drop it from the
    /// registry. Returns the detached node.
    #[instrument(skip(self))]
    pub fn leave(&self, node: NodeId) -> Result<Node> {
        self.arena.write().leave(node)
    }

    // ------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------

    pub fn find_successor(&self, via: NodeId, id: Identifier) -> Result<NodeId> {
        self.arena.read().find_successor(via, id)
    }

    pub fn find_predecessor(&self, via: NodeId, id: Identifier) -> Result<NodeId> {
        self.arena.read().find_predecessor(via, id)
    }

    pub fn closest_preceding_finger(&self, via: NodeId, id: Identifier) -> Result<NodeId> {
        self.arena.read().closest_preceding_finger(via, id)
    }

    pub fn successor(&self, id: NodeId) -> Result<NodeId> {
        self.arena.read().successor(id)
    }

    pub fn predecessor(&self, id: NodeId) -> Result<NodeId> {
        self.arena.read().predecessor(id)
    }

    /// Hash and owner of `key`, routed from the bootstrap node.
    pub fn owner_of(&self, key: &str) -> Result<KeyLocation> {
        let arena = self.arena.read();
        let via = arena.bootstrap.ok_or(Error::EmptyRing)?;
        let hash = self.hash_key(key);
        let node = arena.find_successor(via, hash)?;
        Ok(KeyLocation {
            key: key.to_string(),
            hash,
            node,
        })
    }

    // ------------------------------------------------------------------
    // Key-value
    // ------------------------------------------------------------------

    /// Store `key` on its owner, asked of node `via`. Overwrites silently.
    #[instrument(skip(self, value))]
    pub fn put(&self, via: NodeId, key: &str, value: &str) -> Result<NodeId> {
        let hash = self.hash_key(key);
        let mut arena = self.arena.write();
        let owner = arena.find_successor(via, hash)?;
        arena
            .node_mut(owner)?
            .store
            .insert(hash, Entry::new(key, value));
        info!(key, hash, owner = %owner, "key stored");
        Ok(owner)
    }

    /// Fetch `key` from its owner, asked of node `via`.
    #[instrument(skip(self))]
    pub fn get(&self, via: NodeId, key: &str) -> Result<Entry> {
        self.lookup(via, key)?
            .1
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Route `key` from `via` and read it in one step. Returns the owner
    /// that served the read and its entry, if any.
    pub fn lookup(&self, via: NodeId, key: &str) -> Result<(NodeId, Option<Entry>)> {
        let hash = self.hash_key(key);
        let arena = self.arena.read();
        let owner = arena.find_successor(via, hash)?;
        let entry = arena.node(owner)?.store.get(&hash).cloned();
        Ok((owner, entry))
    }

    // ------------------------------------------------------------------
    // Election
    // ------------------------------------------------------------------

    #[instrument(skip(self))]
    pub fn start_election(&self, initiator: NodeId) -> Result<NodeId> {
        self.arena.write().start_election(initiator)
    }

    pub fn leader(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.arena.read().node(id)?.leader())
    }

    pub fn clear_leaders(&self) {
        self.arena.write().clear_leaders();
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    pub fn nodes(&self) -> Vec<NodeSummary> {
        self.arena
            .read()
            .nodes
            .values()
            .map(|n| NodeSummary {
                id: n.id(),
                successor: n.successor(),
                predecessor: n.predecessor(),
                key_count: n.store().len(),
            })
            .collect()
    }

    pub fn info(&self, id: NodeId) -> Result<NodeInfo> {
        let arena = self.arena.read();
        let node = arena.node(id)?;
        Ok(NodeInfo {
            id,
            successor: node.successor(),
            predecessor: node.predecessor(),
            leader: node.leader(),
            entries: node
                .store()
                .iter()
                .map(|(hash, entry)| StoredEntry {
                    hash: *hash,
                    key: entry.key.clone(),
                    value: entry.value.clone(),
                })
                .collect(),
        })
    }

    pub fn finger_table(&self, id: NodeId) -> Result<Vec<FingerEntry>> {
        let arena = self.arena.read();
        Ok(arena.attached(id)?.fingers().entries().collect())
    }

    /// Total number of stored keys across the ring.
    pub fn key_count(&self) -> usize {
        self.arena.read().nodes.values().map(|n| n.store().len()).sum()
    }

    /// Copy of every registered node.
    pub fn snapshot(&self) -> Vec<Node> {
        self.arena.read().nodes.values().cloned().collect()
    }

    /// Check the ring invariants against the current state.
    pub fn verify(&self) -> Result<()> {
        Topology::capture(self).verify()
    }
}

impl Default for ChordRing {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChordRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChordRing")
            .field("space", &self.space)
            .field("partitioner", &self.partitioner.name())
            .field("nodes", &self.node_count())
            .finish()
    }
}

/// Borrowed handle to one registered node. Mirrors the per-node protocol
/// surface; every call goes through the owning ring.
#[derive(Copy, Clone, Debug)]
pub struct NodeHandle<'r> {
    ring: &'r ChordRing,
    id: NodeId,
}

impl<'r> NodeHandle<'r> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn join(&self, bootstrap: NodeId) -> Result<()> {
        self.ring.join(self.id, bootstrap)
    }

    pub fn leave(self) -> Result<Node> {
        self.ring.leave(self.id)
    }

    pub fn put(&self, key: &str, value: &str) -> Result<NodeId> {
        self.ring.put(self.id, key, value)
    }

    pub fn get(&self, key: &str) -> Result<Entry> {
        self.ring.get(self.id, key)
    }

    pub fn find_successor(&self, id: Identifier) -> Result<NodeId> {
        self.ring.find_successor(self.id, id)
    }

    pub fn successor(&self) -> Result<NodeId> {
        self.ring.successor(self.id)
    }

    pub fn predecessor(&self) -> Result<NodeId> {
        self.ring.predecessor(self.id)
    }

    pub fn start_election(&self) -> Result<NodeId> {
        self.ring.start_election(self.id)
    }

    pub fn leader(&self) -> Result<Option<NodeId>> {
        self.ring.leader(self.id)
    }

    pub fn info(&self) -> Result<NodeInfo> {
        self.ring.info(self.id)
    }
}

/// Builder for a ring with an initial membership.
///
/// Nodes join in the order they were added; the first one founds the ring
/// and becomes the bootstrap for the rest.
#[derive(Default)]
pub struct RingBuilder {
    bits: Option<u32>,
    partitioner: Option<Arc<dyn Partitioner>>,
    nodes: Vec<NodeId>,
}

impl RingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier width `m`. Defaults to 5.
    pub fn with_bits(mut self, bits: u32) -> Self {
        self.bits = Some(bits);
        self
    }

    pub fn with_partitioner(mut self, partitioner: Arc<dyn Partitioner>) -> Self {
        self.partitioner = Some(partitioner);
        self
    }

    pub fn add_node(mut self, id: impl Into<NodeId>) -> Self {
        self.nodes.push(id.into());
        self
    }

    pub fn add_nodes<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<NodeId>,
    {
        self.nodes.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<ChordRing> {
        let space = match self.bits {
            Some(bits) => IdSpace::new(bits)?,
            None => IdSpace::default(),
        };
        let ring = match self.partitioner {
            Some(partitioner) => ChordRing::with_partitioner(space, partitioner),
            None => ChordRing::with_space(space),
        };

        if let Some((&first, rest)) = self.nodes.split_first() {
            ring.create_node(first)?.join(first)?;
            for &id in rest {
                ring.create_node(id)?.join(first)?;
            }
        }
        Ok(ring)
    }
}
