//! Node abstractions for the Chord ring.
//!
//! A `Node` is the ring membership unit: identity, finger table, predecessor
//! link, and the slice of the key space it currently owns. Nodes never hold
//! references to each other; fingers and the predecessor are stored as
//! `NodeId`s and resolved through the ring's arena.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::finger::FingerTable;
use crate::space::{IdSpace, Identifier};

/// Compact identifier for a node on the ring.
///
/// Newtype over the raw identifier so node ids and key hashes cannot be
/// mixed up even though both live in the same space.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(pub Identifier);

impl NodeId {
    #[inline]
    pub fn get(self) -> Identifier {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Identifier> for NodeId {
    fn from(id: Identifier) -> Self {
        NodeId(id)
    }
}

/// A stored key-value pair. The map key is the hash of `key`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: String,
}

impl Entry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Partition of the key space owned by one node, keyed by hashed key.
pub type KeyStore = BTreeMap<Identifier, Entry>;

/// Ring membership unit.
#[derive(Clone, Debug)]
pub struct Node {
    id: NodeId,
    pub(crate) fingers: FingerTable,
    pub(crate) predecessor: Option<NodeId>,
    pub(crate) store: KeyStore,
    pub(crate) leader: Option<NodeId>,
}

impl Node {
    /// A detached node: empty finger table, no predecessor.
    pub fn new(space: IdSpace, id: NodeId) -> Self {
        Self {
            id,
            fingers: FingerTable::new(space, id),
            predecessor: None,
            store: KeyStore::new(),
            leader: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// `finger[0]`, once joined.
    pub fn successor(&self) -> Option<NodeId> {
        self.fingers.successor()
    }

    pub fn predecessor(&self) -> Option<NodeId> {
        self.predecessor
    }

    pub fn fingers(&self) -> &FingerTable {
        &self.fingers
    }

    pub fn store(&self) -> &KeyStore {
        &self.store
    }

    pub fn leader(&self) -> Option<NodeId> {
        self.leader
    }

    pub fn is_attached(&self) -> bool {
        !self.fingers.is_empty() && self.predecessor.is_some()
    }

    /// Drop every link and stored key.
    pub(crate) fn detach(&mut self) {
        self.fingers.clear();
        self.predecessor = None;
        self.store.clear();
        self.leader = None;
    }
}
