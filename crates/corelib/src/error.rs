//! Error types for the core library.

use crate::node::NodeId;
use crate::space::Identifier;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Every identifier in the space is already taken by a live node.
    #[error("ring is at capacity ({max} nodes)")]
    CapacityExceeded { max: u64 },
    /// A node with this id is already registered.
    #[error("identifier {0} is already in use")]
    DuplicateIdentifier(NodeId),
    /// No live node with this id.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    /// The owning node holds no entry for this key.
    #[error("key {0:?} not found")]
    KeyNotFound(String),
    /// No node has joined yet.
    #[error("ring has no live nodes")]
    EmptyRing,
    /// Id does not fit in the identifier space.
    #[error("identifier {id} is outside [0, {max})")]
    IdentifierOutOfRange { id: Identifier, max: u64 },
    /// A node tried to found a ring while one is already live.
    #[error("a ring already exists, join through node {0}")]
    RingExists(NodeId),
    /// Operation needs a ring-attached node.
    #[error("node {0} has not joined a ring")]
    Detached(NodeId),
    /// Ring state contradicts a topology invariant. Indicates a bug in repair.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// Invalid ring configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
