//! Core library for the Chord distributed hash table.
//!
//! This crate provides the ring protocol itself:
//! - Circular identifier space and SHA-1 key partitioning
//! - Node state and finger tables
//! - Lookup routing in `O(log N)` hops
//! - Join and leave with key migration
//! - Chang-Roberts leader election over the successor ring
//! - Topology snapshots and invariant checks

pub mod error;
pub mod finger;
pub mod node;
pub mod partitioner;
pub mod ring;
pub mod space;
pub mod topology;

pub use error::{Error, Result};
pub use finger::{FingerEntry, FingerTable};
pub use node::{Entry, Node, NodeId};
pub use partitioner::{Partitioner, Sha1Partitioner};
pub use ring::{ChordRing, NodeHandle, Ring, RingBuilder};
pub use space::{IdSpace, Identifier};
pub use topology::Topology;
