//! Chord ring implementation.
//!
//! The ring keeps every node in an arena and runs the protocol over it:
//! lookup routing, join and leave with key migration, and leader election.

mod arena;
mod election;
mod membership;
mod routing;
#[allow(clippy::module_inception)]
pub mod ring;

pub use ring::{
    ChordRing, KeyLocation, NodeHandle, NodeInfo, NodeSummary, RingBuilder, StoredEntry,
};

/// Alias for the main ring type (used by lib.rs).
pub type Ring = ChordRing;
