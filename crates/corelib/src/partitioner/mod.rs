//! Partitioner abstraction for the Chord ring.
//!
//! Partitioners are responsible for converting keys into identifiers
//! that can be placed on the ring.

pub mod sha1;
pub mod traits;

pub use self::sha1::Sha1Partitioner;
pub use traits::Partitioner;
