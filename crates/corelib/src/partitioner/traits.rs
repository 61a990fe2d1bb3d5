//! Core partitioner trait definitions.

use crate::space::Identifier;

/// A partitioner converts keys into identifiers for placement on the ring.
///
/// Partitioners are stateless and thread-safe, allowing concurrent
/// hashing without synchronization overhead.
pub trait Partitioner: Send + Sync + 'static {
    /// Converts a key into an identifier.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to partition
    ///
    /// # Returns
    ///
    /// An identifier in `[0, 2^m)` for the partitioner's space
    fn partition(&self, key: &[u8]) -> Identifier;

    /// Returns the name of this partitioner.
    fn name(&self) -> &'static str;
}
