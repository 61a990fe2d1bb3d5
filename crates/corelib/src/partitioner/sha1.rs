//! SHA-1 partitioner implementation.
//!
//! The digest is read as a big-endian integer and reduced modulo `2^m`.
//! Since `m` never exceeds 32 only the trailing digest bytes matter, so the
//! reduction works on the last eight bytes. Any reimplementation using the
//! same `m` lands keys on the same identifiers.

use ::sha1::{Digest, Sha1};

use crate::partitioner::traits::Partitioner;
use crate::space::{IdSpace, Identifier};

/// SHA-1 partitioner.
#[derive(Clone, Debug)]
pub struct Sha1Partitioner {
    space: IdSpace,
}

impl Sha1Partitioner {
    pub fn new(space: IdSpace) -> Self {
        Self { space }
    }

    /// Hash a string key.
    pub fn hash_key(&self, key: &str) -> Identifier {
        self.partition(key.as_bytes())
    }
}

impl Partitioner for Sha1Partitioner {
    fn partition(&self, key: &[u8]) -> Identifier {
        let digest = Sha1::digest(key);
        let mut tail = [0u8; 8];
        tail.copy_from_slice(&digest[digest.len() - 8..]);
        self.space.reduce(u64::from_be_bytes(tail))
    }

    fn name(&self) -> &'static str {
        "Sha1Partitioner"
    }
}
