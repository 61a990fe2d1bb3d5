//! Circular identifier space.
//!
//! Node ids and key hashes both live in `[0, 2^m)`. Every comparison on the
//! ring is circular: intervals are walked clockwise from their start and may
//! wrap past zero. The interval helpers shift all three values so the start
//! lands on zero, which turns the wrapped case into a plain `0 < x < b`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Position on the ring.
pub type Identifier = u64;

/// An m-bit circular identifier space.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdSpace {
    bits: u32,
}

impl IdSpace {
    /// Widest supported space. Keeps `2^m` and every offset sum inside `u64`.
    pub const MAX_BITS: u32 = 32;

    pub fn new(bits: u32) -> Result<Self> {
        if bits == 0 || bits > Self::MAX_BITS {
            return Err(Error::InvalidConfig(format!(
                "identifier width must be in 1..={}, got {}",
                Self::MAX_BITS,
                bits
            )));
        }
        Ok(Self { bits })
    }

    /// Number of bits `m`; also the finger table length.
    #[inline]
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// `2^m`: the number of distinct identifiers.
    #[inline]
    pub fn max(&self) -> u64 {
        1u64 << self.bits
    }

    #[inline]
    pub fn contains(&self, id: Identifier) -> bool {
        id < self.max()
    }

    /// Reduce an arbitrary value into the space.
    #[inline]
    pub fn reduce(&self, value: u64) -> Identifier {
        value & (self.max() - 1)
    }

    /// Start of finger `i` for node `id`: `(id + 2^i) mod 2^m`.
    #[inline]
    pub fn finger_start(&self, id: Identifier, i: u32) -> Identifier {
        self.reduce(id + (1u64 << i))
    }

    /// `id - by` with wraparound.
    #[inline]
    pub fn offset_back(&self, id: Identifier, by: u64) -> Identifier {
        let by = by % self.max();
        if by <= id {
            id - by
        } else {
            self.max() - (by - id)
        }
    }

    /// Clockwise distance from `from` to `to`.
    #[inline]
    pub fn distance(&self, from: Identifier, to: Identifier) -> u64 {
        self.reduce(to.wrapping_add(self.max()).wrapping_sub(from))
    }

    /// `x` in the open interval `(a, b)`. When `a == b` the interval is the
    /// whole ring.
    pub fn between(&self, x: Identifier, a: Identifier, b: Identifier) -> bool {
        if a == b {
            return true;
        }
        let x = self.distance(a, x);
        let b = self.distance(a, b);
        0 < x && x < b
    }

    /// `x` in `[a, b)`.
    pub fn between_include_start(&self, x: Identifier, a: Identifier, b: Identifier) -> bool {
        x == a || self.between(x, a, b)
    }

    /// `x` in `(a, b]`.
    pub fn between_include_end(&self, x: Identifier, a: Identifier, b: Identifier) -> bool {
        x == b || self.between(x, a, b)
    }
}

impl Default for IdSpace {
    fn default() -> Self {
        Self { bits: 5 }
    }
}
