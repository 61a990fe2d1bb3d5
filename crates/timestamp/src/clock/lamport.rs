//! Lamport clock.
//!
//! # Algorithm
//!
//! - Local event: `c = c + 1`
//! - Receive with timestamp `t`: `c = max(c, t) + 1`
//!
//! If event `a` happened before `b`, then `C(a) < C(b)`. The converse does
//! not hold; ties between nodes are broken by node id when sorting.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::clock::Clock;

#[derive(Debug, Default)]
pub struct LamportClock {
    counter: AtomicU64,
}

impl LamportClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at `value`.
    pub fn starting_at(value: u64) -> Self {
        Self {
            counter: AtomicU64::new(value),
        }
    }
}

impl Clock for LamportClock {
    fn now(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    fn tick(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn observe(&self, received: u64) -> u64 {
        let merged = |c: u64| Some(c.max(received) + 1);
        match self
            .counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, merged)
        {
            Ok(previous) | Err(previous) => previous.max(received) + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_increments() {
        let clock = LamportClock::new();
        assert_eq!(clock.now(), 0);
        assert_eq!(clock.tick(), 1);
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.now(), 2);
    }

    #[test]
    fn test_observe_jumps_ahead() {
        let clock = LamportClock::starting_at(3);
        assert_eq!(clock.observe(10), 11);
        assert_eq!(clock.now(), 11);
    }

    #[test]
    fn test_observe_older_timestamp() {
        let clock = LamportClock::starting_at(7);
        assert_eq!(clock.observe(2), 8);
    }
}
