//! Timestamped view of a Chord ring.
//!
//! `TimestampedRing` wraps a shared `ChordRing` and stamps every `put` and
//! `get` with the issuing node's Lamport clock. The ring itself never sees
//! clocks: writes still go through the core `put`, reads through `get`.

use std::sync::Arc;

use corelib::{ChordRing, NodeId};
use dashmap::DashMap;
use tracing::{debug, info};

use crate::clock::{Clock, LamportClock};
use crate::error::Result;
use crate::event::{Envelope, Operation};

/// Logical time and logs of one node.
#[derive(Debug, Default)]
struct Ledger {
    clock: LamportClock,
    /// Operations this node issued.
    events: Vec<Envelope>,
    /// Writes this node received as owner.
    received: Vec<Envelope>,
}

#[derive(Debug)]
pub struct TimestampedRing {
    ring: Arc<ChordRing>,
    ledgers: DashMap<NodeId, Ledger>,
}

impl TimestampedRing {
    pub fn new(ring: Arc<ChordRing>) -> Self {
        Self {
            ring,
            ledgers: DashMap::new(),
        }
    }

    pub fn ring(&self) -> &Arc<ChordRing> {
        &self.ring
    }

    /// Stamp and issue a write from `via`. Returns the owner and the envelope.
    pub fn put(&self, via: NodeId, key: &str, value: &str) -> Result<(NodeId, Envelope)> {
        self.ring.successor(via)?;

        let envelope = {
            let mut ledger = self.ledgers.entry(via).or_default();
            let timestamp = ledger.clock.tick();
            let envelope = Envelope::put(key, value, timestamp, via);
            ledger.events.push(envelope.clone());
            envelope
        };

        let owner = self.ring.put(via, key, value)?;

        let mut ledger = self.ledgers.entry(owner).or_default();
        let now = ledger.clock.observe(envelope.timestamp);
        ledger.received.push(envelope.clone());
        info!(
            key,
            timestamp = envelope.timestamp,
            sender = %via,
            owner = %owner,
            clock = now,
            "timestamped put"
        );
        Ok((owner, envelope))
    }

    /// Stamp and issue a read from `via`. A missing key is `Ok(None)`.
    pub fn get(&self, via: NodeId, key: &str) -> Result<Option<String>> {
        Ok(self.read(via, key)?.1)
    }

    /// Like `get`, also returning the owner that served the read. The key is
    /// routed once, so the clock advanced is always the serving node's.
    pub fn read(&self, via: NodeId, key: &str) -> Result<(NodeId, Option<String>)> {
        self.ring.successor(via)?;

        let timestamp = {
            let mut ledger = self.ledgers.entry(via).or_default();
            let timestamp = ledger.clock.tick();
            ledger.events.push(Envelope::get(key, timestamp, via));
            timestamp
        };

        let (owner, entry) = self.ring.lookup(via, key)?;
        let now = self.ledgers.entry(owner).or_default().clock.observe(timestamp);
        debug!(key, timestamp, sender = %via, owner = %owner, clock = now, "timestamped get");
        Ok((owner, entry.map(|e| e.value)))
    }

    /// Drop the clock and logs of `node`, typically after it left the ring.
    /// A node rejoining with the same id starts again from time 0.
    pub fn forget(&self, node: NodeId) -> bool {
        let forgotten = self.ledgers.remove(&node).is_some();
        if forgotten {
            info!(node = %node, "ledger dropped");
        }
        forgotten
    }

    /// Current clock of `node`; 0 before its first event.
    pub fn clock(&self, node: NodeId) -> u64 {
        self.ledgers.get(&node).map_or(0, |l| l.clock.now())
    }

    /// Events issued by `node`, ordered by `(timestamp, sender_id)`.
    pub fn event_history(&self, node: NodeId) -> Vec<Envelope> {
        let mut events = self
            .ledgers
            .get(&node)
            .map(|l| l.events.clone())
            .unwrap_or_default();
        events.sort_by_key(Envelope::order_key);
        events
    }

    /// Writes `node` received as owner, in arrival order.
    pub fn message_history(&self, node: NodeId) -> Vec<Envelope> {
        self.ledgers
            .get(&node)
            .map(|l| l.received.clone())
            .unwrap_or_default()
    }

    /// Every node's events merged into one `(timestamp, sender_id)` order.
    pub fn global_history(&self) -> Vec<Envelope> {
        let mut events: Vec<Envelope> = self
            .ledgers
            .iter()
            .flat_map(|l| l.events.clone())
            .collect();
        events.sort_by_key(Envelope::order_key);
        events
    }

    /// Number of puts and gets issued by `node`.
    pub fn operation_counts(&self, node: NodeId) -> (usize, usize) {
        self.ledgers.get(&node).map_or((0, 0), |l| {
            let puts = l.events.iter().filter(|e| e.operation == Operation::Put).count();
            (puts, l.events.len() - puts)
        })
    }
}
