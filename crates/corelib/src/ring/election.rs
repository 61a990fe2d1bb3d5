//! Chang-Roberts leader election over the successor ring.
//!
//! The candidate carried around the ring never decreases, so the largest id
//! becomes the stable candidate and wins after its own id survives a full
//! circuit. A run visits at most `3N` nodes.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::node::NodeId;
use crate::ring::arena::Arena;

/// Election message in flight.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Ballot {
    at: NodeId,
    candidate: NodeId,
    seen: bool,
}

impl Arena {
    /// Run an election started at `initiator` and announce the winner.
    pub(crate) fn start_election(&mut self, initiator: NodeId) -> Result<NodeId> {
        self.attached(initiator)?;
        info!(node = %initiator, "election started");

        let leader = self.forward_election(Ballot {
            at: initiator,
            candidate: initiator,
            seen: false,
        })?;
        self.announce_leader(leader)?;

        metrics::counter!("chord_elections_total").increment(1);
        info!(leader = %leader, "election finished");
        Ok(leader)
    }

    fn forward_election(&self, mut ballot: Ballot) -> Result<NodeId> {
        let limit = 3 * self.hop_limit();
        for _ in 0..limit {
            let Ballot { at, candidate, seen } = ballot;
            let next = self.successor(at)?;
            ballot = if at == candidate && seen {
                debug!(node = %at, "own id completed a circuit");
                return Ok(at);
            } else if at == candidate {
                Ballot { at: next, candidate, seen: true }
            } else if at < candidate {
                Ballot { at: next, candidate, seen }
            } else {
                debug!(node = %at, replaced = %candidate, "candidate replaced");
                Ballot { at: next, candidate: at, seen: false }
            };
        }
        Err(Error::InvariantViolation(format!(
            "election did not converge within {} hops",
            limit
        )))
    }

    /// Set `leader` on every node, walking successors once around the ring.
    fn announce_leader(&mut self, leader: NodeId) -> Result<()> {
        let mut current = leader;
        for _ in 0..=self.hop_limit() {
            self.node_mut(current)?.leader = Some(leader);
            debug!(node = %current, leader = %leader, "leader acknowledged");

            let next = self.successor(current)?;
            if next == leader || self.node(next)?.leader == Some(leader) {
                return Ok(());
            }
            current = next;
        }
        Err(Error::InvariantViolation(format!(
            "announcement of leader {} did not return to it",
            leader
        )))
    }

    pub(crate) fn clear_leaders(&mut self) {
        for node in self.nodes.values_mut() {
            node.leader = None;
        }
    }
}
