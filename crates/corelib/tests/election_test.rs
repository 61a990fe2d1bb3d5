//! Tests for Chang-Roberts leader election over the successor ring.

use corelib::node::NodeId;
use corelib::ring::{ChordRing, RingBuilder};
use corelib::Error;

fn ring_of(ids: &[u64]) -> ChordRing {
    RingBuilder::new()
        .add_nodes(ids.iter().copied())
        .build()
        .expect("ring should build")
}

// ============================================================================
// Election Tests
// ============================================================================

#[test]
fn test_largest_id_wins() {
    // Joined in this order: 1, 12, 24, 18, 9
    let ring = ring_of(&[1, 12, 24, 18, 9]);

    let leader = ring.start_election(NodeId(12)).unwrap();
    assert_eq!(leader, NodeId(24));

    for id in [1, 9, 12, 18, 24] {
        assert_eq!(
            ring.leader(NodeId(id)).unwrap(),
            Some(NodeId(24)),
            "node {} should know the leader",
            id
        );
    }
}

#[test]
fn test_any_initiator_elects_same_leader() {
    let ring = ring_of(&[1, 12, 24, 18, 9]);

    for initiator in [1, 9, 12, 18, 24] {
        ring.clear_leaders();
        let leader = ring.start_election(NodeId(initiator)).unwrap();
        assert_eq!(leader, NodeId(24), "election started at {}", initiator);
        assert!(ring
            .nodes()
            .iter()
            .all(|n| ring.leader(n.id).unwrap() == Some(NodeId(24))));
    }
}

#[test]
fn test_single_node_elects_itself() {
    let ring = ring_of(&[6]);
    assert_eq!(ring.start_election(NodeId(6)).unwrap(), NodeId(6));
    assert_eq!(ring.leader(NodeId(6)).unwrap(), Some(NodeId(6)));
}

#[test]
fn test_leaders_cleared() {
    let ring = ring_of(&[3, 17]);
    ring.start_election(NodeId(3)).unwrap();
    ring.clear_leaders();
    assert_eq!(ring.leader(NodeId(3)).unwrap(), None);
    assert_eq!(ring.leader(NodeId(17)).unwrap(), None);
}

#[test]
fn test_reelection_after_leader_leaves() {
    // Nothing is retained between elections: a new run picks the new maximum
    let ring = ring_of(&[1, 12, 24, 18, 9]);
    ring.start_election(NodeId(1)).unwrap();
    ring.leave(NodeId(24)).unwrap();

    ring.clear_leaders();
    let leader = ring.node(NodeId(9)).unwrap().start_election().unwrap();
    assert_eq!(leader, NodeId(18));
    assert_eq!(ring.leader(NodeId(1)).unwrap(), Some(NodeId(18)));
}

#[test]
fn test_election_needs_attached_initiator() {
    let ring = ring_of(&[1, 14]);
    ring.create_node(NodeId(20)).unwrap();
    assert_eq!(
        ring.start_election(NodeId(20)).unwrap_err(),
        Error::Detached(NodeId(20))
    );
    assert_eq!(
        ring.start_election(NodeId(2)).unwrap_err(),
        Error::NodeNotFound(NodeId(2))
    );
}
