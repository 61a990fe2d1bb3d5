//! Broadcasts over real loopback sockets.

use std::sync::Arc;

use corelib::{ChordRing, NodeId, RingBuilder};
use gossip::{Connector, ConnectorConfig};

async fn start_all(ring: &Arc<ChordRing>, ids: &[u64]) -> Vec<Connector> {
    let config = ConnectorConfig::default().with_base_port(0);
    let mut connectors = Vec::new();
    for &id in ids {
        let connector = Connector::start(config.clone(), Arc::clone(ring), NodeId(id))
            .await
            .unwrap();
        connectors.push(connector);
    }
    connectors
}

/// Register each node's successor with it; the successor learns the
/// node's address back through `peer_info`.
async fn link_successors(ring: &ChordRing, connectors: &[Connector]) {
    for connector in connectors {
        let successor = ring.successor(connector.id()).unwrap();
        let target = connectors.iter().find(|c| c.id() == successor).unwrap();
        connector
            .register_peer(successor, target.local_addr())
            .await
            .unwrap();
    }
}

// ============================================================================
// Peer Exchange Tests
// ============================================================================

#[tokio::test]
async fn test_register_peer_introduces_both_sides() {
    let ring = Arc::new(RingBuilder::new().add_nodes([1u64, 14]).build().unwrap());
    let connectors = start_all(&ring, &[1, 14]).await;

    connectors[0]
        .register_peer(NodeId(14), connectors[1].local_addr())
        .await
        .unwrap();

    assert_eq!(connectors[0].peer(NodeId(14)), Some(connectors[1].local_addr()));
    // Stored by the receiver before it answered
    assert_eq!(connectors[1].peer(NodeId(1)), Some(connectors[0].local_addr()));
}

// ============================================================================
// Broadcast Tests
// ============================================================================

#[tokio::test]
async fn test_broadcast_travels_once_around_ring() {
    let ring = Arc::new(RingBuilder::new().add_nodes([1u64, 14, 27]).build().unwrap());
    let connectors = start_all(&ring, &[1, 14, 27]).await;
    link_successors(&ring, &connectors).await;

    let message_id = connectors[1].broadcast("hello ring").await.unwrap();
    assert!(message_id.starts_with("14_"));

    for connector in &connectors {
        let received = connector.received();
        assert_eq!(received.len(), 1, "node {} should deliver exactly once", connector.id());
        assert_eq!(received[0].message, "hello ring");
        assert_eq!(received[0].originator_id, NodeId(14));
        assert!(connector.has_seen(&message_id));
    }
}

#[tokio::test]
async fn test_unknown_successor_stops_relay() {
    let ring = Arc::new(RingBuilder::new().add_nodes([1u64, 14, 27]).build().unwrap());
    let connectors = start_all(&ring, &[1, 14, 27]).await;

    // Only 1 -> 14 is linked; 14 learns 1's address but not 27's
    connectors[0]
        .register_peer(NodeId(14), connectors[1].local_addr())
        .await
        .unwrap();

    connectors[0].broadcast("partial").await.unwrap();
    assert_eq!(connectors[0].received().len(), 1);
    assert_eq!(connectors[1].received().len(), 1);
    assert!(connectors[2].received().is_empty());
}

#[tokio::test]
async fn test_cleared_history_accepts_repeat() {
    let ring = Arc::new(RingBuilder::new().add_nodes([5u64]).build().unwrap());
    let connectors = start_all(&ring, &[5]).await;

    connectors[0].broadcast("one").await.unwrap();
    connectors[0].broadcast("two").await.unwrap();
    assert_eq!(connectors[0].received().len(), 2);

    connectors[0].clear_broadcast_history();
    assert!(connectors[0].received().iter().all(|d| !connectors[0].has_seen(&d.message_id)));
}

#[tokio::test]
async fn test_stop_closes_listener() {
    let ring = Arc::new(RingBuilder::new().add_nodes([1u64, 14]).build().unwrap());
    let mut connectors = start_all(&ring, &[1, 14]).await;
    let addr = connectors[1].local_addr();
    connectors[1].stop().await;

    assert!(connectors[0].register_peer(NodeId(14), addr).await.is_err());
}
