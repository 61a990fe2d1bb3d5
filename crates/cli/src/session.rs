//! Shell state: one ring, its clock layer and any running gossip listeners.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use corelib::topology::Topology;
use corelib::{ChordRing, NodeId};
use gossip::{Connector, ConnectorConfig};
use timestamp::TimestampedRing;
use tracing::{debug, info};

use crate::commands::{Command, CommandResult};

pub struct Session {
    ring: Arc<ChordRing>,
    clocks: TimestampedRing,
    gossip: ConnectorConfig,
    connectors: BTreeMap<NodeId, Connector>,
}

impl Session {
    pub fn new(ring: Arc<ChordRing>, gossip: ConnectorConfig) -> Self {
        Self {
            clocks: TimestampedRing::new(Arc::clone(&ring)),
            ring,
            gossip,
            connectors: BTreeMap::new(),
        }
    }

    pub fn ring(&self) -> &Arc<ChordRing> {
        &self.ring
    }

    /// Node that serves a request: `via` if given, else the bootstrap.
    fn entry_node(&self, via: Option<u64>) -> Result<NodeId> {
        match via {
            Some(id) => Ok(NodeId(id)),
            None => self
                .ring
                .bootstrap()
                .ok_or_else(|| anyhow!("ring is empty, join a node first")),
        }
    }

    fn connector(&self, id: NodeId) -> Result<&Connector> {
        self.connectors
            .get(&id)
            .ok_or_else(|| anyhow!("node {} is not listening, run `listen {}` first", id, id))
    }

    pub async fn execute(&mut self, command: Command) -> Result<CommandResult> {
        debug!(?command, "executing");
        let result = match command {
            Command::Join { id, via } => {
                let id = NodeId(id);
                let via = match via {
                    Some(v) => NodeId(v),
                    None => self.ring.bootstrap().unwrap_or(id),
                };
                self.ring.create_node(id)?;
                if let Err(e) = self.ring.join(id, via) {
                    // Leave no detached node behind
                    self.ring.discard(id).ok();
                    return Err(e).with_context(|| format!("node {} failed to join via {}", id, via));
                }
                CommandResult::Joined { id, via }
            }
            Command::JoinRandom => {
                let id = self.ring.spawn_node()?;
                let via = self.ring.bootstrap().unwrap_or(id);
                CommandResult::Joined { id, via }
            }
            Command::Leave { id } => {
                let id = NodeId(id);
                let keys = self.ring.info(id)?.entries.len();
                let successor = self.ring.successor(id).ok().filter(|s| *s != id);
                self.ring.leave(id)?;
                self.clocks.forget(id);
                if let Some(mut connector) = self.connectors.remove(&id) {
                    connector.stop().await;
                }
                CommandResult::Left { id, successor, keys }
            }
            Command::Insert { key, value, via } => {
                let via = self.entry_node(via)?;
                let (node, envelope) = self.clocks.put(via, &key, &value)?;
                CommandResult::Stored {
                    key,
                    node,
                    timestamp: envelope.timestamp,
                }
            }
            Command::Get { key, via } => {
                let via = self.entry_node(via)?;
                let (node, value) = self.clocks.read(via, &key)?;
                CommandResult::Found { key, value, node }
            }
            Command::Owner { key } => CommandResult::Owner(self.ring.owner_of(&key)?),
            Command::Nodes => CommandResult::Nodes(
                self.ring
                    .nodes()
                    .into_iter()
                    .filter(|n| n.successor.is_some())
                    .collect(),
            ),
            Command::Info { id, json: false } => CommandResult::Info(self.ring.info(NodeId(id))?),
            Command::Info { id, json: true } => {
                let info = self.ring.info(NodeId(id))?;
                CommandResult::InfoJson(serde_json::to_string_pretty(&info)?)
            }
            Command::Fingers { id } => CommandResult::Fingers {
                id: NodeId(id),
                rows: self.ring.finger_table(NodeId(id))?,
            },
            Command::Elect { id } => {
                self.ring.clear_leaders();
                CommandResult::Leader(self.ring.start_election(NodeId(id))?)
            }
            Command::Verify => {
                let topology = Topology::capture(&self.ring);
                topology.verify()?;
                CommandResult::Verified {
                    nodes: topology.len(),
                    stale_fingers: topology.stale_fingers().len(),
                }
            }
            Command::Events { id } => CommandResult::Events {
                id: NodeId(id),
                events: self.clocks.event_history(NodeId(id)),
            },
            Command::Listen { id } => self.listen(NodeId(id)).await?,
            Command::Broadcast { id, message } => {
                let message_id = self.connector(NodeId(id))?.broadcast(&message.join(" ")).await?;
                CommandResult::Broadcast { message_id }
            }
            Command::History { id } => CommandResult::History {
                id: NodeId(id),
                deliveries: self.connector(NodeId(id))?.received(),
            },
            Command::ResetBroadcasts { id } => {
                self.connector(NodeId(id))?.clear_broadcast_history();
                CommandResult::BroadcastsReset(NodeId(id))
            }
            Command::Exit => CommandResult::Exit,
        };
        Ok(result)
    }

    /// Start a listener for `id` and exchange addresses with every node
    /// already listening.
    async fn listen(&mut self, id: NodeId) -> Result<CommandResult> {
        if self.connectors.contains_key(&id) {
            return Err(anyhow!("node {} is already listening", id));
        }
        self.ring.successor(id)?;

        let connector = Connector::start(self.gossip.clone(), Arc::clone(&self.ring), id)
            .await
            .with_context(|| format!("failed to start listener for node {}", id))?;
        for (peer, other) in &self.connectors {
            connector.register_peer(*peer, other.local_addr()).await?;
        }

        let result = CommandResult::Listening {
            id,
            addr: connector.local_addr(),
            peers: connector.peers().len(),
        };
        self.connectors.insert(id, connector);
        Ok(result)
    }

    /// Stop every listener.
    pub async fn shutdown(&mut self) {
        for (id, mut connector) in std::mem::take(&mut self.connectors) {
            connector.stop().await;
            info!(node = %id, "listener stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::parse_line;
    use corelib::RingBuilder;

    fn session() -> Session {
        let ring = RingBuilder::new().build().unwrap();
        Session::new(Arc::new(ring), ConnectorConfig::default().with_base_port(0))
    }

    async fn run(session: &mut Session, line: &str) -> Result<CommandResult> {
        let command = parse_line(line).unwrap().unwrap();
        session.execute(command).await
    }

    #[tokio::test]
    async fn test_join_insert_get() {
        let mut s = session();
        assert_eq!(
            run(&mut s, "join 1").await.unwrap(),
            CommandResult::Joined { id: NodeId(1), via: NodeId(1) }
        );
        run(&mut s, "join 14").await.unwrap();
        run(&mut s, "join 27 --via 14").await.unwrap();

        let stored = run(&mut s, "insert apple red --via 14").await.unwrap();
        assert!(matches!(stored, CommandResult::Stored { node: NodeId(1), .. }));

        let found = run(&mut s, "get apple --via 27").await.unwrap();
        assert_eq!(
            found,
            CommandResult::Found {
                key: "apple".to_string(),
                value: Some("red".to_string()),
                node: NodeId(1),
            }
        );
        assert!(matches!(
            run(&mut s, "verify").await.unwrap(),
            CommandResult::Verified { nodes: 3, stale_fingers: 0 }
        ));
    }

    #[tokio::test]
    async fn test_failed_join_leaves_nothing_behind() {
        let mut s = session();
        run(&mut s, "join 1").await.unwrap();
        assert!(run(&mut s, "join 5 --via 9").await.is_err());
        assert!(!s.ring().contains(NodeId(5)));
    }

    #[tokio::test]
    async fn test_leave_reports_handoff() {
        let mut s = session();
        for line in ["join 1", "join 14", "join 27", "insert cherry red"] {
            run(&mut s, line).await.unwrap();
        }
        assert_eq!(
            run(&mut s, "leave 27").await.unwrap(),
            CommandResult::Left {
                id: NodeId(27),
                successor: Some(NodeId(1)),
                keys: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_self_join_into_live_ring_is_refused() {
        let mut s = session();
        run(&mut s, "join 1").await.unwrap();
        run(&mut s, "join 9").await.unwrap();
        assert!(run(&mut s, "join 14 --via 14").await.is_err());
        assert!(!s.ring().contains(NodeId(14)));
        assert!(matches!(
            run(&mut s, "verify").await.unwrap(),
            CommandResult::Verified { nodes: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_rejoined_node_starts_with_fresh_clock() {
        let mut s = session();
        for line in ["join 1", "join 14", "insert apple red --via 14"] {
            run(&mut s, line).await.unwrap();
        }
        run(&mut s, "leave 14").await.unwrap();
        run(&mut s, "join 14").await.unwrap();
        assert_eq!(
            run(&mut s, "events 14").await.unwrap(),
            CommandResult::Events { id: NodeId(14), events: vec![] }
        );
        let stored = run(&mut s, "insert banana yellow --via 14").await.unwrap();
        assert!(matches!(stored, CommandResult::Stored { timestamp: 1, .. }));
    }

    #[tokio::test]
    async fn test_elect() {
        let mut s = session();
        for line in ["join 1", "join 12", "join 24", "join 18", "join 9"] {
            run(&mut s, line).await.unwrap();
        }
        assert_eq!(run(&mut s, "elect 12").await.unwrap(), CommandResult::Leader(NodeId(24)));
    }

    #[tokio::test]
    async fn test_empty_ring_requests() {
        let mut s = session();
        assert!(run(&mut s, "insert apple red").await.is_err());
        assert!(run(&mut s, "owner apple").await.is_err());
    }

    #[tokio::test]
    async fn test_broadcast_between_listeners() {
        let mut s = session();
        for line in ["join 1", "join 14", "join 27", "listen 1", "listen 14", "listen 27"] {
            run(&mut s, line).await.unwrap();
        }
        run(&mut s, "broadcast 14 hello everyone").await.unwrap();

        for id in [1, 14, 27] {
            match run(&mut s, &format!("history {}", id)).await.unwrap() {
                CommandResult::History { deliveries, .. } => {
                    assert_eq!(deliveries.len(), 1);
                    assert_eq!(deliveries[0].message, "hello everyone");
                }
                other => panic!("unexpected result {:?}", other),
            }
        }
        assert!(run(&mut s, "broadcast 5 hi").await.is_err());
        s.shutdown().await;
    }
}
