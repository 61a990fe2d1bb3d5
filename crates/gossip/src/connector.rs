//! Per-node TCP connector.
//!
//! Each node runs one listener and handles every connection on its own task.
//! A broadcast is relayed to the ring successor of the receiving node, so a
//! message travels once around the ring and stops at the first node that has
//! already seen its id.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use corelib::{ChordRing, NodeId};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::codec::{read_frame, write_frame};
use crate::config::ConnectorConfig;
use crate::error::{GossipError, Result};
use crate::protocol::{Message, Response};

/// A broadcast as first seen by this node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub message_id: String,
    pub originator_id: NodeId,
    pub message: String,
}

/// State shared between the connector handle and its connection tasks.
struct Shared {
    id: NodeId,
    host: String,
    port: u16,
    config: ConnectorConfig,
    ring: Arc<ChordRing>,
    peers: DashMap<NodeId, SocketAddr>,
    seen: Mutex<HashSet<String>>,
    delivered: Mutex<Vec<Delivery>>,
}

pub struct Connector {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_loop: Option<JoinHandle<()>>,
}

impl Connector {
    /// Bind the listener for node `id` and start accepting connections.
    pub async fn start(config: ConnectorConfig, ring: Arc<ChordRing>, id: NodeId) -> Result<Self> {
        let port = config.port_for(id)?;
        let listener = TcpListener::bind((config.host.as_str(), port)).await?;
        let local_addr = listener.local_addr()?;
        info!(node = %id, addr = %local_addr, "listening");

        let shared = Arc::new(Shared {
            id,
            host: config.host.clone(),
            port: local_addr.port(),
            config,
            ring,
            peers: DashMap::new(),
            seen: Mutex::new(HashSet::new()),
            delivered: Mutex::new(Vec::new()),
        });

        let (shutdown, stopped) = watch::channel(false);
        let accept_loop = tokio::spawn(accept_loop(listener, Arc::clone(&shared), stopped));

        Ok(Self {
            shared,
            local_addr,
            shutdown,
            accept_loop: Some(accept_loop),
        })
    }

    pub fn id(&self) -> NodeId {
        self.shared.id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Record the address of `node` and send it ours.
    pub async fn register_peer(&self, node: NodeId, addr: SocketAddr) -> Result<()> {
        self.shared.peers.insert(node, addr);
        info!(node = %self.shared.id, peer = %node, addr = %addr, "peer registered");

        let introduction = Message::PeerInfo {
            node_id: self.shared.id,
            host: self.shared.host.clone(),
            port: self.shared.port,
        };
        self.shared.send(addr, &introduction).await?;
        Ok(())
    }

    pub fn peer(&self, node: NodeId) -> Option<SocketAddr> {
        self.shared.peers.get(&node).map(|addr| *addr)
    }

    pub fn peers(&self) -> Vec<(NodeId, SocketAddr)> {
        let mut peers: Vec<_> = self.shared.peers.iter().map(|e| (*e.key(), *e.value())).collect();
        peers.sort();
        peers
    }

    /// Originate a broadcast. Each hop answers only after its own successor
    /// has, so on return the message has been around the ring.
    pub async fn broadcast(&self, message: &str) -> Result<String> {
        let message_id = format!("{}_{}", self.shared.id, Ulid::new());
        self.shared
            .relay(message.to_string(), self.shared.id, message_id.clone())
            .await?;
        Ok(message_id)
    }

    /// Broadcasts delivered here, oldest first.
    pub fn received(&self) -> Vec<Delivery> {
        self.shared.delivered.lock().clone()
    }

    pub fn has_seen(&self, message_id: &str) -> bool {
        self.shared.seen.lock().contains(message_id)
    }

    /// Forget every seen message id. Delivered messages stay listed.
    pub fn clear_broadcast_history(&self) {
        let cleared = {
            let mut seen = self.shared.seen.lock();
            let n = seen.len();
            seen.clear();
            n
        };
        debug!(node = %self.shared.id, cleared, "broadcast history cleared");
    }

    /// Stop accepting connections and wait for the listener to close.
    pub async fn stop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.accept_loop.take() {
            if let Err(e) = handle.await {
                warn!(node = %self.shared.id, error = %e, "accept loop ended abnormally");
            }
        }
        info!(node = %self.shared.id, "stopped");
    }
}

impl Drop for Connector {
    fn drop(&mut self) {
        if let Some(handle) = self.accept_loop.take() {
            handle.abort();
        }
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>, mut stopped: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = stopped.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((socket, peer)) => {
                    let shared = Arc::clone(&shared);
                    tokio::spawn(async move {
                        if let Err(e) = shared.handle_connection(socket).await {
                            warn!(node = %shared.id, peer = %peer, error = %e, "connection failed");
                        }
                    });
                }
                Err(e) => warn!(node = %shared.id, error = %e, "accept failed"),
            },
        }
    }
}

impl Shared {
    async fn handle_connection(&self, mut socket: TcpStream) -> Result<()> {
        let response = match read_frame::<_, Message>(&mut socket, self.config.max_frame_bytes).await {
            Ok(message) => self.handle_message(message).await,
            Err(e) => Response::error(e.to_string()),
        };
        write_frame(&mut socket, &response).await
    }

    async fn handle_message(&self, message: Message) -> Response {
        match message {
            Message::Broadcast {
                message,
                originator_id,
                message_id,
            } => match self.relay(message, originator_id, message_id).await {
                Ok(()) => Response::ok("Broadcast received"),
                Err(e) => Response::error(e.to_string()),
            },
            Message::PeerInfo { node_id, host, port } => {
                match tokio::net::lookup_host((host.as_str(), port)).await {
                    Ok(mut addrs) => match addrs.next() {
                        Some(addr) => {
                            self.peers.insert(node_id, addr);
                            debug!(node = %self.id, peer = %node_id, addr = %addr, "peer info stored");
                            Response::ok("Peer info stored")
                        }
                        None => Response::error(format!("no address for {}:{}", host, port)),
                    },
                    Err(e) => Response::error(e.to_string()),
                }
            }
        }
    }

    /// Deliver a broadcast locally and pass it to the ring successor.
    /// A message id seen before is dropped.
    async fn relay(&self, message: String, originator_id: NodeId, message_id: String) -> Result<()> {
        if !self.seen.lock().insert(message_id.clone()) {
            debug!(node = %self.id, message_id = %message_id, "duplicate broadcast dropped");
            return Ok(());
        }
        info!(node = %self.id, originator = %originator_id, message_id = %message_id, "broadcast received");
        self.delivered.lock().push(Delivery {
            message_id: message_id.clone(),
            originator_id,
            message: message.clone(),
        });

        let successor = self.ring.successor(self.id)?;
        if successor == self.id {
            return Ok(());
        }
        let Some(addr) = self.peers.get(&successor).map(|a| *a) else {
            debug!(node = %self.id, successor = %successor, "successor address unknown, not forwarding");
            return Ok(());
        };

        let forward = Message::Broadcast {
            message,
            originator_id,
            message_id,
        };
        self.send(addr, &forward).await?;
        Ok(())
    }

    /// One request/response exchange with a peer.
    async fn send(&self, addr: SocketAddr, message: &Message) -> Result<Response> {
        let exchange = async {
            let mut stream = TcpStream::connect(addr).await?;
            write_frame(&mut stream, message).await?;
            read_frame::<_, Response>(&mut stream, self.config.max_frame_bytes).await
        };
        let response = tokio::time::timeout(self.config.io_timeout, exchange)
            .await
            .map_err(|_| GossipError::Timeout(self.config.io_timeout))??;
        if response.is_ok() {
            Ok(response)
        } else {
            Err(GossipError::Rejected(response.message))
        }
    }
}
