//! Connector configuration.

use std::time::Duration;

use corelib::NodeId;

use crate::error::{GossipError, Result};

#[derive(Clone, Debug)]
pub struct ConnectorConfig {
    /// Interface to bind and to advertise to peers.
    pub host: String,
    /// Listener port is `base_port + node id`; 0 binds an ephemeral port.
    pub base_port: u16,
    /// Largest message accepted from a peer.
    pub max_frame_bytes: usize,
    /// Bound on a single request/response exchange with a peer.
    pub io_timeout: Duration,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            base_port: 5000,
            max_frame_bytes: 64 * 1024,
            io_timeout: Duration::from_secs(5),
        }
    }
}

impl ConnectorConfig {
    pub fn with_base_port(mut self, base_port: u16) -> Self {
        self.base_port = base_port;
        self
    }

    /// Port the listener for `node` binds.
    pub fn port_for(&self, node: NodeId) -> Result<u16> {
        if self.base_port == 0 {
            return Ok(0);
        }
        u64::from(self.base_port)
            .checked_add(node.get())
            .and_then(|p| u16::try_from(p).ok())
            .ok_or(GossipError::PortOutOfRange(node))
    }
}
