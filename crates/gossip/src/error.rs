use corelib::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GossipError>;

#[derive(Debug, Error)]
pub enum GossipError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message: {0}")]
    Codec(#[from] serde_json::Error),

    /// Peer sent more than the configured frame limit.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("no address known for node {0}")]
    UnknownPeer(NodeId),

    #[error("port for node {0} does not fit in 16 bits")]
    PortOutOfRange(NodeId),

    #[error("peer did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("peer rejected message: {0}")]
    Rejected(String),

    #[error(transparent)]
    Ring(#[from] corelib::Error),
}
