//! Broadcast layer for a Chord ring.
//!
//! This crate provides the wire protocol and the per-node connector for:
//! - Exchanging peer addresses
//! - Forwarding broadcasts around the successor ring
//! - Suppressing duplicates with a seen-message set

pub mod codec;
pub mod config;
pub mod connector;
pub mod error;
pub mod protocol;

pub use config::ConnectorConfig;
pub use connector::{Connector, Delivery};
pub use error::{GossipError, Result};
pub use protocol::{Message, Response};
