//! Wire messages.
//!
//! One JSON object per connection in each direction. Requests are tagged by
//! `type`:
//!
//! ```json
//! {"type":"broadcast","message":"hi","originator_id":1,"message_id":"1_01H..."}
//! {"type":"peer_info","node_id":14,"host":"127.0.0.1","port":5014}
//! ```

use corelib::NodeId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Broadcast {
        message: String,
        originator_id: NodeId,
        message_id: String,
    },
    PeerInfo {
        node_id: NodeId,
        host: String,
        port: u16,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Error,
}

/// Reply to every request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    pub message: String,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}
