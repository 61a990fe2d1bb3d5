//! Clock-stamped operation envelopes.

use std::fmt;

use corelib::NodeId;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Put,
    Get,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Put => f.write_str("PUT"),
            Operation::Get => f.write_str("GET"),
        }
    }
}

/// One operation as issued by `sender_id` at logical time `timestamp`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub timestamp: u64,
    pub sender_id: NodeId,
    pub operation: Operation,
}

impl Envelope {
    pub fn put(key: &str, value: &str, timestamp: u64, sender_id: NodeId) -> Self {
        Self {
            key: key.to_string(),
            value: Some(value.to_string()),
            timestamp,
            sender_id,
            operation: Operation::Put,
        }
    }

    pub fn get(key: &str, timestamp: u64, sender_id: NodeId) -> Self {
        Self {
            key: key.to_string(),
            value: None,
            timestamp,
            sender_id,
            operation: Operation::Get,
        }
    }

    /// Total order over envelopes: logical time, then sender.
    pub fn order_key(&self) -> (u64, NodeId) {
        (self.timestamp, self.sender_id)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>9} | {:>4} | {:<9} | {} | {}",
            self.timestamp,
            self.sender_id,
            self.operation,
            self.key,
            self.value.as_deref().unwrap_or("-")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let envelope = Envelope::put("key1", "value1", 4, NodeId(2));
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["operation"], "PUT");
        assert_eq!(json["sender_id"], 2);
        assert_eq!(json["timestamp"], 4);

        let get = serde_json::to_value(Envelope::get("key1", 5, NodeId(3))).unwrap();
        assert!(get.get("value").is_none());
    }

    #[test]
    fn test_display_row() {
        let row = Envelope::get("key2", 12, NodeId(7)).to_string();
        assert!(row.contains("GET"));
        assert!(row.ends_with("key2 | -"));
    }
}
