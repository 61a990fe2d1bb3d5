//! Shell commands and their rendered results.

use std::fmt;
use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use corelib::ring::{KeyLocation, NodeInfo, NodeSummary};
use corelib::{FingerEntry, Identifier, NodeId};
use gossip::Delivery;
use timestamp::Envelope;

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Create node ID and join it through VIA (or the bootstrap node).
    Join {
        id: u64,
        #[arg(long)]
        via: Option<u64>,
    },
    /// Join a node with a random free id.
    JoinRandom,
    /// Remove a node; its keys move to its successor.
    Leave { id: u64 },
    /// Store a key, asked of VIA (or the bootstrap node).
    Insert {
        key: String,
        value: String,
        #[arg(long)]
        via: Option<u64>,
    },
    /// Read a key, asked of VIA (or the bootstrap node).
    Get {
        key: String,
        #[arg(long)]
        via: Option<u64>,
    },
    /// Show the hash of a key and the node owning it.
    Owner { key: String },
    /// List live nodes.
    Nodes,
    /// Show one node's links, leader and stored entries.
    Info {
        id: u64,
        #[arg(long)]
        json: bool,
    },
    /// Print a node's finger table.
    Fingers { id: u64 },
    /// Run a leader election started at ID.
    Elect { id: u64 },
    /// Check ring invariants.
    Verify,
    /// Show the timestamped operations issued by a node.
    Events { id: u64 },
    /// Start the gossip listener for a node.
    Listen { id: u64 },
    /// Broadcast a message from a listening node.
    Broadcast {
        id: u64,
        #[arg(required = true, trailing_var_arg = true)]
        message: Vec<String>,
    },
    /// Show broadcasts delivered to a node.
    History { id: u64 },
    /// Forget the message ids a node has seen.
    ResetBroadcasts { id: u64 },
    /// Leave the shell.
    #[command(alias = "quit")]
    Exit,
}

#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_help_flag = true)]
struct Line {
    #[command(subcommand)]
    command: Command,
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>, clap::Error> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    Line::try_parse_from(line.split_whitespace()).map(|l| Some(l.command))
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Joined {
        id: NodeId,
        via: NodeId,
    },
    Left {
        id: NodeId,
        successor: Option<NodeId>,
        keys: usize,
    },
    Stored {
        key: String,
        node: NodeId,
        timestamp: u64,
    },
    Found {
        key: String,
        value: Option<String>,
        node: NodeId,
    },
    Owner(KeyLocation),
    Nodes(Vec<NodeSummary>),
    Info(NodeInfo),
    InfoJson(String),
    Fingers {
        id: NodeId,
        rows: Vec<FingerEntry>,
    },
    Leader(NodeId),
    Verified {
        nodes: usize,
        stale_fingers: usize,
    },
    Events {
        id: NodeId,
        events: Vec<Envelope>,
    },
    Listening {
        id: NodeId,
        addr: SocketAddr,
        peers: usize,
    },
    Broadcast {
        message_id: String,
    },
    History {
        id: NodeId,
        deliveries: Vec<Delivery>,
    },
    BroadcastsReset(NodeId),
    Exit,
}

fn or_dash(node: Option<NodeId>) -> String {
    node.map_or_else(|| "-".to_string(), |n| n.to_string())
}

/// One row per finger: `N{id} + 2^i | N{node}`.
pub fn render_fingers(id: NodeId, rows: &[FingerEntry]) -> String {
    let width = rows
        .iter()
        .map(|r| format!("N{} + 2^{}", id, r.index).len())
        .max()
        .unwrap_or(0);
    rows.iter()
        .map(|r| {
            format!(
                "{:<width$} | N{}  (start {})",
                format!("N{} + 2^{}", id, r.index),
                r.node,
                r.start,
                width = width
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_hash(hash: Identifier) -> String {
    format!("#{}", hash)
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandResult::Joined { id, via } if id == via => {
                write!(f, "node {} founded the ring", id)
            }
            CommandResult::Joined { id, via } => write!(f, "node {} joined via {}", id, via),
            CommandResult::Left { id, successor, keys } => write!(
                f,
                "node {} left, {} keys handed to {}",
                id,
                keys,
                or_dash(*successor)
            ),
            CommandResult::Stored { key, node, timestamp } => {
                write!(f, "stored {:?} on node {} at t={}", key, node, timestamp)
            }
            CommandResult::Found { key, value: Some(value), node } => {
                write!(f, "{} = {:?} (node {})", key, value, node)
            }
            CommandResult::Found { key, value: None, node } => {
                write!(f, "{} not found (owner {})", key, node)
            }
            CommandResult::Owner(location) => write!(
                f,
                "{} -> {} owned by node {}",
                location.key,
                render_hash(location.hash),
                location.node
            ),
            CommandResult::Nodes(nodes) if nodes.is_empty() => write!(f, "no nodes"),
            CommandResult::Nodes(nodes) => {
                writeln!(f, "{:>6} {:>6} {:>6} {:>6}", "id", "succ", "pred", "keys")?;
                for n in nodes {
                    writeln!(
                        f,
                        "{:>6} {:>6} {:>6} {:>6}",
                        n.id.to_string(),
                        or_dash(n.successor),
                        or_dash(n.predecessor),
                        n.key_count
                    )?;
                }
                Ok(())
            }
            CommandResult::Info(info) => {
                writeln!(f, "node {}", info.id)?;
                writeln!(f, "  successor:   {}", or_dash(info.successor))?;
                writeln!(f, "  predecessor: {}", or_dash(info.predecessor))?;
                writeln!(f, "  leader:      {}", or_dash(info.leader))?;
                writeln!(f, "  entries:     {}", info.entries.len())?;
                for entry in &info.entries {
                    writeln!(f, "    {} {} = {:?}", render_hash(entry.hash), entry.key, entry.value)?;
                }
                Ok(())
            }
            CommandResult::InfoJson(json) => f.write_str(json),
            CommandResult::Fingers { id, rows } => f.write_str(&render_fingers(*id, rows)),
            CommandResult::Leader(leader) => write!(f, "leader is node {}", leader),
            CommandResult::Verified { nodes, stale_fingers } => write!(
                f,
                "ring of {} nodes is consistent ({} stale fingers)",
                nodes, stale_fingers
            ),
            CommandResult::Events { id, events } => {
                writeln!(f, "events of node {}", id)?;
                writeln!(f, "Timestamp | Node | Operation | Key | Value")?;
                writeln!(f, "{}", "-".repeat(50))?;
                for event in events {
                    writeln!(f, "{}", event)?;
                }
                Ok(())
            }
            CommandResult::Listening { id, addr, peers } => {
                write!(f, "node {} listening on {} ({} peers)", id, addr, peers)
            }
            CommandResult::Broadcast { message_id } => write!(f, "broadcast {}", message_id),
            CommandResult::History { id, deliveries } => {
                writeln!(f, "broadcasts delivered to node {}", id)?;
                for d in deliveries {
                    writeln!(f, "  [{}] from {}: {}", d.message_id, d.originator_id, d.message)?;
                }
                Ok(())
            }
            CommandResult::BroadcastsReset(id) => write!(f, "broadcast history of node {} cleared", id),
            CommandResult::Exit => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_line("join 14 --via 1").unwrap(),
            Some(Command::Join { id: 14, via: Some(1) })
        );
        assert_eq!(parse_line("join-random").unwrap(), Some(Command::JoinRandom));
        assert_eq!(
            parse_line("insert apple red").unwrap(),
            Some(Command::Insert {
                key: "apple".to_string(),
                value: "red".to_string(),
                via: None
            })
        );
        assert_eq!(
            parse_line("reset-broadcasts 3").unwrap(),
            Some(Command::ResetBroadcasts { id: 3 })
        );
        assert_eq!(parse_line("quit").unwrap(), Some(Command::Exit));
    }

    #[test]
    fn test_parse_broadcast_message_words() {
        assert_eq!(
            parse_line("broadcast 1 hello there ring").unwrap(),
            Some(Command::Broadcast {
                id: 1,
                message: vec!["hello".into(), "there".into(), "ring".into()],
            })
        );
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# setup").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_line("join").is_err());
        assert!(parse_line("fly 3").is_err());
        assert!(parse_line("leave abc").is_err());
    }

    #[test]
    fn test_finger_grid() {
        let rows = vec![
            FingerEntry { index: 0, start: 28, node: NodeId(1) },
            FingerEntry { index: 4, start: 11, node: NodeId(14) },
        ];
        let grid = render_fingers(NodeId(27), &rows);
        let lines: Vec<&str> = grid.lines().collect();
        assert_eq!(lines[0], "N27 + 2^0 | N1  (start 28)");
        assert_eq!(lines[1], "N27 + 2^4 | N14  (start 11)");
    }
}
