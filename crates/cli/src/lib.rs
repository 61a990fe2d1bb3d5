//! Operator shell for an in-process Chord ring.
//!
//! Provides commands for:
//! - Joining and removing nodes
//! - Storing and reading keys
//! - Inspecting ring state and finger tables
//! - Running leader elections
//! - Broadcasting over the gossip layer

pub mod commands;
pub mod config;
pub mod session;
pub mod telemetry;

pub use commands::{parse_line, Command, CommandResult};
pub use config::CliConfig;
pub use session::Session;
