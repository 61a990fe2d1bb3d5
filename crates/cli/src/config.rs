use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use corelib::{NodeId, RingBuilder};
use gossip::ConnectorConfig;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::info;

use crate::commands::{parse_line, CommandResult};
use crate::session::Session;

#[derive(Debug, Parser, Clone)]
#[command(name = "chord", about = "Interactive shell for an in-process Chord ring.")]
pub struct CliConfig {
    /// Identifier width m; the ring holds at most 2^m nodes.
    #[arg(long, env = "CHORD_BITS", default_value_t = 5)]
    pub bits: u32,

    /// Node that founds the ring at start-up.
    #[arg(long, env = "CHORD_SEED_NODE")]
    pub seed_node: Option<u64>,

    /// Gossip listeners bind base_port + node id.
    #[arg(long, env = "CHORD_BASE_PORT", default_value_t = 5000)]
    pub base_port: u16,

    /// Read commands from this file instead of stdin.
    #[arg(long, env = "CHORD_SCRIPT")]
    pub script: Option<PathBuf>,
}

impl CliConfig {
    pub fn session(&self) -> Result<Session> {
        let ring = RingBuilder::new()
            .with_bits(self.bits)
            .build()
            .context("invalid ring configuration")?;
        let gossip = ConnectorConfig::default().with_base_port(self.base_port);
        let session = Session::new(Arc::new(ring), gossip);

        if let Some(seed) = self.seed_node {
            session
                .ring()
                .create_node(NodeId(seed))
                .and_then(|node| node.join(NodeId(seed)))
                .with_context(|| format!("failed to found ring at node {}", seed))?;
        }
        Ok(session)
    }

    pub async fn run(self) -> Result<()> {
        let mut session = self.session()?;
        info!(bits = self.bits, seed = ?self.seed_node, "shell started");

        let mut stdout = tokio::io::stdout();
        match &self.script {
            Some(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("failed to open script {}", path.display()))?;
                drive(&mut session, BufReader::new(file), &mut stdout, false).await
            }
            None => drive(&mut session, BufReader::new(tokio::io::stdin()), &mut stdout, true).await,
        }
    }
}

/// Execute one command per input line until EOF or `exit`.
pub async fn drive<R, W>(session: &mut Session, input: R, output: &mut W, prompt: bool) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        if prompt {
            output.write_all(b"chord> ").await?;
            output.flush().await?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let reply = match parse_line(&line) {
            Ok(None) => continue,
            Ok(Some(command)) => match session.execute(command).await {
                Ok(CommandResult::Exit) => break,
                Ok(result) => result.to_string(),
                Err(e) => format!("error: {:#}", e),
            },
            Err(e) => e.to_string(),
        };
        output.write_all(reply.trim_end().as_bytes()).await?;
        output.write_all(b"\n").await?;
    }
    session.shutdown().await;
    output.flush().await?;
    Ok(())
}
