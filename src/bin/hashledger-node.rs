#![forbid(unsafe_code)]
//! HashLedger node: P2P replication plus the HTTP control surface.

use clap::Parser;
use hashledger::config::{read_config_from, DEFAULT_CONFIG_PATH};
use hashledger::node::Node;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "hashledger-node", version, about = "Run a HashLedger node")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// HTTP control surface port (overrides config)
    #[arg(long)]
    http_port: Option<u16>,

    /// P2P WebSocket port (overrides config)
    #[arg(long)]
    p2p_port: Option<u16>,

    /// Peer to dial at startup, e.g. ws://127.0.0.1:6001 (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Validated once by Node::init, after the overrides.
    let mut config = read_config_from(&args.config)?;
    config.apply_overrides(args.http_port, args.p2p_port, args.peers);

    let node = Arc::new(Node::init(config)?);
    node.start().await?;
    Ok(())
}
