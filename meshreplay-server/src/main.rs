// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Result;
use clap::Parser;
use meshreplay_server::{config::NodeConfig, run_server};
use meshreplay_storage::DriverKind;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Meshreplay service-logic node", long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, env = "MESHREPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Node identity (overrides CONTAINER_NAME)
    #[arg(long)]
    node_id: Option<String>,

    /// HTTP listen address (overrides config file)
    #[arg(long)]
    http_addr: Option<String>,

    /// Telemetry directory (overrides config file)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Use the in-process storage backend instead of real databases
    #[arg(long)]
    memory_storage: bool,

    /// Peer address override, `node=host:port` (repeatable)
    #[arg(long = "peer", value_parser = parse_peer)]
    peers: Vec<(String, String)>,
}

fn parse_peer(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((node, addr)) if !node.is_empty() && !addr.is_empty() => {
            Ok((node.to_string(), addr.to_string()))
        }
        _ => Err(format!("expected node=host:port, got '{raw}'")),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = NodeConfig::load(args.config)?;

    // Apply CLI overrides
    if let Some(id) = args.node_id {
        config.node.id = Some(id);
    }
    if let Some(addr) = args.http_addr {
        config.server.listen_addr = addr;
    }
    if let Some(log_dir) = args.log_dir {
        config.telemetry.log_dir = log_dir;
    }
    if args.memory_storage {
        config.storage.driver = DriverKind::Memory;
    }
    for (node, addr) in args.peers {
        config.peers.overrides.insert(node, addr);
    }

    // Run server
    run_server(config).await
}
