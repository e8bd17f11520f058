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

//! Meshreplay CLI
//!
//! Replays a trace corpus against a running topology and reports the
//! achieved rate and drain outcome.

use anyhow::{Context, Result};
use clap::Parser;
use meshreplay_cli::{
    load_node_list, Corpus, DispatchReport, Dispatcher, DispatcherConfig, DrainConfig,
    StatusPoller,
};
use meshreplay_core::PeerDirectory;
use meshreplay_telemetry::{init_tracing, LogFormat, SinkConfig, TelemetrySink};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "meshreplay")]
#[command(about = "Meshreplay - replay trace corpora against a node topology", long_about = None)]
struct Cli {
    /// Trace corpus (JSON object of trace id -> packet)
    #[arg(long, env = "MESHREPLAY_CORPUS")]
    corpus: PathBuf,

    /// Target injection rate (packets per second)
    #[arg(long, env = "MESHREPLAY_RATE", default_value = "50")]
    rate: f64,

    /// Concurrent send workers
    #[arg(long, env = "MESHREPLAY_WORKERS", default_value = "20")]
    workers: usize,

    /// JSON array of node ids to poll (default: derived from the corpus)
    #[arg(long)]
    nodes_file: Option<PathBuf>,

    /// Telemetry directory
    #[arg(long, env = "MESHREPLAY_LOG_DIR", default_value = "./logs")]
    log_dir: PathBuf,

    /// Timeout of one packet submission
    #[arg(long, default_value = "10")]
    send_timeout_secs: u64,

    /// Delay between status polls of a busy node
    #[arg(long, default_value = "500")]
    poll_interval_ms: u64,

    /// Consecutive failed polls before a node is reported unreachable
    #[arg(long, default_value = "3")]
    max_poll_failures: u32,

    /// Port of service-logic nodes
    #[arg(long, env = "MESHREPLAY_PEER_PORT", default_value = "5000")]
    peer_port: u16,

    /// Node address override, `node=host:port` (repeatable)
    #[arg(long = "peer", value_parser = parse_peer)]
    peers: Vec<(String, String)>,

    /// Stop after injection without polling the nodes
    #[arg(long)]
    skip_drain: bool,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long)]
    json: bool,
}

fn parse_peer(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((node, addr)) if !node.is_empty() && !addr.is_empty() => {
            Ok((node.to_string(), addr.to_string()))
        }
        _ => Err(format!("expected node=host:port, got '{raw}'")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        "meshreplay_cli=debug"
    } else {
        "meshreplay_cli=info"
    };
    let format = std::env::var("MESHREPLAY_LOG_FORMAT")
        .map(|v| LogFormat::from_env_value(&v))
        .unwrap_or_default();
    init_tracing(filter, format);

    let corpus = Corpus::load(&cli.corpus).context("Failed to load corpus")?;
    info!(
        packets = corpus.len(),
        skipped = corpus.skipped(),
        "Loaded corpus from {:?}",
        cli.corpus
    );

    let mut peers = PeerDirectory {
        service_port: cli.peer_port,
        ..PeerDirectory::default()
    };
    for (node, addr) in cli.peers {
        peers.overrides.insert(node, addr);
    }

    let telemetry = TelemetrySink::spawn(SinkConfig::new(&cli.log_dir));
    let config = DispatcherConfig {
        rate: cli.rate,
        workers: cli.workers,
        send_timeout: Duration::from_secs(cli.send_timeout_secs),
    };
    let dispatcher = Dispatcher::new(config, peers.clone(), telemetry.clone())?;
    let stats = dispatcher.run(&corpus).await?;

    let drain = if cli.skip_drain {
        vec![]
    } else {
        let nodes = match &cli.nodes_file {
            Some(path) => load_node_list(path)?,
            None => corpus.service_nodes(),
        };
        let poller = StatusPoller::new(
            peers,
            DrainConfig {
                poll_interval: Duration::from_millis(cli.poll_interval_ms),
                max_poll_failures: cli.max_poll_failures,
                request_timeout: Duration::from_secs(cli.send_timeout_secs),
            },
        )?;
        poller.drain_all(&nodes).await
    };

    telemetry.flush().await;

    let report = DispatchReport::new(&stats, corpus.skipped(), cli.rate, drain);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }

    Ok(())
}
