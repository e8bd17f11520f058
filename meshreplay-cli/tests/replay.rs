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

//! Dispatcher against a live in-process topology.

use meshreplay_cli::{
    Corpus, DispatchReport, Dispatcher, DispatcherConfig, DrainConfig, DrainOutcome,
    StatusPoller, DISPATCHER_NODE_ID,
};
use meshreplay_core::{Backend, NodeId, PeerDirectory};
use meshreplay_server::{api::AppState, build_state_with, config::NodeConfig, serve};
use meshreplay_storage::{MemoryConnector, StorageConnector};
use meshreplay_telemetry::{SinkConfig, TelemetrySink};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

async fn spawn_nodes(
    ids: &[&str],
    connector: Arc<MemoryConnector>,
    log_dir: &Path,
) -> (PeerDirectory, HashMap<String, AppState>) {
    let mut peers = PeerDirectory::default();
    let mut listeners = Vec::new();
    for id in ids {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        peers = peers.with_override(*id, listener.local_addr().unwrap().to_string());
        listeners.push((id.to_string(), listener));
    }

    let mut states = HashMap::new();
    for (id, listener) in listeners {
        let mut config = NodeConfig::default();
        config.node.id = Some(id.clone());
        config.node.latency_table_ms = Some(vec![0, 1, 2]);
        config.peers = peers.clone();

        let storage: Arc<dyn StorageConnector> = connector.clone();
        let sink = TelemetrySink::spawn(SinkConfig::new(log_dir));
        let state = build_state_with(&config, storage, sink).unwrap();
        tokio::spawn(serve(listener, state.clone()));
        states.insert(id, state);
    }
    (peers, states)
}

fn corpus_of(n: usize) -> Corpus {
    let entries: Vec<String> = (0..n)
        .map(|i| {
            format!(
                r#""t{i}": {{"tid":"t{i}","initial_node":"A","initial_node_type":"Python",
                    "node_calls_dict":{{"A":[["B",-1,0],["r1",0,1]]}},
                    "data_ops_dict":{{"0":{{"op_type":"write","op_obj_id":"k{i}","db":"Redis"}}}},
                    "logger_nodes":["B"]}}"#
            )
        })
        .collect();
    Corpus::from_slice(format!("{{{}}}", entries.join(",")).as_bytes()).unwrap()
}

fn fast_drain() -> DrainConfig {
    DrainConfig {
        poll_interval: Duration::from_millis(20),
        max_poll_failures: 3,
        request_timeout: Duration::from_secs(2),
    }
}

#[tokio::test]
async fn test_replay_respects_rate_and_drains() {
    let dir = tempfile::tempdir().unwrap();
    let connector = Arc::new(MemoryConnector::new());
    let (peers, states) = spawn_nodes(&["A", "B"], connector.clone(), dir.path()).await;

    let corpus = corpus_of(5);
    let telemetry = TelemetrySink::spawn(SinkConfig::new(dir.path()));
    let config = DispatcherConfig {
        rate: 50.0,
        workers: 4,
        send_timeout: Duration::from_secs(5),
    };
    let dispatcher = Dispatcher::new(config, peers.clone(), telemetry.clone()).unwrap();

    let stats = dispatcher.run(&corpus).await.unwrap();
    assert_eq!(stats.submitted, 5);
    assert_eq!(stats.send_failures, 0);
    // (N - 1) / R
    assert!(stats.runtime >= Duration::from_millis(80));

    let poller = StatusPoller::new(peers, fast_drain()).unwrap();
    let drain = poller.drain_all(&corpus.service_nodes()).await;
    let report = DispatchReport::new(&stats, corpus.skipped(), 50.0, drain);
    assert_eq!(report.drain.len(), 2);
    assert!(report.all_drained());

    for state in states.values() {
        assert_eq!(state.router.liveness().in_flight(), 0);
    }
    // async writes finish before their hop releases the node
    for i in 0..5 {
        assert!(connector.get(Backend::Redis, "r1", &format!("k{i}")).is_some());
    }

    telemetry.flush().await;
    states["B"].router.telemetry().flush().await;
    let dispatched = std::fs::read_to_string(
        TelemetrySink::stream_path(dir.path(), DISPATCHER_NODE_ID),
    )
    .unwrap();
    assert_eq!(dispatched.lines().count(), 5);
    assert!(dispatched.lines().all(|l| l.ends_with(",Dispatch,A")));

    let leaves = std::fs::read_to_string(TelemetrySink::stream_path(dir.path(), "B")).unwrap();
    assert_eq!(leaves.lines().count(), 5);
}

#[tokio::test]
async fn test_unreachable_entry_node_is_counted_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let peers = PeerDirectory::default().with_override("A", "127.0.0.1:9");
    let telemetry = TelemetrySink::spawn(SinkConfig::new(dir.path()));
    let config = DispatcherConfig {
        rate: 100.0,
        workers: 2,
        send_timeout: Duration::from_secs(2),
    };
    let dispatcher = Dispatcher::new(config, peers, telemetry).unwrap();

    let stats = dispatcher.run(&corpus_of(3)).await.unwrap();
    assert_eq!(stats.submitted, 3);
    assert_eq!(stats.send_failures, 3);
}

#[tokio::test]
async fn test_drain_waits_for_busy_node() {
    let dir = tempfile::tempdir().unwrap();
    let (peers, states) =
        spawn_nodes(&["A"], Arc::new(MemoryConnector::new()), dir.path()).await;

    let held = states["A"].router.liveness().acquire();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(held);
    });

    let poller = StatusPoller::new(peers, fast_drain()).unwrap();
    let started = Instant::now();
    let result = poller.wait_for_node(&NodeId::from("A")).await;

    assert!(started.elapsed() >= Duration::from_millis(150));
    match result.outcome {
        DrainOutcome::Drained { polls } => assert!(polls > 1),
        other => panic!("expected drained, got {other:?}"),
    }
}
