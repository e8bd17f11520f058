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

//! In-process topology of real HTTP nodes sharing one in-memory storage.

#![allow(dead_code)]

use axum::{body::Bytes, extract::State, routing::post};
use meshreplay_core::PeerDirectory;
use meshreplay_server::{api::AppState, build_state_with, config::NodeConfig, serve};
use meshreplay_storage::{MemoryConnector, StorageConnector};
use meshreplay_telemetry::{SinkConfig, TelemetrySink};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub struct TestNode {
    pub addr: SocketAddr,
    pub state: AppState,
}

pub struct Topology {
    pub nodes: HashMap<String, TestNode>,
    pub connector: Arc<MemoryConnector>,
    pub log_dir: TempDir,
    pub http: reqwest::Client,
}

/// Peer that records every packet body it is sent and answers "ok".
pub struct CaptureStub {
    pub id: String,
    pub addr: SocketAddr,
    pub bodies: Arc<Mutex<Vec<Bytes>>>,
}

impl CaptureStub {
    pub async fn spawn(id: &str) -> Self {
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let app = axum::Router::new()
            .route(
                "/",
                post(
                    |State(bodies): State<Arc<Mutex<Vec<Bytes>>>>, body: Bytes| async move {
                        bodies.lock().unwrap().push(body);
                        "ok"
                    },
                ),
            )
            .with_state(bodies.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            id: id.to_string(),
            addr,
            bodies,
        }
    }

    pub fn received(&self) -> Vec<Bytes> {
        self.bodies.lock().unwrap().clone()
    }
}

pub async fn spawn_topology(ids: &[&str], connector: Arc<MemoryConnector>) -> Topology {
    spawn_topology_with(ids, connector, &[]).await
}

/// Like [`spawn_topology`], with `stubs` reachable as peers by their ids.
pub async fn spawn_topology_with(
    ids: &[&str],
    connector: Arc<MemoryConnector>,
    stubs: &[&CaptureStub],
) -> Topology {
    let log_dir = tempfile::tempdir().unwrap();

    // Bind first so every node can be given every peer's address.
    let mut listeners = Vec::new();
    let mut peers = PeerDirectory::default();
    for stub in stubs {
        peers = peers.with_override(stub.id.as_str(), stub.addr.to_string());
    }
    for id in ids {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        peers = peers.with_override(*id, addr.to_string());
        listeners.push((id.to_string(), addr, listener));
    }

    let mut nodes = HashMap::new();
    for (id, addr, listener) in listeners {
        let mut config = NodeConfig::default();
        config.node.id = Some(id.clone());
        config.node.latency_table_ms = Some(vec![0, 1, 2]);
        config.server.request_timeout_secs = 5;
        config.peers = peers.clone();
        config.telemetry.log_dir = log_dir.path().to_path_buf();

        let sink = TelemetrySink::spawn(SinkConfig::new(log_dir.path()));
        let storage: Arc<dyn StorageConnector> = connector.clone();
        let state = build_state_with(&config, storage, sink).unwrap();

        tokio::spawn(serve(listener, state.clone()));
        nodes.insert(id, TestNode { addr, state });
    }

    Topology {
        nodes,
        connector,
        log_dir,
        http: reqwest::Client::new(),
    }
}

impl Topology {
    pub fn node(&self, id: &str) -> &TestNode {
        &self.nodes[id]
    }

    pub fn in_flight(&self, id: &str) -> u64 {
        self.node(id).state.router.liveness().in_flight()
    }

    pub async fn post_packet(&self, id: &str, body: &str) -> reqwest::Response {
        self.http
            .post(format!("http://{}/", self.node(id).addr))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .unwrap()
    }

    pub async fn status(&self, id: &str) -> String {
        self.http
            .get(format!("http://{}/status", self.node(id).addr))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap()
    }

    /// Wait until one full pass sees every node idle, then flush telemetry.
    pub async fn wait_drained(&self) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            if self.nodes.keys().all(|id| self.in_flight(id) == 0) {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "topology never drained"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        for node in self.nodes.values() {
            node.state.router.telemetry().flush().await;
        }
    }

    /// Telemetry rows written by `id`, in file order.
    pub fn events(&self, id: &str) -> Vec<String> {
        let path = TelemetrySink::stream_path(self.log_dir.path(), id);
        match std::fs::read_to_string(path) {
            Ok(content) => content.lines().map(str::to_string).collect(),
            Err(_) => vec![],
        }
    }
}
