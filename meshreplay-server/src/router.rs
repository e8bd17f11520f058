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

//! Service-Logic Node Router
//!
//! Executes one hop of a trace packet's call graph on this node.
//!
//! ## Request lifecycle
//!
//! ```text
//! POST / ──► accept(packet, body) ──► LivenessTracker::acquire ──► spawn(process) ──► "ok"
//!                                                        │
//!      sleep(self-cost) ──► Leaf event (terminal) ──► for edge in node_calls_dict[self]
//!                                                        ├─ data, sync:     await shim
//!                                                        ├─ data, async:    spawn shim
//!                                                        ├─ service, sync:  await peer
//!                                                        └─ service, async: spawn peer
//! ```
//!
//! Every detached edge holds a clone of the packet's liveness guard, so the
//! node's in-flight count drops only after the whole hop has finished.
//! Edge failures are logged and recorded; the remaining edges still run.
//! Service edges forward the body exactly as it arrived, including fields
//! [`TracePacket`] does not model.

use bytes::Bytes;
use meshreplay_core::{
    synthetic_value, Backend, CallEdge, CallMode, DataOperation, LatencyDistribution, NodeId, OpRef,
    ReplayError, TelemetryEvent, TelemetryEventKind, TracePacket,
};
use meshreplay_storage::{OpOutcome, ShimLayer};
use meshreplay_telemetry::TelemetrySink;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::liveness::{LivenessGuard, LivenessTracker};
use crate::peer_client::PeerClient;

#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Raw bytes per synthetic value unless the operation carries a size
    pub payload_bytes: usize,
    /// Record a Sync/Async event per data operation
    pub record_data_ops: bool,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            payload_bytes: meshreplay_core::DEFAULT_PAYLOAD_BYTES,
            record_data_ops: true,
        }
    }
}

pub struct NodeRouter {
    node_id: NodeId,
    self_cost: LatencyDistribution,
    shim: Arc<ShimLayer>,
    peers: PeerClient,
    telemetry: TelemetrySink,
    liveness: LivenessTracker,
    settings: RouterSettings,
}

impl NodeRouter {
    pub fn new(
        node_id: NodeId,
        self_cost: LatencyDistribution,
        shim: Arc<ShimLayer>,
        peers: PeerClient,
        telemetry: TelemetrySink,
        settings: RouterSettings,
    ) -> Self {
        Self {
            node_id,
            self_cost,
            shim,
            peers,
            telemetry,
            liveness: LivenessTracker::new(),
            settings,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn liveness(&self) -> &LivenessTracker {
        &self.liveness
    }

    pub fn shim(&self) -> &ShimLayer {
        &self.shim
    }

    pub fn telemetry(&self) -> &TelemetrySink {
        &self.telemetry
    }

    /// Take ownership of a validated packet and process it in the
    /// background. Returns as soon as the packet is counted as in flight.
    ///
    /// `body` is the document `packet` was decoded from; it is what service
    /// edges forward.
    pub fn accept(self: &Arc<Self>, packet: TracePacket, body: Bytes) {
        let guard = self.liveness.acquire();
        let router = Arc::clone(self);
        let packet = Arc::new(packet);

        tokio::spawn(async move {
            if let Err(e) = router.process(Arc::clone(&packet), body, guard).await {
                warn!(
                    tid = %packet.trace_id,
                    node = %router.node_id,
                    error = %e,
                    "packet aborted"
                );
            }
        });
    }

    async fn process(
        self: &Arc<Self>,
        packet: Arc<TracePacket>,
        body: Bytes,
        guard: Arc<LivenessGuard>,
    ) -> Result<(), ReplayError> {
        tokio::time::sleep(self.self_cost.sample()).await;

        let terminal = packet.is_terminal(self.node_id.as_str());
        if terminal {
            self.record(&packet.trace_id, TelemetryEventKind::Leaf, "");
        }

        let edges = match packet.edges_for(self.node_id.as_str()) {
            Some(edges) => edges,
            None if terminal => return Ok(()),
            None => {
                return Err(ReplayError::malformed(format!(
                    "node_calls_dict has no entry for {}",
                    self.node_id
                )))
            }
        };

        for edge in edges {
            match edge.op_ref {
                OpRef::Data(id) => {
                    let Some(op) = packet.data_op(id) else {
                        let e = ReplayError::malformed(format!("missing data op {id}"));
                        self.edge_failed(&packet.trace_id, &edge.target, &e);
                        continue;
                    };
                    self.data_edge(&packet, edge, op.clone(), &guard).await;
                }
                OpRef::Service => {
                    self.service_edge(&packet, edge, body.clone(), &guard).await;
                }
            }
        }

        debug!(
            tid = %packet.trace_id,
            node = %self.node_id,
            edges = edges.len(),
            "hop dispatched"
        );
        Ok(())
    }

    async fn data_edge(
        self: &Arc<Self>,
        packet: &Arc<TracePacket>,
        edge: &CallEdge,
        op: DataOperation,
        guard: &Arc<LivenessGuard>,
    ) {
        let backend = op.backend;
        match edge.mode {
            CallMode::Sync => match self.run_data_op(&edge.target, &op).await {
                Ok(_) => self.record_data_op(&packet.trace_id, TelemetryEventKind::Sync, backend),
                Err(e) => self.edge_failed(&packet.trace_id, &edge.target, &e),
            },
            CallMode::Async => {
                let router = Arc::clone(self);
                let guard = Arc::clone(guard);
                let tid = packet.trace_id.clone();
                let target = edge.target.clone();

                tokio::spawn(async move {
                    let _guard = guard;
                    if let Err(e) = router.run_data_op(&target, &op).await {
                        router.edge_failed(&tid, &target, &e);
                    }
                });
                self.record_data_op(&packet.trace_id, TelemetryEventKind::Async, backend);
            }
        }
    }

    async fn service_edge(
        self: &Arc<Self>,
        packet: &Arc<TracePacket>,
        edge: &CallEdge,
        body: Bytes,
        guard: &Arc<LivenessGuard>,
    ) {
        match edge.mode {
            CallMode::Sync => {
                if let Err(e) = self.peers.forward(&edge.target, body).await {
                    self.edge_failed(&packet.trace_id, &edge.target, &e);
                }
            }
            CallMode::Async => {
                let router = Arc::clone(self);
                let guard = Arc::clone(guard);
                let tid = packet.trace_id.clone();
                let target = edge.target.clone();

                tokio::spawn(async move {
                    let _guard = guard;
                    if let Err(e) = router.peers.forward(&target, body).await {
                        router.edge_failed(&tid, &target, &e);
                    }
                });
            }
        }
    }

    async fn run_data_op(
        &self,
        target: &NodeId,
        op: &DataOperation,
    ) -> Result<OpOutcome, ReplayError> {
        // reads carry a fresh value too; document-mode Mongo filters on it
        let value = synthetic_value(op.object_size.unwrap_or(self.settings.payload_bytes));
        let outcome = self
            .shim
            .execute(op.backend, op.op_type, &op.object_key, Some(&value), target)
            .await?;

        if outcome == OpOutcome::NotFound {
            debug!(node = %self.node_id, target = %target, key = %op.object_key, "read found nothing");
        }
        Ok(outcome)
    }

    fn edge_failed(&self, tid: &str, target: &NodeId, error: &ReplayError) {
        if error.is_edge_local() {
            warn!(tid = %tid, node = %self.node_id, target = %target, error = %error, "edge failed");
        } else {
            error!(tid = %tid, node = %self.node_id, target = %target, error = %error, "edge skipped");
        }
        self.record(tid, TelemetryEventKind::Error, format!("{target}: {error}"));
    }

    fn record_data_op(&self, tid: &str, kind: TelemetryEventKind, backend: Backend) {
        if self.settings.record_data_ops {
            self.record(tid, kind, backend.as_str());
        }
    }

    fn record(&self, tid: &str, kind: TelemetryEventKind, message: impl Into<String>) {
        self.telemetry.record(TelemetryEvent::new(
            tid,
            self.node_id.as_str(),
            kind,
            message,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshreplay_core::{OpType, PeerDirectory};
    use meshreplay_storage::{MemoryConnector, StorageConfig};
    use meshreplay_telemetry::SinkConfig;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::time::Duration;

    fn router_for(
        id: &str,
        connector: Arc<MemoryConnector>,
        log_dir: &Path,
    ) -> Arc<NodeRouter> {
        let shim = Arc::new(ShimLayer::new(connector, &StorageConfig::default()));
        let peers = PeerDirectory::default().with_override("down", "127.0.0.1:9");
        Arc::new(NodeRouter::new(
            NodeId::from(id),
            LatencyDistribution::fixed(Duration::from_millis(1)),
            shim,
            PeerClient::new(peers, Duration::from_secs(2)).unwrap(),
            TelemetrySink::spawn(SinkConfig::new(log_dir)),
            RouterSettings::default(),
        ))
    }

    fn packet(node: &str, edges: Vec<CallEdge>, ops: Vec<(u32, DataOperation)>) -> TracePacket {
        let mut node_calls = BTreeMap::new();
        node_calls.insert(NodeId::from(node), edges);
        TracePacket {
            trace_id: "t1".into(),
            entry_node: NodeId::from(node),
            entry_node_kind: meshreplay_core::NodeKind::ServiceLogic,
            node_calls,
            data_ops: ops.into_iter().collect(),
            terminal_nodes: vec![],
        }
    }

    fn submit(router: &Arc<NodeRouter>, packet: TracePacket) {
        let body = Bytes::from(serde_json::to_vec(&packet).unwrap());
        router.accept(packet, body);
    }

    fn write_op(key: &str, backend: Backend) -> DataOperation {
        DataOperation {
            op_type: OpType::Write,
            object_key: key.into(),
            backend,
            object_size: None,
        }
    }

    async fn wait_idle(router: &NodeRouter) {
        for _ in 0..500 {
            if router.liveness().in_flight() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("router never drained");
    }

    #[tokio::test]
    async fn test_terminal_node_records_leaf() {
        let dir = tempfile::tempdir().unwrap();
        let router = router_for("B", Arc::new(MemoryConnector::new()), dir.path());

        let mut p = packet("A", vec![], vec![]);
        p.terminal_nodes = vec![NodeId::from("B")];
        submit(&router, p);
        assert_eq!(router.liveness().in_flight(), 1);

        wait_idle(&router).await;
        router.telemetry().flush().await;

        let log = std::fs::read_to_string(dir.path().join("B_log.csv")).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.starts_with("t1,B,"));
        assert!(log.trim_end().ends_with(",Leaf,"));
    }

    #[tokio::test]
    async fn test_missing_self_entry_releases_counter() {
        let dir = tempfile::tempdir().unwrap();
        let router = router_for("C", Arc::new(MemoryConnector::new()), dir.path());

        submit(&router, packet("A", vec![], vec![]));
        wait_idle(&router).await;
        router.telemetry().flush().await;

        assert!(!dir.path().join("C_log.csv").exists());
    }

    #[tokio::test]
    async fn test_sync_and_async_writes() {
        let dir = tempfile::tempdir().unwrap();
        let connector = Arc::new(MemoryConnector::new());
        let router = router_for("A", connector.clone(), dir.path());

        submit(&router, packet(
            "A",
            vec![
                CallEdge::data("r1", 0, CallMode::Sync),
                CallEdge::data("m1", 1, CallMode::Async),
            ],
            vec![
                (0, write_op("k0", Backend::Redis)),
                (1, write_op("k1", Backend::Mongo)),
            ],
        ));
        wait_idle(&router).await;
        router.telemetry().flush().await;

        assert!(connector.get(Backend::Redis, "r1", "k0").is_some());
        assert!(connector.get(Backend::Mongo, "m1", "k1").is_some());

        let log = std::fs::read_to_string(dir.path().join("A_log.csv")).unwrap();
        assert!(log.contains(",Sync,Redis"));
        assert!(log.contains(",Async,MongoDB"));
    }

    #[tokio::test]
    async fn test_failed_edge_does_not_stop_hop() {
        let dir = tempfile::tempdir().unwrap();
        let connector = Arc::new(MemoryConnector::new());
        connector.set_rejecting(&NodeId::from("p1"), true);
        let router = router_for("A", connector.clone(), dir.path());

        submit(&router, packet(
            "A",
            vec![
                CallEdge::data("p1", 0, CallMode::Sync),
                CallEdge::service("down", CallMode::Sync),
                CallEdge::data("r2", 1, CallMode::Sync),
            ],
            vec![
                (0, write_op("k0", Backend::Postgres)),
                (1, write_op("k1", Backend::Redis)),
            ],
        ));
        wait_idle(&router).await;
        router.telemetry().flush().await;

        assert!(connector.get(Backend::Postgres, "p1", "k0").is_none());
        assert!(connector.get(Backend::Redis, "r2", "k1").is_some());

        let log = std::fs::read_to_string(dir.path().join("A_log.csv")).unwrap();
        let errors = log.lines().filter(|l| l.contains(",Error,")).count();
        assert_eq!(errors, 2);
    }

    #[tokio::test]
    async fn test_empty_edge_list_makes_no_outbound_call() {
        let dir = tempfile::tempdir().unwrap();
        let connector = Arc::new(MemoryConnector::new());
        let router = router_for("A", connector.clone(), dir.path());

        submit(&router, packet("A", vec![], vec![]));
        assert_eq!(router.liveness().in_flight(), 1);
        wait_idle(&router).await;
        router.telemetry().flush().await;

        assert_eq!(connector.connect_count(), 0);
        assert_eq!(router.shim().pool().connected(), 0);
        assert!(!dir.path().join("A_log.csv").exists());
    }

    #[tokio::test]
    async fn test_missing_data_op_only_skips_its_edge() {
        let dir = tempfile::tempdir().unwrap();
        let connector = Arc::new(MemoryConnector::new());
        let router = router_for("A", connector.clone(), dir.path());

        submit(
            &router,
            packet(
                "A",
                vec![
                    CallEdge::data("r1", 7, CallMode::Sync),
                    CallEdge::data("r2", 0, CallMode::Sync),
                ],
                vec![(0, write_op("k0", Backend::Redis))],
            ),
        );
        wait_idle(&router).await;
        router.telemetry().flush().await;

        assert!(connector.get(Backend::Redis, "r2", "k0").is_some());
        assert_eq!(connector.connect_count(), 1);

        let log = std::fs::read_to_string(dir.path().join("A_log.csv")).unwrap();
        let rows: Vec<&str> = log.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains(",Error,r1: "));
        assert!(rows[0].contains("missing data op 7"));
        assert!(rows[1].ends_with(",Sync,Redis"));
    }

    #[tokio::test]
    async fn test_object_size_overrides_payload() {
        let dir = tempfile::tempdir().unwrap();
        let connector = Arc::new(MemoryConnector::new());
        let router = router_for("A", connector.clone(), dir.path());

        let mut op = write_op("big", Backend::Redis);
        op.object_size = Some(300);
        submit(&router, packet(
            "A",
            vec![CallEdge::data("r1", 0, CallMode::Sync)],
            vec![(0, op)],
        ));
        wait_idle(&router).await;

        // base64 of 300 bytes
        assert_eq!(connector.get(Backend::Redis, "r1", "big").unwrap().len(), 400);
    }
}
