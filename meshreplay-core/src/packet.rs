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

//! Trace packet wire model
//!
//! A [`TracePacket`] is the self-describing unit of replay: one recorded call
//! graph plus its trace id. Every hop receives a full copy and re-derives its
//! own edges from `node_calls_dict`, so nothing here is ever mutated after
//! decoding.
//!
//! ## Wire format
//!
//! ```text
//! {
//!   "tid": "t1",
//!   "initial_node": "A",
//!   "initial_node_type": "Python",
//!   "node_calls_dict": { "A": [["B", -1, 0], ["r1", 0, 1]] },
//!   "data_ops_dict": { "0": {"op_type": "write", "op_obj_id": "k1", "db": "Redis"} },
//!   "logger_nodes": ["B"]
//! }
//! ```
//!
//! Call edges are positional triples `[target, op_ref, mode]` where `op_ref`
//! is `-1` for a service call and otherwise a key of `data_ops_dict`, and
//! `mode` is `0` (sync) or `1` (async).

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{ReplayError, Result};

/// Encoded `op_ref` marking a peer-to-peer service call.
pub const SERVICE_CALL_SENTINEL: i64 = -1;

/// Index into a packet's `data_ops_dict`.
pub type OpId = u32;

/// Opaque node identity, one-to-one with a deployed container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Storage engine behind a storage-facing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Backend {
    #[serde(rename = "MongoDB")]
    Mongo,
    Redis,
    Postgres,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Mongo => "MongoDB",
            Backend::Redis => "Redis",
            Backend::Postgres => "Postgres",
        }
    }

    pub fn node_kind(self) -> NodeKind {
        match self {
            Backend::Mongo => NodeKind::Mongo,
            Backend::Redis => NodeKind::Redis,
            Backend::Postgres => NodeKind::Postgres,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a node is. Service-logic nodes are `"Python"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "Python")]
    ServiceLogic,
    #[serde(rename = "MongoDB")]
    Mongo,
    Redis,
    Postgres,
}

impl NodeKind {
    /// Port a node of this kind listens on unless overridden.
    pub fn default_port(self) -> u16 {
        match self {
            NodeKind::ServiceLogic => 5000,
            NodeKind::Mongo => 27017,
            NodeKind::Redis => 6379,
            NodeKind::Postgres => 5432,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpType {
    Read,
    Write,
}

impl OpType {
    pub fn as_str(self) -> &'static str {
        match self {
            OpType::Read => "read",
            OpType::Write => "write",
        }
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the caller waits for an edge before moving to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallMode {
    Sync,
    Async,
}

impl CallMode {
    fn from_wire(flag: u8) -> Result<Self> {
        match flag {
            0 => Ok(CallMode::Sync),
            1 => Ok(CallMode::Async),
            other => Err(ReplayError::malformed(format!(
                "call mode must be 0 or 1, got {other}"
            ))),
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            CallMode::Sync => 0,
            CallMode::Async => 1,
        }
    }
}

/// What an edge does at its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpRef {
    /// Forward the whole packet to a peer service-logic node.
    Service,
    /// Run `data_ops_dict[id]` against the target storage node.
    Data(OpId),
}

impl OpRef {
    fn from_wire(raw: i64) -> Result<Self> {
        if raw == SERVICE_CALL_SENTINEL {
            return Ok(OpRef::Service);
        }
        OpId::try_from(raw)
            .map(OpRef::Data)
            .map_err(|_| ReplayError::malformed(format!("invalid op reference {raw}")))
    }

    fn to_wire(self) -> i64 {
        match self {
            OpRef::Service => SERVICE_CALL_SENTINEL,
            OpRef::Data(id) => i64::from(id),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireCallEdge(NodeId, i64, u8);

/// One downstream call issued by a node while handling a packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireCallEdge", into = "WireCallEdge")]
pub struct CallEdge {
    pub target: NodeId,
    pub op_ref: OpRef,
    pub mode: CallMode,
}

impl CallEdge {
    pub fn service(target: impl Into<NodeId>, mode: CallMode) -> Self {
        Self {
            target: target.into(),
            op_ref: OpRef::Service,
            mode,
        }
    }

    pub fn data(target: impl Into<NodeId>, op: OpId, mode: CallMode) -> Self {
        Self {
            target: target.into(),
            op_ref: OpRef::Data(op),
            mode,
        }
    }
}

impl TryFrom<WireCallEdge> for CallEdge {
    type Error = ReplayError;

    fn try_from(WireCallEdge(target, op_ref, mode): WireCallEdge) -> Result<Self> {
        Ok(Self {
            target,
            op_ref: OpRef::from_wire(op_ref)?,
            mode: CallMode::from_wire(mode)?,
        })
    }
}

impl From<CallEdge> for WireCallEdge {
    fn from(edge: CallEdge) -> Self {
        WireCallEdge(edge.target, edge.op_ref.to_wire(), edge.mode.to_wire())
    }
}

/// A storage operation referenced by call edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataOperation {
    pub op_type: OpType,
    #[serde(rename = "op_obj_id")]
    pub object_key: String,
    #[serde(rename = "db")]
    pub backend: Backend,
    /// Payload size in bytes, when the trace recorded one.
    #[serde(
        rename = "op_obj_size",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub object_size: Option<usize>,
}

/// One simulated end-to-end request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracePacket {
    #[serde(rename = "tid")]
    pub trace_id: String,
    #[serde(rename = "initial_node")]
    pub entry_node: NodeId,
    #[serde(rename = "initial_node_type")]
    pub entry_node_kind: NodeKind,
    #[serde(rename = "node_calls_dict", default)]
    pub node_calls: BTreeMap<NodeId, Vec<CallEdge>>,
    #[serde(rename = "data_ops_dict", default)]
    pub data_ops: BTreeMap<OpId, DataOperation>,
    #[serde(rename = "logger_nodes", default)]
    pub terminal_nodes: Vec<NodeId>,
}

impl TracePacket {
    /// Decode a packet from an already-parsed JSON document.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ReplayError::malformed(e.to_string()))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| ReplayError::malformed(e.to_string()))
    }

    /// Call edges for `node`, or `None` when the packet has no entry for it.
    pub fn edges_for(&self, node: &str) -> Option<&[CallEdge]> {
        self.node_calls.get(node).map(Vec::as_slice)
    }

    pub fn data_op(&self, id: OpId) -> Option<&DataOperation> {
        self.data_ops.get(&id)
    }

    pub fn is_terminal(&self, node: &str) -> bool {
        self.terminal_nodes.iter().any(|n| n.as_str() == node)
    }

    /// Packet-wide checks. A data edge whose operation is missing is not
    /// one of them; it only costs that edge when the hop runs.
    pub fn validate(&self) -> Result<()> {
        if self.trace_id.is_empty() {
            return Err(ReplayError::malformed("empty tid"));
        }
        Ok(())
    }

    /// Service-logic nodes this packet can reach: callers, service-call
    /// targets and a service-logic entry node.
    pub fn service_nodes(&self) -> BTreeSet<&NodeId> {
        let mut nodes: BTreeSet<&NodeId> = self.node_calls.keys().collect();
        for edges in self.node_calls.values() {
            nodes.extend(
                edges
                    .iter()
                    .filter(|e| e.op_ref == OpRef::Service)
                    .map(|e| &e.target),
            );
        }
        if self.entry_node_kind == NodeKind::ServiceLogic {
            nodes.insert(&self.entry_node);
        }
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scenario_a() -> serde_json::Value {
        json!({
            "tid": "t1",
            "initial_node": "A",
            "initial_node_type": "Python",
            "node_calls_dict": {"A": [["B", -1, 0]]},
            "data_ops_dict": {},
            "logger_nodes": ["B"]
        })
    }

    #[test]
    fn test_decode_service_call() {
        let packet = TracePacket::from_value(scenario_a()).unwrap();
        assert_eq!(packet.trace_id, "t1");
        assert_eq!(packet.entry_node.as_str(), "A");
        assert_eq!(packet.entry_node_kind, NodeKind::ServiceLogic);

        let edges = packet.edges_for("A").unwrap();
        assert_eq!(edges, &[CallEdge::service("B", CallMode::Sync)]);
        assert!(packet.edges_for("B").is_none());
        assert!(packet.is_terminal("B"));
        assert!(!packet.is_terminal("A"));
    }

    #[test]
    fn test_wire_round_trip_is_exact() {
        let original = json!({
            "tid": "t2",
            "initial_node": "A",
            "initial_node_type": "Python",
            "node_calls_dict": {
                "A": [["B", -1, 1], ["r1", 0, 1]],
                "B": [["pg1", 3, 0]]
            },
            "data_ops_dict": {
                "0": {"op_type": "write", "op_obj_id": "k1", "db": "Redis"},
                "3": {"op_type": "read", "op_obj_id": "k9", "db": "Postgres", "op_obj_size": 512}
            },
            "logger_nodes": ["B", "A"]
        });

        let packet = TracePacket::from_value(original.clone()).unwrap();
        let encoded = serde_json::to_value(&packet).unwrap();
        assert_eq!(encoded, original);

        let op = packet.data_op(0).unwrap();
        assert_eq!(op.backend, Backend::Redis);
        assert_eq!(op.op_type, OpType::Write);
        assert_eq!(op.object_key, "k1");
        assert_eq!(packet.data_op(3).unwrap().object_size, Some(512));
    }

    #[test]
    fn test_unknown_db_is_malformed() {
        let doc = json!({
            "tid": "t3",
            "initial_node": "A",
            "initial_node_type": "Python",
            "node_calls_dict": {"A": [["c1", 0, 0]]},
            "data_ops_dict": {"0": {"op_type": "write", "op_obj_id": "k", "db": "Cassandra"}},
            "logger_nodes": []
        });
        let err = TracePacket::from_value(doc).unwrap_err();
        assert!(matches!(err, ReplayError::MalformedPacket(_)));
    }

    #[test]
    fn test_bad_edge_encoding_is_malformed() {
        for edge in [json!(["B", -2, 0]), json!(["B", -1, 2])] {
            let doc = json!({
                "tid": "t4",
                "initial_node": "A",
                "initial_node_type": "Python",
                "node_calls_dict": {"A": [edge]},
                "data_ops_dict": {},
                "logger_nodes": []
            });
            assert!(TracePacket::from_value(doc).is_err());
        }
    }

    #[test]
    fn test_validate() {
        let dangling = json!({
            "tid": "t5",
            "initial_node": "A",
            "initial_node_type": "Python",
            "node_calls_dict": {"A": [["r1", 7, 0]]},
            "data_ops_dict": {},
            "logger_nodes": []
        });
        let packet = TracePacket::from_value(dangling).unwrap();
        assert!(packet.validate().is_ok());
        assert!(packet.data_op(7).is_none());

        let mut empty_tid = TracePacket::from_value(scenario_a()).unwrap();
        empty_tid.trace_id.clear();
        assert!(empty_tid.validate().is_err());
    }

    #[test]
    fn test_service_nodes() {
        let doc = json!({
            "tid": "t6",
            "initial_node": "A",
            "initial_node_type": "Python",
            "node_calls_dict": {
                "A": [["B", -1, 0], ["r1", 0, 1]],
                "B": [["C", -1, 1]]
            },
            "data_ops_dict": {"0": {"op_type": "write", "op_obj_id": "k1", "db": "Redis"}},
            "logger_nodes": ["C"]
        });
        let packet = TracePacket::from_value(doc).unwrap();
        let nodes: Vec<&str> = packet.service_nodes().into_iter().map(|n| n.as_str()).collect();
        assert_eq!(nodes, vec!["A", "B", "C"]);
    }

    mod edge_encoding {
        use super::*;
        use proptest::prelude::*;

        fn decode(edge: serde_json::Value) -> Result<CallEdge> {
            serde_json::from_value(edge).map_err(|e| ReplayError::malformed(e.to_string()))
        }

        proptest! {
            #[test]
            fn negative_refs_other_than_sentinel_are_rejected(op_ref in i64::MIN..-1i64) {
                prop_assert!(decode(json!(["r1", op_ref, 0])).is_err());
            }

            #[test]
            fn non_negative_refs_index_data_ops(op_ref in 0u32..=u32::MAX, mode in 0u8..=1) {
                let edge = decode(json!(["r1", op_ref, mode])).unwrap();
                prop_assert_eq!(edge.op_ref, OpRef::Data(op_ref));
            }

            #[test]
            fn modes_other_than_zero_or_one_are_rejected(mode in 2u8..=u8::MAX) {
                prop_assert!(decode(json!(["B", -1, mode])).is_err());
            }
        }
    }
}
