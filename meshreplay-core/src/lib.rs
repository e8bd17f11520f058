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

//! Meshreplay Core
//!
//! Trace packet wire model, telemetry events, the error taxonomy and the
//! small pieces of simulation policy (latency table, synthetic payloads,
//! peer addressing) shared by the node router and the dispatcher.

pub mod error;
pub mod event;
pub mod latency;
pub mod packet;
pub mod payload;
pub mod peers;

pub use error::{ReplayError, Result};
pub use event::{TelemetryEvent, TelemetryEventKind};
pub use latency::{LatencyDistribution, DEFAULT_LATENCY_TABLE_MS};
pub use packet::{
    Backend, CallEdge, CallMode, DataOperation, NodeId, NodeKind, OpId, OpRef, OpType,
    TracePacket, SERVICE_CALL_SENTINEL,
};
pub use payload::{synthetic_value, DEFAULT_PAYLOAD_BYTES};
pub use peers::PeerDirectory;
